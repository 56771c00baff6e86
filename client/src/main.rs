use clap::Parser;
use client::input::{parse_console_line, ConsoleAction, HELP};
use client::network::{ClientError, Connection, StateStream};
use client::rendering::{status_line, Renderer};
use log::{info, warn};
use shared::{AuthCommand, TransportCipher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:6000")]
    server: String,

    /// Account name (players only)
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Account password (players only)
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Create the account instead of logging in
    #[arg(long)]
    register: bool,

    /// Transport key shared with the server
    #[arg(short = 'k', long, default_value = "transport.key")]
    key_file: PathBuf,

    /// Draw the court instead of a status line
    #[arg(long)]
    board: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Connecting to: {}", args.server);

    let mut connection = Connection::connect(&args.server).await?;
    let info = *connection.info();
    let renderer = args.board.then(|| Renderer::new(&info, 64, 24));

    if !connection.role().is_player() {
        info!("Watching as a spectator");
        watch(connection.into_spectator(), renderer.as_ref()).await?;
        return Ok(());
    }

    let (Some(username), Some(password)) = (args.username, args.password) else {
        return Err("playing requires --username and --password".into());
    };
    let command = if args.register {
        AuthCommand::Register { username, password }
    } else {
        AuthCommand::Login { username, password }
    };
    connection.authenticate_or_fail(&command).await?;
    info!("Playing the {} paddle. {}", connection.role(), HELP);

    let cipher = Arc::new(TransportCipher::load(&args.key_file)?);
    let (states, mut commands) = connection.into_player(cipher)?;
    let viewer = tokio::spawn(async move { watch(states, renderer.as_ref()).await });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        match parse_console_line(&line) {
            Some(ConsoleAction::Send(command)) => commands.send(command).await?,
            Some(ConsoleAction::Quit) => break,
            None => warn!("Unknown command {:?}; {}", line, HELP),
        }
        if viewer.is_finished() {
            break;
        }
    }

    viewer.abort();
    Ok(())
}

async fn watch(mut states: StateStream, renderer: Option<&Renderer>) -> Result<(), ClientError> {
    while let Some(state) = states.next_state().await? {
        match renderer {
            // Clear and home the cursor before each frame.
            Some(renderer) => println!("\x1b[2J\x1b[H{}", renderer.render(&state)),
            None => println!("{}", status_line(&state)),
        }
    }
    info!("Server closed the connection");
    Ok(())
}
