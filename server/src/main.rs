use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use server::ServerResult;
use shared::{TICK_RATE, WIN_SCORE};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the game socket to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Game port
    #[clap(short, long, default_value = "6000")]
    port: u16,
    /// Leaderboard HTTP port
    #[clap(long, default_value = "8080")]
    http_port: u16,
    /// Do not start the leaderboard HTTP service
    #[clap(long)]
    no_http: bool,
    /// Simulation ticks per second
    #[clap(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,
    /// Points needed to win a match
    #[clap(short, long, default_value_t = WIN_SCORE)]
    win_score: i32,
    /// Directory for accounts, leaderboard and the transport key
    #[clap(short, long, default_value = ".")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        http_addr: (!args.no_http).then(|| format!("{}:{}", args.host, args.http_port)),
        tick_rate: args.tick_rate,
        win_score: args.win_score,
        data_dir: args.data_dir,
        ..ServerConfig::default()
    };

    info!(
        "Starting Pong server on {} at {}Hz, first to {}",
        config.bind_addr, config.tick_rate, config.win_score
    );
    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
            info!("Match over, exiting");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
