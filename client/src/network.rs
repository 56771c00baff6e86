use log::{debug, info};
use shared::{
    AuthCommand, AuthReply, CipherError, ConnectInfo, PlayerCommand, ProtocolError, Role,
    StateLine, TransportCipher,
};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Cipher(#[from] CipherError),
    #[error("server closed the connection")]
    Closed,
    #[error("server refused: {0}")]
    Refused(String),
    #[error("connected as {0}, which cannot send commands")]
    NotAPlayer(Role),
}

/// Receiving half: yields one state per server tick.
pub struct StateStream {
    reader: BufReader<OwnedReadHalf>,
    cipher: Option<Arc<TransportCipher>>,
}

impl StateStream {
    /// Next state, or `None` once the server hangs up.
    pub async fn next_state(&mut self) -> Result<Option<StateLine>, ClientError> {
        let Some(line) = read_line(&mut self.reader).await? else {
            return Ok(None);
        };

        let plaintext = match &self.cipher {
            Some(cipher) => cipher.decrypt_line(&line)?,
            None => line,
        };
        Ok(Some(plaintext.parse()?))
    }
}

/// Sending half: seals player commands for the server.
pub struct CommandSink {
    writer: OwnedWriteHalf,
    cipher: Arc<TransportCipher>,
}

impl CommandSink {
    pub async fn send(&mut self, command: PlayerCommand) -> Result<(), ClientError> {
        let token = self.cipher.encrypt_line(command.as_str())?;
        self.writer.write_all(format!("{}\n", token).as_bytes()).await?;
        debug!("Sent {:?}", command);
        Ok(())
    }
}

/// A connection to the Pong server, from greeting to game stream.
pub struct Connection {
    info: ConnectInfo,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    /// Connects and reads the server's greeting, which carries the assigned
    /// role. The server may hold a connection without greeting while another
    /// player is authenticating.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let greeting = read_line(&mut reader).await?.ok_or(ClientError::Closed)?;
        let info: ConnectInfo = greeting.parse()?;
        info!(
            "Connected to {} as {} ({}x{})",
            addr, info.role, info.width, info.height
        );

        Ok(Self {
            info,
            reader,
            writer,
        })
    }

    pub fn info(&self) -> &ConnectInfo {
        &self.info
    }

    pub fn role(&self) -> Role {
        self.info.role
    }

    /// Sends one auth attempt and returns the server's verdict. A refusal
    /// leaves the connection open for another attempt.
    pub async fn authenticate(
        &mut self,
        command: &AuthCommand,
    ) -> Result<AuthReply, ClientError> {
        if !self.info.role.is_player() {
            return Err(ClientError::NotAPlayer(self.info.role));
        }

        self.writer
            .write_all(format!("{}\n", command).as_bytes())
            .await?;
        self.writer.flush().await?;

        let line = read_line(&mut self.reader).await?.ok_or(ClientError::Closed)?;
        let reply: AuthReply = line.parse()?;
        debug!("Auth reply: {}", reply);
        Ok(reply)
    }

    /// Like [`Connection::authenticate`], but a refusal becomes an error.
    pub async fn authenticate_or_fail(
        &mut self,
        command: &AuthCommand,
    ) -> Result<(), ClientError> {
        match self.authenticate(command).await? {
            AuthReply::Error(reason) => Err(ClientError::Refused(reason)),
            _ => Ok(()),
        }
    }

    /// Splits a player connection into its state and command halves.
    pub fn into_player(
        self,
        cipher: Arc<TransportCipher>,
    ) -> Result<(StateStream, CommandSink), ClientError> {
        if !self.info.role.is_player() {
            return Err(ClientError::NotAPlayer(self.info.role));
        }

        Ok((
            StateStream {
                reader: self.reader,
                cipher: Some(Arc::clone(&cipher)),
            },
            CommandSink {
                writer: self.writer,
                cipher,
            },
        ))
    }

    /// Spectators only ever read plaintext states.
    pub fn into_spectator(self) -> StateStream {
        StateStream {
            reader: self.reader,
            cipher: None,
        }
    }
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
