//! Plaintext register/login exchange run on each player connection before
//! the match starts.

use crate::credentials::{CredentialStore, Registration, Verdict};
use crate::framing::{read_bounded_line, LineRead, MAX_AUTH_LINE};
use log::{error, info, warn};
use shared::{AuthCommand, AuthReply};
use std::collections::HashSet;
use std::io;
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

/// Accounts that hold, or have just won, a player slot.
///
/// Both slots authenticate concurrently, so the check that one account cannot
/// take both paddles has to be shared between the two exchanges.
#[derive(Debug, Default)]
pub struct AccountClaims {
    names: Mutex<HashSet<String>>,
}

impl AccountClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `username`; false if another connection already holds it.
    pub fn try_claim(&self, username: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(username.to_string())
    }

    pub fn release(&self, username: &str) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(username);
    }

    pub fn is_claimed(&self, username: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(username)
    }
}

/// Runs the auth exchange until the peer is accepted or hangs up.
///
/// Returns the authenticated username, or `None` if the stream ended first.
/// A successful exchange leaves the account claimed in `claims`, so the
/// other slot cannot log in as the same user.
pub async fn authenticate_player<R, W>(
    reader: &mut R,
    writer: &mut W,
    credentials: &CredentialStore,
    claims: &AccountClaims,
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();

    loop {
        let (reply, claimed) = match read_bounded_line(reader, &mut line, MAX_AUTH_LINE).await? {
            LineRead::Eof => return Ok(None),
            LineRead::TooLong => (AuthReply::Error("line too long".to_string()), None),
            LineRead::Line => match std::str::from_utf8(&line) {
                Ok(text) => match text.trim().parse::<AuthCommand>() {
                    Ok(command) => handle_command(&command, credentials, claims).await,
                    Err(e) => (AuthReply::Error(e.to_string()), None),
                },
                Err(_) => (AuthReply::Error("invalid encoding".to_string()), None),
            },
        };

        if let Err(e) = send_reply(writer, &reply).await {
            if let Some(username) = &claimed {
                claims.release(username);
            }
            return Err(e);
        }

        if claimed.is_some() {
            return Ok(claimed);
        }
    }
}

async fn send_reply<W>(writer: &mut W, reply: &AuthReply) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{}\n", reply).as_bytes()).await?;
    writer.flush().await
}

/// Answers one command. The username is returned only when the reply is a
/// success and the account has been claimed for this connection.
async fn handle_command(
    command: &AuthCommand,
    credentials: &CredentialStore,
    claims: &AccountClaims,
) -> (AuthReply, Option<String>) {
    match command {
        AuthCommand::Register { username, password } => {
            let reply = match credentials.register(username, password).await {
                Ok(Registration::Registered) => AuthReply::Registered,
                Ok(Registration::AlreadyExists) => AuthReply::Error("already exists".to_string()),
                Ok(Registration::InvalidUsername) => {
                    AuthReply::Error("invalid username".to_string())
                }
                Err(e) => {
                    error!("Registration of {} failed: {}", username, e);
                    AuthReply::Error("server error".to_string())
                }
            };
            if reply.is_ok() && !claims.try_claim(username) {
                return (already_playing(username), None);
            }
            let claimed = reply.is_ok().then(|| username.clone());
            (reply, claimed)
        }
        AuthCommand::Login { username, password } => {
            if claims.is_claimed(username) {
                return (already_playing(username), None);
            }
            match credentials.authenticate(username, password).await {
                // The other slot may have claimed the account while this
                // password was being checked.
                Ok(Verdict::Accepted) if !claims.try_claim(username) => {
                    (already_playing(username), None)
                }
                Ok(Verdict::Accepted) => {
                    info!("{} logged in", username);
                    (AuthReply::LoggedIn, Some(username.clone()))
                }
                Ok(Verdict::Rejected) => {
                    (AuthReply::Error("invalid credentials".to_string()), None)
                }
                Err(e) => {
                    error!("Login of {} failed: {}", username, e);
                    (AuthReply::Error("server error".to_string()), None)
                }
            }
        }
    }
}

fn already_playing(username: &str) -> AuthReply {
    warn!("Refused second login for {}", username);
    AuthReply::Error("already playing".to_string())
}
