//! Line-oriented wire protocol.
//!
//! Every message is a single ASCII line terminated by `\n`. The connect line
//! and the auth exchange travel in plaintext; player commands and the state
//! sent to players are wrapped by [`crate::TransportCipher`] before they hit
//! the socket. Spectators receive the state line unwrapped.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed connect line: {0:?}")]
    MalformedConnect(String),
    #[error("unknown role: {0:?}")]
    UnknownRole(String),
    #[error("usage: register|login <username> <password>")]
    MalformedAuth,
    #[error("malformed auth reply: {0:?}")]
    MalformedReply(String),
    #[error("malformed state line: {0:?}")]
    MalformedState(String),
}

/// Function of a connection, fixed at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Left,
    Right,
    Spectator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Left => "left",
            Role::Right => "right",
            Role::Spectator => "spec",
        }
    }

    pub fn is_player(&self) -> bool {
        !matches!(self, Role::Spectator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Role::Left),
            "right" => Ok(Role::Right),
            "spec" => Ok(Role::Spectator),
            other => Err(ProtocolError::UnknownRole(other.to_string())),
        }
    }
}

/// First line the server sends on every accepted connection:
/// `<width> <height> <role>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectInfo {
    pub width: i32,
    pub height: i32,
    pub role: Role,
}

impl fmt::Display for ConnectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.width, self.height, self.role)
    }
}

impl FromStr for ConnectInfo {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::MalformedConnect(s.to_string());
        let mut parts = s.split_whitespace();
        let width = parts.next().and_then(|w| w.parse().ok()).ok_or_else(malformed)?;
        let height = parts.next().and_then(|h| h.parse().ok()).ok_or_else(malformed)?;
        let role = parts.next().ok_or_else(malformed)?.parse()?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(ConnectInfo {
            width,
            height,
            role,
        })
    }
}

/// Plaintext command sent by a player during the auth phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCommand {
    Register { username: String, password: String },
    Login { username: String, password: String },
}

impl AuthCommand {
    pub fn username(&self) -> &str {
        match self {
            AuthCommand::Register { username, .. } | AuthCommand::Login { username, .. } => {
                username
            }
        }
    }
}

impl fmt::Display for AuthCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthCommand::Register { username, password } => {
                write!(f, "register {} {}", username, password)
            }
            AuthCommand::Login { username, password } => {
                write!(f, "login {} {}", username, password)
            }
        }
    }
}

impl FromStr for AuthCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [verb, username, password] => {
                let username = username.to_string();
                let password = password.to_string();
                match verb.to_ascii_lowercase().as_str() {
                    "register" => Ok(AuthCommand::Register { username, password }),
                    "login" => Ok(AuthCommand::Login { username, password }),
                    _ => Err(ProtocolError::MalformedAuth),
                }
            }
            _ => Err(ProtocolError::MalformedAuth),
        }
    }
}

/// Server answer to an [`AuthCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    Registered,
    LoggedIn,
    Error(String),
}

impl AuthReply {
    pub fn is_ok(&self) -> bool {
        !matches!(self, AuthReply::Error(_))
    }
}

impl fmt::Display for AuthReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthReply::Registered => f.write_str("OK registered"),
            AuthReply::LoggedIn => f.write_str("OK logged-in"),
            AuthReply::Error(reason) => write!(f, "ERR {}", reason),
        }
    }
}

impl FromStr for AuthReply {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OK registered" => Ok(AuthReply::Registered),
            "OK logged-in" => Ok(AuthReply::LoggedIn),
            other => other
                .strip_prefix("ERR")
                .map(|reason| AuthReply::Error(reason.trim().to_string()))
                .ok_or_else(|| ProtocolError::MalformedReply(other.to_string())),
        }
    }
}

/// Decrypted payload of a player line after authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Up,
    Down,
    Stay,
    Ready,
}

impl PlayerCommand {
    /// Returns `None` for anything that is not a known command.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "up" => Some(PlayerCommand::Up),
            "down" => Some(PlayerCommand::Down),
            "" => Some(PlayerCommand::Stay),
            "ready" => Some(PlayerCommand::Ready),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerCommand::Up => "up",
            PlayerCommand::Down => "down",
            PlayerCommand::Stay => "",
            PlayerCommand::Ready => "ready",
        }
    }
}

/// Six-field snapshot broadcast once per tick:
/// `leftPaddleY rightPaddleY ballX ballY leftScore rightScore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateLine {
    pub left_paddle_y: i32,
    pub right_paddle_y: i32,
    pub ball_x: i32,
    pub ball_y: i32,
    pub left_score: i32,
    pub right_score: i32,
}

impl fmt::Display for StateLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.left_paddle_y,
            self.right_paddle_y,
            self.ball_x,
            self.ball_y,
            self.left_score,
            self.right_score
        )
    }
}

impl FromStr for StateLine {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<i32> = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| ProtocolError::MalformedState(s.to_string()))?;
        match fields.as_slice() {
            &[left_paddle_y, right_paddle_y, ball_x, ball_y, left_score, right_score] => {
                Ok(StateLine {
                    left_paddle_y,
                    right_paddle_y,
                    ball_x,
                    ball_y,
                    left_score,
                    right_score,
                })
            }
            _ => Err(ProtocolError::MalformedState(s.to_string())),
        }
    }
}
