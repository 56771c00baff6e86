//! # Pong Client Library
//!
//! A thin, headless client for the Pong server. The server is authoritative,
//! so the client keeps no simulation of its own: it authenticates, forwards
//! movement commands and draws whatever state arrives.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Connection lifecycle over TCP:
//! - Reading the greeting that assigns the role (`left`, `right` or `spec`)
//! - The plaintext `register`/`login` exchange for players
//! - Sealing commands and opening state lines with the shared transport key
//!
//! ### Input Module (`input`)
//! Maps console lines to player commands.
//!
//! ### Rendering Module (`rendering`)
//! Text rendering of the court and a one-line score summary.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Connection;
//! use shared::{AuthCommand, PlayerCommand, TransportCipher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut connection = Connection::connect("127.0.0.1:6000").await?;
//!     connection
//!         .authenticate_or_fail(&AuthCommand::Login {
//!             username: "alice".to_string(),
//!             password: "secret".to_string(),
//!         })
//!         .await?;
//!
//!     let cipher = Arc::new(TransportCipher::load("transport.key")?);
//!     let (mut states, mut commands) = connection.into_player(cipher)?;
//!     commands.send(PlayerCommand::Up).await?;
//!     while let Some(state) = states.next_state().await? {
//!         println!("{}", state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
pub mod rendering;
