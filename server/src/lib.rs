//! # Pong Server Library
//!
//! This library provides the authoritative server for a two-player Pong match.
//! It owns the canonical match state, accepts one encrypted input stream per
//! player and streams the state back to players and spectators every tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the only copy of the ball and paddle physics. Clients send
//! intents (`up`, `down`, `stay`, `ready`) and render whatever the server
//! broadcasts; they never report positions.
//!
//! ### Connection Admission
//! The first connection becomes the left paddle and the second the right
//! paddle, each only after a successful `register` or `login` exchange. Both
//! players authenticate at the same time. Every later connection is a
//! spectator. A player that disconnects before authenticating frees its slot
//! for the next connection.
//!
//! ### Transport Security
//! Lines to and from players are sealed with a symmetric key that the server
//! generates once and keeps in its data directory. Spectators receive the
//! same state in plaintext.
//!
//! ### Persistence
//! Accounts (salted PBKDF2 hashes) and the win leaderboard are JSON files
//! that are rewritten atomically on every change.
//!
//! ## Module Organization
//!
//! ### Credentials Module (`credentials`)
//! Salted, iterated password hashing with registration and verification.
//!
//! ### Leaderboard Module (`leaderboard`)
//! Win counts keyed by three-letter initials, plus the ranked snapshot.
//!
//! ### Admission and Auth Modules (`admission`, `auth`)
//! Role assignment for incoming connections and the line-based auth exchange.
//!
//! ### Framing Module (`framing`)
//! Length-capped line reads shared by the auth exchange and input channels.
//!
//! ### Input Module (`input`)
//! Per-player intent slots and the task that decrypts and applies commands.
//!
//! ### Game and Rematch Modules (`game`, `rematch`)
//! The fixed-step simulation, scoring, win detection and the two-sided
//! `ready` handshake that restarts a finished match.
//!
//! ### Broadcast Module (`broadcast`)
//! Per-tick fan-out: encrypted to players, plaintext to spectators through
//! bounded per-spectator queues.
//!
//! ### HTTP Module (`http`)
//! Read-only HTML view of the leaderboard.
//!
//! ### Network Module (`network`)
//! Socket handling, configuration and the tick loop that ties it together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:6000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     // Runs until a player's connection is lost.
//!     Server::bind(config).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod auth;
pub mod broadcast;
pub mod credentials;
pub mod framing;
pub mod game;
pub mod http;
pub mod input;
pub mod leaderboard;
pub mod network;
pub mod rematch;
pub mod store;

/// Error type at the server boundary.
pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
