//! Types and helpers shared by the Pong server and its clients.
//!
//! Both sides agree on the playfield geometry, the line-oriented wire protocol,
//! the transport cipher used for player traffic, and the small physics
//! primitives the server drives once per tick.

pub mod cipher;
pub mod physics;
pub mod protocol;

pub use cipher::{CipherError, TransportCipher};
pub use physics::{Ball, Direction, Paddle, Rect};
pub use protocol::{
    AuthCommand, AuthReply, ConnectInfo, PlayerCommand, ProtocolError, Role, StateLine,
};

pub const SCREEN_WIDTH: i32 = 640;
pub const SCREEN_HEIGHT: i32 = 480;

/// Points needed to take the match (first to N).
pub const WIN_SCORE: i32 = 5;

/// Thickness of the top and bottom walls.
pub const WALL_MARGIN: i32 = 10;

pub const PADDLE_WIDTH: i32 = 10;
pub const PADDLE_HEIGHT: i32 = 50;
pub const PADDLE_SPEED: i32 = 5;
pub const LEFT_PADDLE_X: i32 = 10;
pub const RIGHT_PADDLE_X: i32 = SCREEN_WIDTH - 20;
pub const PADDLE_START_Y: i32 = SCREEN_HEIGHT / 2 - PADDLE_HEIGHT / 2;

pub const BALL_SIZE: i32 = 5;
pub const BALL_SPEED: i32 = 5;
pub const BALL_START_X: i32 = SCREEN_WIDTH / 2;
pub const BALL_START_Y: i32 = SCREEN_HEIGHT / 2;

pub const TICK_RATE: u32 = 60;

/// Lowest Y a paddle may reach.
pub const PADDLE_MIN_Y: i32 = WALL_MARGIN;
/// Highest Y a paddle may reach.
pub const PADDLE_MAX_Y: i32 = SCREEN_HEIGHT - WALL_MARGIN - PADDLE_HEIGHT;
