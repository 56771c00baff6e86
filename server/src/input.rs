//! Per-player input state and the task that feeds it.
//!
//! Each player gets a [`PlayerSlot`] shared between its reader task (the only
//! writer of intent and readiness) and the tick loop (the only reader). All
//! mutable fields are single words, so atomics replace a lock.

use crate::framing::{read_bounded_line, LineRead, MAX_TOKEN_LINE};
use crate::game::Side;
use log::{debug, info, warn};
use shared::{PlayerCommand, TransportCipher};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::AsyncBufRead;

/// Held movement command of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Intent {
    None = 0,
    Up = 1,
    Down = 2,
}

impl Intent {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Intent::Up,
            2 => Intent::Down,
            _ => Intent::None,
        }
    }
}

#[derive(Debug)]
pub struct PlayerSlot {
    side: Side,
    identity: String,
    intent: AtomicU8,
    ready: AtomicBool,
    connected: AtomicBool,
}

impl PlayerSlot {
    pub fn new(side: Side, identity: impl Into<String>) -> Self {
        Self {
            side,
            identity: identity.into(),
            intent: AtomicU8::new(Intent::None as u8),
            ready: AtomicBool::new(false),
            connected: AtomicBool::new(true),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Authenticated username; fixed for the lifetime of the slot.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn intent(&self) -> Intent {
        Intent::from_u8(self.intent.load(Ordering::Acquire))
    }

    pub fn set_intent(&self, intent: Intent) {
        self.intent.store(intent as u8, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn clear_ready(&self) {
        self.ready.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Applies one decoded command.
    pub fn apply(&self, command: PlayerCommand) {
        match command {
            PlayerCommand::Up => self.set_intent(Intent::Up),
            PlayerCommand::Down => self.set_intent(Intent::Down),
            PlayerCommand::Stay => self.set_intent(Intent::None),
            PlayerCommand::Ready => self.set_ready(),
        }
    }
}

/// Reads cipher-wrapped command lines until the peer closes the stream.
///
/// Lines that fail to decrypt, decrypt to something unknown, or run past
/// [`MAX_TOKEN_LINE`] are dropped without touching the slot. End of stream or
/// a read error marks the slot disconnected.
pub async fn run_input_channel<R>(mut reader: R, cipher: Arc<TransportCipher>, slot: Arc<PlayerSlot>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    loop {
        match read_bounded_line(&mut reader, &mut buf, MAX_TOKEN_LINE).await {
            Ok(LineRead::Line) => {}
            Ok(LineRead::TooLong) => {
                warn!("Dropped oversized line from {:?} player", slot.side());
                continue;
            }
            Ok(LineRead::Eof) => {
                info!("{:?} player {} disconnected", slot.side(), slot.identity());
                break;
            }
            Err(e) => {
                warn!("Read error from {:?} player: {}", slot.side(), e);
                break;
            }
        }

        let token = String::from_utf8_lossy(&buf);
        match cipher.decrypt_line(&token) {
            Ok(text) => match PlayerCommand::parse(&text) {
                Some(command) => slot.apply(command),
                None => debug!("Ignoring unknown command {:?} from {:?}", text, slot.side()),
            },
            Err(e) => warn!("Dropped line from {:?} player: {}", slot.side(), e),
        }
    }

    slot.mark_disconnected();
}
