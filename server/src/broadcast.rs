//! Per-tick fan-out of the match state.
//!
//! Players get the state line sealed by the transport cipher and written
//! straight to their socket; a failed write ends the match. Spectators get the
//! plaintext line through a bounded queue drained by a writer task of their
//! own, so a slow spectator only ever loses frames and never holds up the
//! tick loop or the other viewers.

use crate::game::Side;
use log::{debug, info, warn};
use shared::{StateLine, TransportCipher};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Frames buffered per spectator before new ones are dropped.
pub const SPECTATOR_QUEUE_LEN: usize = 32;

#[derive(Debug, Error)]
#[error("lost {side:?} player: {source}")]
pub struct PlayerLost {
    pub side: Side,
    #[source]
    pub source: io::Error,
}

/// Outcome of one spectator fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub skipped: usize,
    pub removed: usize,
}

#[derive(Debug)]
struct Spectator {
    id: u64,
    addr: SocketAddr,
    tx: mpsc::Sender<Arc<str>>,
}

/// Registry of connected spectators.
#[derive(Debug, Default)]
pub struct SpectatorSet {
    next_id: AtomicU64,
    members: Mutex<Vec<Spectator>>,
}

impl SpectatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, addr: SocketAddr, tx: mpsc::Sender<Arc<str>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        members.push(Spectator { id, addr, tx });
        info!("Spectator {} joined from {} ({} watching)", id, addr, members.len());
        id
    }

    pub fn len(&self) -> usize {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every spectator, letting their writer tasks finish and close.
    pub fn clear(&self) {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Queues `line` for every spectator and prunes the ones whose writer has
    /// gone away.
    pub fn fan_out(&self, line: &str) -> FanOut {
        // Hold the lock only long enough to copy the senders out.
        let targets: Vec<(u64, mpsc::Sender<Arc<str>>)> = self
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| (s.id, s.tx.clone()))
            .collect();

        let frame: Arc<str> = Arc::from(line);
        let mut result = FanOut::default();
        let mut dead = Vec::new();

        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => result.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!("Spectator {} is behind, dropping frame", id);
                    result.skipped += 1;
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
            members.retain(|s| {
                let keep = !dead.contains(&s.id);
                if !keep {
                    info!("Spectator {} at {} removed", s.id, s.addr);
                }
                keep
            });
            result.removed = dead.len();
        }

        result
    }
}

/// Drains a spectator's queue onto its socket until the queue closes or a
/// write fails. Returning drops the receiver, which the next fan-out notices.
pub fn spawn_spectator_writer<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<Arc<str>>,
    addr: SocketAddr,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let mut data = Vec::with_capacity(frame.len() + 1);
            data.extend_from_slice(frame.as_bytes());
            data.push(b'\n');
            if let Err(e) = writer.write_all(&data).await {
                warn!("Spectator at {} dropped: {}", addr, e);
                return;
            }
        }
        let _ = writer.shutdown().await;
    })
}

/// Writes each tick's state to both players and all spectators.
pub struct Broadcaster<W> {
    cipher: Arc<TransportCipher>,
    left: W,
    right: W,
    spectators: Arc<SpectatorSet>,
}

impl<W> Broadcaster<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(cipher: Arc<TransportCipher>, left: W, right: W, spectators: Arc<SpectatorSet>) -> Self {
        Self {
            cipher,
            left,
            right,
            spectators,
        }
    }

    pub async fn broadcast(&mut self, state: &StateLine) -> Result<FanOut, PlayerLost> {
        let line = state.to_string();

        for (side, writer) in [(Side::Left, &mut self.left), (Side::Right, &mut self.right)] {
            let token = match self.cipher.encrypt_line(&line) {
                Ok(token) => format!("{}\n", token),
                Err(e) => {
                    let source = io::Error::new(io::ErrorKind::InvalidData, e);
                    return Err(PlayerLost { side, source });
                }
            };
            if let Err(source) = writer.write_all(token.as_bytes()).await {
                return Err(PlayerLost { side, source });
            }
        }

        Ok(self.spectators.fan_out(&line))
    }

    /// Flushes and closes both player streams.
    pub async fn close(mut self) {
        let _ = self.left.shutdown().await;
        let _ = self.right.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio_test::io::Builder;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn sample_state() -> StateLine {
        StateLine {
            left_paddle_y: 215,
            right_paddle_y: 200,
            ball_x: 320,
            ball_y: 240,
            left_score: 1,
            right_score: 2,
        }
    }

    #[test]
    fn test_fan_out_delivers_plaintext() {
        let set = SpectatorSet::new();
        let (tx, mut rx) = mpsc::channel(4);
        set.register(addr(9000), tx);

        let result = set.fan_out("1 2 3 4 5 6");
        assert_eq!(result.delivered, 1);
        assert_eq!(&*rx.try_recv().unwrap(), "1 2 3 4 5 6");
    }

    #[test]
    fn test_closed_spectator_is_removed_alone() {
        let set = SpectatorSet::new();
        let (tx_a, rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        set.register(addr(9001), tx_a);
        set.register(addr(9002), tx_b);

        drop(rx_a);
        let result = set.fan_out("frame");
        assert_eq!(
            result,
            FanOut {
                delivered: 1,
                skipped: 0,
                removed: 1
            }
        );
        assert_eq!(set.len(), 1);
        assert_eq!(&*rx_b.try_recv().unwrap(), "frame");

        let result = set.fan_out("next");
        assert_eq!(result.removed, 0);
        assert_eq!(result.delivered, 1);
    }

    #[test]
    fn test_slow_spectator_skips_frames_but_stays() {
        let set = SpectatorSet::new();
        let (tx, mut rx) = mpsc::channel(1);
        set.register(addr(9003), tx);

        assert_eq!(set.fan_out("a").delivered, 1);
        assert_eq!(set.fan_out("b").skipped, 1);
        assert_eq!(set.len(), 1);
        assert_eq!(&*rx.try_recv().unwrap(), "a");
    }

    #[tokio::test]
    async fn test_players_get_encrypted_state() {
        let cipher = Arc::new(TransportCipher::generate().unwrap());
        let spectators = Arc::new(SpectatorSet::new());
        let (left, left_peer) = tokio::io::duplex(4096);
        let (right, right_peer) = tokio::io::duplex(4096);

        let mut broadcaster =
            Broadcaster::new(Arc::clone(&cipher), left, right, Arc::clone(&spectators));
        broadcaster.broadcast(&sample_state()).await.unwrap();

        for peer in [left_peer, right_peer] {
            let mut line = String::new();
            BufReader::new(peer).read_line(&mut line).await.unwrap();
            assert_ne!(line.trim(), "215 200 320 240 1 2");
            assert_eq!(cipher.decrypt_line(line.trim()).unwrap(), "215 200 320 240 1 2");
        }
    }

    #[tokio::test]
    async fn test_player_write_failure_is_fatal() {
        let cipher = Arc::new(TransportCipher::generate().unwrap());
        let spectators = Arc::new(SpectatorSet::new());
        let (tx, mut rx) = mpsc::channel(4);
        spectators.register(addr(9004), tx);

        let broken = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let healthy = Builder::new().build();

        let mut broadcaster = Broadcaster::new(cipher, broken, healthy, Arc::clone(&spectators));
        let err = broadcaster.broadcast(&sample_state()).await.unwrap_err();
        assert_eq!(err.side, Side::Left);
        assert_eq!(err.source.kind(), io::ErrorKind::BrokenPipe);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_spectator_failure_does_not_touch_players() {
        let cipher = Arc::new(TransportCipher::generate().unwrap());
        let spectators = Arc::new(SpectatorSet::new());

        let broken = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let (tx, rx) = mpsc::channel(4);
        spectators.register(addr(9005), tx);
        let writer = spawn_spectator_writer(broken, rx, addr(9005));

        let (left, left_peer) = tokio::io::duplex(1 << 16);
        let (right, right_peer) = tokio::io::duplex(1 << 16);
        let mut broadcaster =
            Broadcaster::new(Arc::clone(&cipher), left, right, Arc::clone(&spectators));

        // First frame reaches the queue; the writer then fails on it.
        let first = broadcaster.broadcast(&sample_state()).await.unwrap();
        assert_eq!(first.delivered, 1);
        writer.await.unwrap();

        // Next tick notices the closed queue and prunes only that spectator.
        let second = broadcaster.broadcast(&sample_state()).await.unwrap();
        assert_eq!(second.removed, 1);
        assert!(spectators.is_empty());

        for peer in [left_peer, right_peer] {
            let mut reader = BufReader::new(peer);
            for _ in 0..2 {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                assert_eq!(cipher.decrypt_line(line.trim()).unwrap(), "215 200 320 240 1 2");
            }
        }
    }
}
