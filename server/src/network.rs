//! TCP front end and the fixed-tick match loop.

use crate::admission::AdmissionPolicy;
use crate::auth::{authenticate_player, AccountClaims};
use crate::broadcast::{spawn_spectator_writer, Broadcaster, SpectatorSet, SPECTATOR_QUEUE_LEN};
use crate::credentials::{CredentialStore, DEFAULT_ITERATIONS};
use crate::game::{Match, MatchEvent, Side};
use crate::input::{run_input_channel, PlayerSlot};
use crate::leaderboard::{initials, Leaderboard};
use crate::{http, ServerResult};
use log::{debug, error, info, warn};
use shared::{ConnectInfo, Role, TransportCipher, SCREEN_HEIGHT, SCREEN_WIDTH, TICK_RATE, WIN_SCORE};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the game socket.
    pub bind_addr: String,
    /// Address of the leaderboard HTTP service; `None` disables it.
    pub http_addr: Option<String>,
    pub tick_rate: u32,
    pub win_score: i32,
    /// Directory holding the account, leaderboard and key files.
    pub data_dir: PathBuf,
    pub pbkdf2_iterations: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:6000".to_string(),
            http_addr: Some("0.0.0.0:8080".to_string()),
            tick_rate: TICK_RATE,
            win_score: WIN_SCORE,
            data_dir: PathBuf::from("."),
            pbkdf2_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl ServerConfig {
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    pub fn leaderboard_path(&self) -> PathBuf {
        self.data_dir.join("leaderboard.json")
    }

    pub fn key_path(&self) -> PathBuf {
        self.data_dir.join("transport.key")
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

/// A player that finished the auth exchange.
struct AdmittedPlayer {
    slot: Arc<PlayerSlot>,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    cipher: Arc<TransportCipher>,
    credentials: Arc<CredentialStore>,
    leaderboard: Arc<Leaderboard>,
    spectators: Arc<SpectatorSet>,
}

impl Server {
    /// Opens the persistent stores and binds the game socket.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        let cipher = Arc::new(TransportCipher::load_or_generate(config.key_path())?);
        let credentials = Arc::new(CredentialStore::with_iterations(
            config.users_path(),
            config.pbkdf2_iterations,
        )?);
        let leaderboard = Arc::new(Leaderboard::open(config.leaderboard_path())?);

        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            config,
            cipher,
            credentials,
            leaderboard,
            spectators: Arc::new(SpectatorSet::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn leaderboard(&self) -> Arc<Leaderboard> {
        Arc::clone(&self.leaderboard)
    }

    /// Admits two players, then plays until one of them is lost.
    pub async fn run(self) -> ServerResult<()> {
        let http_task = self
            .config
            .http_addr
            .clone()
            .map(|addr| http::spawn(addr, Arc::clone(&self.leaderboard)));

        let (left, right) = self.admit_players().await?;
        info!(
            "Match starting: {} (left) vs {} (right)",
            left.slot.identity(),
            right.slot.identity()
        );

        let left_slot = Arc::clone(&left.slot);
        let right_slot = Arc::clone(&right.slot);
        let readers = [
            tokio::spawn(run_input_channel(
                left.reader,
                Arc::clone(&self.cipher),
                Arc::clone(&left_slot),
            )),
            tokio::spawn(run_input_channel(
                right.reader,
                Arc::clone(&self.cipher),
                Arc::clone(&right_slot),
            )),
        ];

        let Server {
            listener,
            config,
            cipher,
            leaderboard,
            spectators,
            ..
        } = self;
        let acceptor = tokio::spawn(accept_spectators(listener, Arc::clone(&spectators)));

        let mut broadcaster =
            Broadcaster::new(cipher, left.writer, right.writer, Arc::clone(&spectators));
        let result = run_match(
            &config,
            &leaderboard,
            &mut broadcaster,
            &left_slot,
            &right_slot,
        )
        .await;

        info!("Shutting down match");
        acceptor.abort();
        for reader in readers {
            reader.abort();
        }
        broadcaster.close().await;
        spectators.clear();
        if let Some(task) = http_task {
            task.abort();
        }

        result
    }

    /// Fills both player slots.
    ///
    /// Each player is greeted on arrival and authenticates on its own task,
    /// so one slow peer does not hold up the other slot.
    async fn admit_players(&self) -> ServerResult<(AdmittedPlayer, AdmittedPlayer)> {
        let mut policy = AdmissionPolicy::new();
        let claims = Arc::new(AccountClaims::new());
        let mut pending = JoinSet::new();
        let mut left = None;
        let mut right = None;

        while !policy.players_ready() {
            tokio::select! {
                accepted = self.listener.accept(), if policy.has_open_slot() => {
                    let (stream, addr) = accepted?;
                    let side = match policy.admit() {
                        Some(Role::Left) => Side::Left,
                        Some(Role::Right) => Side::Right,
                        _ => return Err("player admission out of order".into()),
                    };
                    pending.spawn(admit_connection(
                        stream,
                        addr,
                        side,
                        Arc::clone(&self.credentials),
                        Arc::clone(&claims),
                    ));
                }
                Some(joined) = pending.join_next() => {
                    let (side, player) = joined?;
                    match player {
                        Some(player) => {
                            policy.authenticated(side_role(side));
                            match side {
                                Side::Left => left = Some(player),
                                Side::Right => right = Some(player),
                            }
                        }
                        None => policy.abandoned(side_role(side)),
                    }
                }
                else => return Err("player admission stalled".into()),
            }
        }

        match (left, right) {
            (Some(left), Some(right)) => Ok((left, right)),
            _ => Err("player admission out of order".into()),
        }
    }
}

fn side_role(side: Side) -> Role {
    match side {
        Side::Left => Role::Left,
        Side::Right => Role::Right,
    }
}

/// Greets one player and runs its auth exchange.
async fn admit_connection(
    stream: TcpStream,
    addr: SocketAddr,
    side: Side,
    credentials: Arc<CredentialStore>,
    claims: Arc<AccountClaims>,
) -> (Side, Option<AdmittedPlayer>) {
    info!("{:?} player connected from {}", side, addr);

    let (read_half, mut writer) = stream.into_split();
    if let Err(e) = send_connect_line(&mut writer, side_role(side)).await {
        warn!("Lost {:?} player at {} before auth: {}", side, addr, e);
        return (side, None);
    }

    let mut reader = BufReader::new(read_half);
    match authenticate_player(&mut reader, &mut writer, &credentials, &claims).await {
        Ok(Some(username)) => {
            info!("{:?} slot taken by {} from {}", side, username, addr);
            let player = AdmittedPlayer {
                slot: Arc::new(PlayerSlot::new(side, username)),
                reader,
                writer,
            };
            return (side, Some(player));
        }
        Ok(None) => warn!("{:?} player at {} left during auth", side, addr),
        Err(e) => warn!("{:?} player at {} failed during auth: {}", side, addr, e),
    }
    (side, None)
}

async fn send_connect_line<W>(writer: &mut W, role: Role) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let info = ConnectInfo {
        width: SCREEN_WIDTH,
        height: SCREEN_HEIGHT,
        role,
    };
    writer.write_all(format!("{}\n", info).as_bytes()).await?;
    writer.flush().await
}

/// Accepts spectators for the rest of the server's life.
async fn accept_spectators(listener: TcpListener, spectators: Arc<SpectatorSet>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Error accepting spectator: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        // Spectator input is never read.
        let (_, mut writer) = stream.into_split();
        if let Err(e) = send_connect_line(&mut writer, Role::Spectator).await {
            warn!("Spectator at {} dropped before registering: {}", addr, e);
            continue;
        }

        let (tx, rx) = mpsc::channel(SPECTATOR_QUEUE_LEN);
        spectators.register(addr, tx);
        spawn_spectator_writer(writer, rx, addr);
    }
}

/// Fixed-tick loop: simulate, record wins, broadcast. Returns once a player
/// can no longer be written to.
async fn run_match<W>(
    config: &ServerConfig,
    leaderboard: &Leaderboard,
    broadcaster: &mut Broadcaster<W>,
    left: &PlayerSlot,
    right: &PlayerSlot,
) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut game = Match::new(config.win_score);
    let mut ticker = interval(config.tick_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match game.tick(left, right) {
            Some(MatchEvent::Won(side)) => {
                let winner = if side == Side::Left { left } else { right };
                let identity = initials(winner.identity());
                if let Err(e) = leaderboard.record_win(&identity).await {
                    error!("Failed to record win for {}: {}", identity, e);
                }
            }
            Some(MatchEvent::Restarted) => info!("Rematch started"),
            None => {}
        }

        match broadcaster.broadcast(&game.state().to_line()).await {
            Ok(fan_out) if fan_out.removed > 0 => {
                debug!("Pruned {} spectator(s)", fan_out.removed);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("{}; ending match", e);
                return Ok(());
            }
        }

        if game.tick % (config.tick_rate.max(1) * 10) == 0 {
            debug!(
                "Tick {}: left connected {}, right connected {}",
                game.tick,
                left.is_connected(),
                right.is_connected()
            );
        }
    }
}
