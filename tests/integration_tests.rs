//! Integration tests for the Pong server and client
//!
//! These tests run a real server on a loopback port and drive it with the
//! client library, covering admission, auth, encryption, spectating, scoring
//! and rematches end to end.

use client::network::{ClientError, Connection, StateStream};
use server::leaderboard::Leaderboard;
use server::network::{Server, ServerConfig};
use shared::{AuthCommand, AuthReply, PlayerCommand, Role, StateLine, TransportCipher};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(10);

fn data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pong-it-{}-{}", std::process::id(), name));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn config(name: &str, win_score: i32) -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        http_addr: None,
        win_score,
        data_dir: data_dir(name),
        pbkdf2_iterations: 1_000,
        ..ServerConfig::default()
    }
}

async fn within<T>(future: impl Future<Output = T>) -> T {
    timeout(STEP, future).await.expect("timed out")
}

fn register(username: &str) -> AuthCommand {
    AuthCommand::Register {
        username: username.to_string(),
        password: format!("{}-pw", username),
    }
}

/// Reads states until one satisfies `predicate`.
async fn wait_for(
    states: &mut StateStream,
    predicate: impl Fn(&StateLine) -> bool,
) -> Result<StateLine, ClientError> {
    loop {
        match states.next_state().await? {
            Some(state) if predicate(&state) => return Ok(state),
            Some(_) => continue,
            None => return Err(ClientError::Closed),
        }
    }
}

/// Everything a test needs once both players are in.
struct Lobby {
    addr: String,
    cipher: Arc<TransportCipher>,
    left: Connection,
    right: Connection,
}

async fn start_match(config: ServerConfig) -> (Lobby, JoinHandle<()>, Arc<Leaderboard>) {
    let key_path = config.key_path();
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let leaderboard = server.leaderboard();
    let handle = tokio::spawn(async move {
        server.run().await.unwrap();
    });

    let mut left = within(Connection::connect(&addr)).await.unwrap();
    assert_eq!(left.role(), Role::Left);
    assert_eq!((left.info().width, left.info().height), (640, 480));
    let reply = within(left.authenticate(&register("alice"))).await.unwrap();
    assert_eq!(reply, AuthReply::Registered);

    let mut right = within(Connection::connect(&addr)).await.unwrap();
    assert_eq!(right.role(), Role::Right);

    // The left player's account cannot be used for the right paddle.
    let reply = within(right.authenticate(&AuthCommand::Login {
        username: "alice".to_string(),
        password: "alice-pw".to_string(),
    }))
    .await
    .unwrap();
    assert_eq!(reply, AuthReply::Error("already playing".to_string()));

    let reply = within(right.authenticate(&register("bob"))).await.unwrap();
    assert_eq!(reply, AuthReply::Registered);

    let cipher = Arc::new(TransportCipher::load(key_path).unwrap());
    (
        Lobby {
            addr,
            cipher,
            left,
            right,
        },
        handle,
        leaderboard,
    )
}

/// END-TO-END MATCH TESTS
mod match_tests {
    use super::*;

    /// Players see encrypted state and steer; spectators see plaintext; a lost
    /// player ends the match.
    #[tokio::test]
    async fn players_steer_and_spectators_watch() {
        let (lobby, server, _) = start_match(config("steer", 5)).await;

        let spectator = within(Connection::connect(&lobby.addr)).await.unwrap();
        assert_eq!(spectator.role(), Role::Spectator);
        let mut watching = spectator.into_spectator();

        let (mut left_states, mut left_commands) =
            lobby.left.into_player(Arc::clone(&lobby.cipher)).unwrap();
        let (right_states, right_commands) = lobby.right.into_player(lobby.cipher).unwrap();

        let first = within(left_states.next_state()).await.unwrap().unwrap();
        assert_eq!((first.left_score, first.right_score), (0, 0));

        within(left_commands.send(PlayerCommand::Up)).await.unwrap();
        let moved = within(wait_for(&mut left_states, |s| s.left_paddle_y < first.left_paddle_y))
            .await
            .unwrap();
        assert!(moved.left_paddle_y >= 10);

        // The spectator follows the same match without a key.
        within(wait_for(&mut watching, |s| s.left_paddle_y < 215))
            .await
            .unwrap();

        drop(right_states);
        drop(right_commands);
        within(server).await.unwrap();

        // Teardown closes the remaining streams.
        assert!(matches!(
            within(wait_for(&mut watching, |_| false)).await,
            Err(ClientError::Closed)
        ));
        assert!(within(wait_for(&mut left_states, |_| false)).await.is_err());
    }

    /// A finished match is recorded once and restarts only when both players
    /// are ready.
    #[tokio::test]
    async fn win_is_recorded_and_rematch_resets() {
        let (lobby, server, leaderboard) = start_match(config("rematch", 1)).await;

        let (mut left_states, mut left_commands) =
            lobby.left.into_player(Arc::clone(&lobby.cipher)).unwrap();
        let (mut right_states, mut right_commands) =
            lobby.right.into_player(lobby.cipher).unwrap();

        // The opening serve heads left; move the left paddle out of its way.
        within(left_commands.send(PlayerCommand::Up)).await.unwrap();
        let won = within(wait_for(&mut left_states, |s| s.right_score == 1))
            .await
            .unwrap();
        assert_eq!(won.left_score, 0);
        assert_eq!(leaderboard.wins("BOB"), 1);
        within(wait_for(&mut right_states, |s| s.right_score == 1))
            .await
            .unwrap();

        // One ready player is not enough. The right stream is abandoned after
        // the timeout cuts a read short.
        within(left_commands.send(PlayerCommand::Ready)).await.unwrap();
        let early = timeout(
            Duration::from_millis(300),
            wait_for(&mut right_states, |s| s.right_score == 0),
        )
        .await;
        assert!(early.is_err());
        drop(right_states);

        within(right_commands.send(PlayerCommand::Ready)).await.unwrap();
        let reset = within(wait_for(&mut left_states, |s| s.right_score == 0))
            .await
            .unwrap();
        assert_eq!(reset.left_score, 0);
        // Still exactly one recorded win.
        assert_eq!(leaderboard.wins("BOB"), 1);

        drop(left_states);
        drop(left_commands);
        within(server).await.unwrap();
    }

    /// A player that leaves during auth frees the slot for the next connection.
    #[tokio::test]
    async fn abandoned_auth_frees_the_slot() {
        let config = config("abandon", 5);
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let handle = tokio::spawn(server.run());

        let quitter = within(Connection::connect(&addr)).await.unwrap();
        assert_eq!(quitter.role(), Role::Left);
        let mut right = within(Connection::connect(&addr)).await.unwrap();
        assert_eq!(right.role(), Role::Right);

        // Both slots are in auth, so the next arrival waits for the left one
        // to be given up.
        drop(quitter);
        let mut left = within(Connection::connect(&addr)).await.unwrap();
        assert_eq!(left.role(), Role::Left);

        within(left.authenticate_or_fail(&register("carol")))
            .await
            .unwrap();
        within(right.authenticate_or_fail(&register("dan")))
            .await
            .unwrap();

        let spectator = within(Connection::connect(&addr)).await.unwrap();
        assert_eq!(spectator.role(), Role::Spectator);

        handle.abort();
    }

    /// A silent first player does not hold up the second slot.
    #[tokio::test]
    async fn second_player_is_greeted_while_first_authenticates() {
        let config = config("concurrent", 5);
        let key_path = config.key_path();
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            server.run().await.unwrap();
        });

        let mut left = within(Connection::connect(&addr)).await.unwrap();
        assert_eq!(left.role(), Role::Left);

        // Left has not sent a byte yet.
        let mut right = within(Connection::connect(&addr)).await.unwrap();
        assert_eq!(right.role(), Role::Right);
        let reply = within(right.authenticate(&register("bob"))).await.unwrap();
        assert_eq!(reply, AuthReply::Registered);

        // Bob's account is claimed before the match starts.
        let reply = within(left.authenticate(&AuthCommand::Login {
            username: "bob".to_string(),
            password: "bob-pw".to_string(),
        }))
        .await
        .unwrap();
        assert_eq!(reply, AuthReply::Error("already playing".to_string()));
        let reply = within(left.authenticate(&register("alice"))).await.unwrap();
        assert_eq!(reply, AuthReply::Registered);

        let cipher = Arc::new(TransportCipher::load(key_path).unwrap());
        let (mut left_states, _left_commands) = left.into_player(Arc::clone(&cipher)).unwrap();
        let (right_states, right_commands) = right.into_player(cipher).unwrap();

        let first = within(left_states.next_state()).await.unwrap().unwrap();
        assert_eq!((first.left_score, first.right_score), (0, 0));

        let spectator = within(Connection::connect(&addr)).await.unwrap();
        assert_eq!(spectator.role(), Role::Spectator);

        drop(right_states);
        drop(right_commands);
        within(handle).await.unwrap();
    }
}

/// PERSISTENCE TESTS
mod persistence_tests {
    use super::*;

    /// Accounts and the transport key survive a server restart.
    #[tokio::test]
    async fn accounts_and_key_survive_restart() {
        let first = config("restart", 5);
        let dir = first.data_dir.clone();

        let server = Server::bind(first).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let handle = tokio::spawn(server.run());
        let mut player = within(Connection::connect(&addr)).await.unwrap();
        within(player.authenticate_or_fail(&register("dave")))
            .await
            .unwrap();
        handle.abort();
        let key_before = std::fs::read_to_string(dir.join("transport.key")).unwrap();

        let second = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            http_addr: None,
            data_dir: dir.clone(),
            pbkdf2_iterations: 1_000,
            ..ServerConfig::default()
        };
        let server = Server::bind(second).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let handle = tokio::spawn(server.run());

        let mut player = within(Connection::connect(&addr)).await.unwrap();
        let reply = within(player.authenticate(&register("dave"))).await.unwrap();
        assert_eq!(reply, AuthReply::Error("already exists".to_string()));
        let reply = within(player.authenticate(&AuthCommand::Login {
            username: "dave".to_string(),
            password: "dave-pw".to_string(),
        }))
        .await
        .unwrap();
        assert_eq!(reply, AuthReply::LoggedIn);

        handle.abort();
        let key_after = std::fs::read_to_string(dir.join("transport.key")).unwrap();
        assert_eq!(key_before, key_after);
    }
}
