//! Read-only HTTP view of the leaderboard.

use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use log::{error, info, warn};
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn router(leaderboard: Arc<Leaderboard>) -> Router {
    Router::new()
        .route("/", get(leaderboard_page))
        .route("/leaderboard", get(leaderboard_page))
        .fallback(not_found)
        .with_state(leaderboard)
}

/// Serves the leaderboard on an already bound listener until it fails.
pub async fn serve(listener: TcpListener, leaderboard: Arc<Leaderboard>) -> io::Result<()> {
    axum::serve(listener, router(leaderboard)).await
}

/// Runs the service in the background. Failing to bind is logged and leaves
/// the game server running without it.
pub fn spawn(addr: String, leaderboard: Arc<Leaderboard>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Leaderboard HTTP service not started, cannot bind {}: {}", addr, e);
                return;
            }
        };
        info!("Leaderboard available at http://{}/leaderboard", addr);

        if let Err(e) = serve(listener, leaderboard).await {
            error!("Leaderboard HTTP service stopped: {}", e);
        }
    })
}

async fn leaderboard_page(State(leaderboard): State<Arc<Leaderboard>>) -> Html<String> {
    Html(render_table(&leaderboard.snapshot()))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

pub fn render_table(entries: &[LeaderboardEntry]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><title>Pong Leaderboard</title></head>\n<body>\n\
         <h1>Leaderboard</h1>\n<table>\n<tr><th>Rank</th><th>Player</th><th>Wins</th></tr>\n",
    );

    if entries.is_empty() {
        html.push_str("<tr><td colspan=\"3\">No matches played yet</td></tr>\n");
    }
    for (rank, entry) in entries.iter().enumerate() {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            rank + 1,
            escape(&entry.initials),
            entry.wins
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::scratch_dir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn get_path(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_render_ranks_in_order() {
        let html = render_table(&[
            LeaderboardEntry {
                initials: "CAT".to_string(),
                wins: 4,
            },
            LeaderboardEntry {
                initials: "A<B".to_string(),
                wins: 1,
            },
        ]);

        let cat = html.find("<td>1</td><td>CAT</td><td>4</td>").unwrap();
        let second = html.find("<td>2</td><td>A&lt;B</td><td>1</td>").unwrap();
        assert!(cat < second);
    }

    #[test]
    fn test_render_empty_board() {
        assert!(render_table(&[]).contains("No matches played yet"));
    }

    #[tokio::test]
    async fn test_serves_leaderboard_and_404() {
        let dir = scratch_dir("http");
        let leaderboard = Arc::new(Leaderboard::open(dir.join("leaderboard.json")).unwrap());
        leaderboard.record_win("AMY").await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::clone(&leaderboard)));

        for path in ["/", "/leaderboard"] {
            let response = get_path(addr, path).await;
            assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
            assert!(response.contains("<td>AMY</td><td>1</td>"));
        }

        let response = get_path(addr, "/admin").await;
        assert!(response.starts_with("HTTP/1.1 404"), "{}", response);
    }

    #[tokio::test]
    async fn test_bind_failure_is_not_fatal() {
        let dir = scratch_dir("http-bind");
        let leaderboard = Arc::new(Leaderboard::open(dir.join("leaderboard.json")).unwrap());

        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap().to_string();

        // Returns instead of panicking or hanging.
        spawn(addr, leaderboard).await.unwrap();
    }
}
