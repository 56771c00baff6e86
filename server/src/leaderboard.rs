//! Persistent win counter keyed by player initials.
//!
//! Every increment rewrites the whole file through a temp file and rename.

use crate::store::{load_json, write_json_atomic, StoreError};
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Number of characters kept when deriving initials from a username.
pub const INITIALS_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub initials: String,
    pub wins: u32,
}

pub struct Leaderboard {
    path: PathBuf,
    wins: Mutex<HashMap<String, u32>>,
    // Orders increment+write pairs so an older snapshot never lands on disk last.
    persist: tokio::sync::Mutex<()>,
}

impl Leaderboard {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let wins: HashMap<String, u32> = load_json(&path)?;
        info!(
            "Loaded leaderboard with {} entr{} from {}",
            wins.len(),
            if wins.len() == 1 { "y" } else { "ies" },
            path.display()
        );

        Ok(Self {
            path,
            wins: Mutex::new(wins),
            persist: tokio::sync::Mutex::new(()),
        })
    }

    /// Adds one win for `identity` and flushes the table to disk.
    /// Returns the new win count.
    ///
    /// If the write fails the increment is undone, so the served table never
    /// shows a win that is not on disk.
    pub async fn record_win(&self, identity: &str) -> Result<u32, StoreError> {
        let _persist = self.persist.lock().await;

        let (count, snapshot) = {
            let mut wins = self.wins.lock().unwrap_or_else(PoisonError::into_inner);
            let count = wins.entry(identity.to_string()).or_insert(0);
            *count += 1;
            (*count, wins.clone())
        };

        if let Err(e) = write_json_atomic(&self.path, &snapshot).await {
            let mut wins = self.wins.lock().unwrap_or_else(PoisonError::into_inner);
            if count <= 1 {
                wins.remove(identity);
            } else {
                wins.insert(identity.to_string(), count - 1);
            }
            return Err(e);
        }

        info!("Recorded win for {} (total {})", identity, count);
        Ok(count)
    }

    pub fn wins(&self, identity: &str) -> u32 {
        self.wins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .copied()
            .unwrap_or(0)
    }

    /// Ranked copy of the table: most wins first, ties broken alphabetically.
    pub fn snapshot(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .wins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(initials, wins)| LeaderboardEntry {
                initials: initials.clone(),
                wins: *wins,
            })
            .collect();

        entries.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.initials.cmp(&b.initials)));
        entries
    }
}

/// Leaderboard key for a username: its leading alphanumerics, upper-cased.
pub fn initials(username: &str) -> String {
    let initials: String = username
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(INITIALS_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if initials.is_empty() {
        "???".to_string()
    } else {
        initials
    }
}
