//! Persistent username → salted PBKDF2 hash mapping.
//!
//! Records are kept in memory and mirrored to a JSON file that is rewritten
//! atomically on every registration. Hashing runs on the blocking pool so a
//! registration in progress never stalls the runtime's worker threads.

use crate::store::{load_json, write_json_atomic, StoreError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{info, warn};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::digest::SHA256_OUTPUT_LEN;
use ring::pbkdf2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const DEFAULT_ITERATIONS: u32 = 200_000;
pub const SALT_LEN: usize = 16;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Stored form of one account. Salt and hash are base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub salt: String,
    pub hash: String,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    AlreadyExists,
    InvalidUsername,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

pub struct CredentialStore {
    path: PathBuf,
    iterations: NonZeroU32,
    // Held across check, insert and persist so same-name registrations serialize.
    users: Mutex<HashMap<String, CredentialRecord>>,
}

impl CredentialStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_iterations(path, DEFAULT_ITERATIONS)
    }

    /// Opens the store with a custom PBKDF2 cost for newly registered accounts.
    /// Existing records keep verifying with the cost they were created with.
    pub fn with_iterations(path: impl AsRef<Path>, iterations: u32) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let users: HashMap<String, CredentialRecord> = load_json(&path)?;
        info!("Loaded {} account(s) from {}", users.len(), path.display());

        Ok(Self {
            path,
            iterations: NonZeroU32::new(iterations).unwrap_or(NonZeroU32::MIN),
            users: Mutex::new(users),
        })
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Registration, StoreError> {
        let username = username.trim();
        if !is_valid_username(username) {
            return Ok(Registration::InvalidUsername);
        }

        if self.users.lock().await.contains_key(username) {
            return Ok(Registration::AlreadyExists);
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let iterations = self.iterations;
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || derive(iterations, &salt, &password)).await?;

        let record = CredentialRecord {
            salt: STANDARD.encode(salt),
            hash: STANDARD.encode(hash),
            iterations: iterations.get(),
        };

        let mut users = self.users.lock().await;
        if users.contains_key(username) {
            return Ok(Registration::AlreadyExists);
        }
        users.insert(username.to_string(), record);
        if let Err(e) = write_json_atomic(&self.path, &*users).await {
            users.remove(username);
            return Err(e);
        }

        info!("Registered account {}", username);
        Ok(Registration::Registered)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Verdict, StoreError> {
        let record = match self.users.lock().await.get(username.trim()) {
            Some(record) => record.clone(),
            None => return Ok(Verdict::Rejected),
        };

        let password = password.to_string();
        let verdict = tokio::task::spawn_blocking(move || verify(&record, &password)).await?;
        Ok(verdict)
    }

    pub async fn contains(&self, username: &str) -> bool {
        self.users.lock().await.contains_key(username.trim())
    }
}

fn is_valid_username(username: &str) -> bool {
    !username.is_empty() && !username.chars().any(char::is_whitespace)
}

fn derive(iterations: NonZeroU32, salt: &[u8], password: &str) -> [u8; SHA256_OUTPUT_LEN] {
    let mut hash = [0u8; SHA256_OUTPUT_LEN];
    pbkdf2::derive(ALGORITHM, iterations, salt, password.as_bytes(), &mut hash);
    hash
}

fn verify(record: &CredentialRecord, password: &str) -> Verdict {
    let (Ok(salt), Ok(hash)) = (STANDARD.decode(&record.salt), STANDARD.decode(&record.hash))
    else {
        warn!("Credential record has corrupt encoding");
        return Verdict::Rejected;
    };
    let Some(iterations) = NonZeroU32::new(record.iterations) else {
        return Verdict::Rejected;
    };

    match pbkdf2::verify(ALGORITHM, iterations, &salt, password.as_bytes(), &hash) {
        Ok(()) => Verdict::Accepted,
        Err(_) => Verdict::Rejected,
    }
}
