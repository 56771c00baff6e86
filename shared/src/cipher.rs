//! Symmetric cipher for player traffic.
//!
//! Each line is sealed with ChaCha20-Poly1305 under a fresh random nonce and
//! shipped as `base64(nonce || ciphertext || tag)`, so a token never contains
//! the `\n` that frames the protocol. The key lives in a small base64 file that
//! the server creates on first start and clients are handed out of band.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::info;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, CHACHA20_POLY1305, NONCE_LEN};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("key file error: {0}")]
    Io(#[from] io::Error),
    #[error("key material must be {KEY_LEN} base64-encoded bytes")]
    InvalidKey,
    #[error("token is not valid base64")]
    InvalidEncoding,
    #[error("token is too short")]
    Truncated,
    #[error("token failed authentication")]
    Rejected,
    #[error("plaintext is not valid UTF-8")]
    NotUtf8,
    #[error("line could not be sealed")]
    Seal,
}

pub struct TransportCipher {
    key: LessSafeKey,
    raw: [u8; KEY_LEN],
}

impl fmt::Debug for TransportCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportCipher").finish_non_exhaustive()
    }
}

impl TransportCipher {
    pub fn from_key(raw: [u8; KEY_LEN]) -> Result<Self, CipherError> {
        let unbound =
            UnboundKey::new(&CHACHA20_POLY1305, &raw).map_err(|_| CipherError::InvalidKey)?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            raw,
        })
    }

    /// Creates a cipher with a fresh random key.
    pub fn generate() -> Result<Self, CipherError> {
        let mut raw = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut raw);
        Self::from_key(raw)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::InvalidKey)?;
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CipherError::InvalidKey)?;
        Self::from_key(raw)
    }

    /// Loads an existing key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CipherError> {
        let encoded = fs::read_to_string(path)?;
        Self::from_base64(&encoded)
    }

    /// Loads the key file, or generates and persists a new key if it is absent.
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<Self, CipherError> {
        let path = path.as_ref();
        if path.exists() {
            info!("Loading transport key from {}", path.display());
            return Self::load(path);
        }

        let cipher = Self::generate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_key_file(path, &cipher.key_base64())?;
        info!("Generated new transport key at {}", path.display());
        Ok(cipher)
    }

    pub fn key_base64(&self) -> String {
        STANDARD.encode(self.raw)
    }

    pub fn encrypt_line(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CipherError::Seal)?;

        let mut token = Vec::with_capacity(NONCE_LEN + in_out.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&in_out);
        Ok(STANDARD.encode(token))
    }

    pub fn decrypt_line(&self, token: &str) -> Result<String, CipherError> {
        let bytes = STANDARD
            .decode(token.trim())
            .map_err(|_| CipherError::InvalidEncoding)?;
        if bytes.len() < NONCE_LEN + CHACHA20_POLY1305.tag_len() {
            return Err(CipherError::Truncated);
        }

        let (nonce_bytes, sealed) = bytes.split_at(NONCE_LEN);
        let nonce =
            Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CipherError::Truncated)?;
        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CipherError::Rejected)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::NotUtf8)
    }
}

/// Writes the key to a temp file beside `path` and renames it into place.
/// The file is readable by its owner only.
fn write_key_file(path: &Path, key_base64: &str) -> io::Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&temp)?;
    file.write_all(format!("{}\n", key_base64).as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp, path)
}
