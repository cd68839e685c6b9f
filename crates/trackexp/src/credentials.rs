//! Encrypted persistence for the signed-in user's bearer token and identity.
//!
//! The credential is serialized to JSON, sealed with AES-256-GCM under a fresh
//! nonce and written next to a randomly generated key file. Only the sealed
//! form ever reaches disk.
//!
//! Every call does blocking file IO. Async callers run it on the blocking pool.

use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

const KEY_FILE: &str = "credentials.key";
const DATA_FILE: &str = "credentials.enc";
const NONCE_LEN: usize = 12;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub auth_token: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("auth_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedFile {
    nonce: String,
    ciphertext: String,
}

pub struct CredentialStore {
    path: PathBuf,
    cipher: Aes256Gcm,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Opens the store rooted at `dir`, creating the directory and key on first use.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let cipher = load_or_create_key(&dir.join(KEY_FILE))?;
        Ok(Self {
            path: dir.join(DATA_FILE),
            cipher,
        })
    }

    pub fn save(&self, credential: &Credential) -> Result<(), CredentialError> {
        let plaintext = serde_json::to_vec(credential)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| CredentialError::Encrypt)?;

        let sealed = SealedFile {
            nonce: BASE64_STANDARD.encode(nonce),
            ciphertext: BASE64_STANDARD.encode(ciphertext),
        };
        write_atomic(&self.path, &serde_json::to_vec(&sealed)?)?;
        Ok(())
    }

    pub fn get(&self) -> Result<Option<Credential>, CredentialError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let sealed: SealedFile = serde_json::from_slice(&raw)?;
        let nonce = BASE64_STANDARD.decode(sealed.nonce)?;
        if nonce.len() != NONCE_LEN {
            return Err(CredentialError::Decrypt);
        }
        let ciphertext = BASE64_STANDARD.decode(sealed.ciphertext)?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| CredentialError::Decrypt)?;

        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    /// Removes the stored credential. Clearing an empty store is a no-op.
    pub fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn auth_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.get()?.map(|credential| credential.auth_token))
    }

    pub fn user_id(&self) -> Result<Option<i64>, CredentialError> {
        Ok(self.get()?.map(|credential| credential.user_id))
    }

    pub fn username(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.get()?.map(|credential| credential.username))
    }

    pub fn email(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.get()?.map(|credential| credential.email))
    }
}

fn load_or_create_key(path: &Path) -> Result<Aes256Gcm, CredentialError> {
    match fs::read_to_string(path) {
        Ok(encoded) => {
            let bytes = BASE64_STANDARD.decode(encoded.trim())?;
            Aes256Gcm::new_from_slice(&bytes).map_err(|_| {
                CredentialError::InvalidKey(format!("{} is not a 256-bit key", path.display()))
            })
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let key = Aes256Gcm::generate_key(OsRng);
            write_private(path, BASE64_STANDARD.encode(key).as_bytes())?;
            tracing::debug!(path = %path.display(), "created credential key");
            Ok(Aes256Gcm::new(&key))
        }
        Err(err) => Err(err.into()),
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let tmp = path.with_extension("tmp");
    write_private(&tmp, contents)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(&tmp, path)?;
            let _ = fs::remove_file(&tmp);
            Ok(())
        }
    }
}

fn write_private(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
