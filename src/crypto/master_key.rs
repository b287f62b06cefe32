//! Per-user master key, generated once and kept on the local machine.
//!
//! The key lives hex-encoded in `~/.hush/master.key` (directory 0700, file
//! 0600). `HUSH_MASTER_KEY` may supply it instead for headless machines.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Key length in bytes (256 bits for AES-256)
pub const KEY_LENGTH: usize = 32;

/// Environment variable that overrides the key file
pub const MASTER_KEY_ENV: &str = "HUSH_MASTER_KEY";

const KEY_FILE_NAME: &str = "master.key";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("master key not found at {0}: run `hush init` first")]
    NotFound(String),

    #[error("master key already exists at {0}; refusing to overwrite it")]
    AlreadyExists(String),

    #[error("invalid master key: {0}")]
    InvalidFormat(String),

    #[error("unable to determine home directory")]
    NoHomeDir,

    #[error("master key io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The symmetric key used for every envelope operation.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LENGTH]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Draw a new key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Parse a key from hex or base64 format.
    pub fn parse(key_str: &str) -> Result<Self, KeyError> {
        let trimmed = key_str.trim();

        // Try hex first (64 characters = 32 bytes)
        if trimmed.len() == KEY_LENGTH * 2 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes =
                hex::decode(trimmed).map_err(|e| KeyError::InvalidFormat(e.to_string()))?;
            let mut key = [0u8; KEY_LENGTH];
            key.copy_from_slice(&bytes);
            return Ok(Self(key));
        }

        let bytes = BASE64
            .decode(trimmed)
            .map_err(|_| KeyError::InvalidFormat("neither valid hex nor base64".to_string()))?;

        if bytes.len() != KEY_LENGTH {
            return Err(KeyError::InvalidFormat(format!(
                "key must be {} bytes, got {} bytes",
                KEY_LENGTH,
                bytes.len()
            )));
        }

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// What `generate_with` does when a key file is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExisting {
    /// Fail with [`KeyError::AlreadyExists`].
    Refuse,
    /// Destroy the old key. Everything sealed under it becomes unrecoverable.
    Overwrite,
}

/// File-backed master key storage.
#[derive(Debug, Clone)]
pub struct MasterKeyStore {
    path: PathBuf,
}

impl MasterKeyStore {
    /// Store rooted at an explicit key file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.hush/master.key`.
    pub fn default_location() -> Result<Self, KeyError> {
        let dir = crate::util::hush_dir().ok_or(KeyError::NoHomeDir)?;
        Ok(Self::new(dir.join(KEY_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Generate and persist a key exactly once.
    pub fn generate(&self) -> Result<MasterKey, KeyError> {
        self.generate_with(OnExisting::Refuse)
    }

    pub fn generate_with(&self, on_existing: OnExisting) -> Result<MasterKey, KeyError> {
        if let Some(parent) = self.path.parent() {
            crate::util::create_private_dir(parent)?;
        }

        let key = MasterKey::generate();
        let contents = format!("{}\n", key.to_hex());

        match on_existing {
            OnExisting::Refuse => {
                let mut file = match crate::util::private_file_options()
                    .create_new(true)
                    .open(&self.path)
                {
                    Ok(file) => file,
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        return Err(KeyError::AlreadyExists(self.path.display().to_string()));
                    }
                    Err(e) => return Err(e.into()),
                };
                file.write_all(contents.as_bytes())?;
                file.sync_all()?;
            }
            OnExisting::Overwrite => {
                if self.exists() {
                    tracing::warn!(
                        path = %self.path.display(),
                        "Overwriting existing master key; secrets sealed under it are lost"
                    );
                }
                crate::util::write_private_file(&self.path, contents.as_bytes())?;
            }
        }

        tracing::info!(path = %self.path.display(), "Generated new master key");
        Ok(key)
    }

    /// Load the key, preferring `HUSH_MASTER_KEY` over the key file.
    pub fn load(&self) -> Result<MasterKey, KeyError> {
        self.load_with(|name| std::env::var(name).ok())
    }

    fn load_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<MasterKey, KeyError> {
        match lookup(MASTER_KEY_ENV) {
            Some(value) if !value.trim().is_empty() => MasterKey::parse(&value),
            _ => self.load_file(),
        }
    }

    /// Load the key from the key file only.
    pub fn load_file(&self) -> Result<MasterKey, KeyError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeyError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        #[cfg(unix)]
        crate::util::warn_if_not_private(&self.path);

        MasterKey::parse(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> MasterKeyStore {
        MasterKeyStore::new(dir.path().join("hush").join(KEY_FILE_NAME))
    }

    #[test]
    fn test_generate_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.exists());

        let key = store.generate().unwrap();
        assert!(store.exists());
        assert_eq!(store.load_file().unwrap(), key);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load_file(), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_second_generate_refuses_and_keeps_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let original = store.generate().unwrap();
        assert!(matches!(store.generate(), Err(KeyError::AlreadyExists(_))));
        assert_eq!(store.load_file().unwrap(), original);
    }

    #[test]
    fn test_explicit_overwrite_replaces_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let original = store.generate().unwrap();
        let replacement = store.generate_with(OnExisting::Overwrite).unwrap();
        assert_ne!(original, replacement);
        assert_eq!(store.load_file().unwrap(), replacement);
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.generate().unwrap();

        let file_mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(store.path().parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_parse_key_hex_and_base64() {
        let hex_key = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
        let key = MasterKey::parse(hex_key).unwrap();
        for (i, byte) in key.as_bytes().iter().enumerate() {
            assert_eq!(*byte, i as u8);
        }

        let b64 = BASE64.encode(key.as_bytes());
        assert_eq!(MasterKey::parse(&b64).unwrap(), key);
    }

    #[test]
    fn test_parse_key_invalid() {
        assert!(MasterKey::parse("abc").is_err());
        assert!(MasterKey::parse(&"z".repeat(64)).is_err());
        assert!(MasterKey::parse(&BASE64.encode([1u8; 16])).is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = MasterKey::from_bytes([0xAB; KEY_LENGTH]);
        let rendered = format!("{:?}", key);
        assert!(!rendered.to_lowercase().contains("abab"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_env_key_takes_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let on_disk = store.generate().unwrap();

        let from_env = MasterKey::from_bytes([7u8; KEY_LENGTH]);
        let hex_key = from_env.to_hex();
        let loaded = store
            .load_with(|name| (name == MASTER_KEY_ENV).then(|| hex_key.clone()))
            .unwrap();
        assert_eq!(loaded, from_env);
        assert_ne!(loaded, on_disk);

        // Blank or absent falls back to the file.
        assert_eq!(store.load_with(|_| Some("  ".into())).unwrap(), on_disk);
        assert_eq!(store.load_with(|_| None).unwrap(), on_disk);

        assert!(matches!(
            store.load_with(|_| Some("not-a-key".into())),
            Err(KeyError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_corrupt_key_file_is_invalid_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.generate().unwrap();
        fs::write(store.path(), "this is not a key\n").unwrap();

        assert!(matches!(store.load_file(), Err(KeyError::InvalidFormat(_))));
    }
}
