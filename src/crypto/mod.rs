//! Client-side cryptography.
//!
//! ## Layout
//!
//! - `master_key`: the per-user key file (`~/.hush/master.key`)
//! - `envelope`: AES-256-GCM seal/open into a self-contained string
//!
//! ## Usage
//!
//! ```ignore
//! let store = MasterKeyStore::default_location()?;
//! let key = store.load()?;
//!
//! let sealed = envelope::seal(&key, "postgres://x")?;
//! assert_eq!(envelope::open(&key, &sealed)?, "postgres://x");
//! ```

pub mod envelope;
pub mod master_key;

pub use envelope::{is_envelope, open, seal, EnvelopeError};
pub use master_key::{KeyError, MasterKey, MasterKeyStore, OnExisting, KEY_LENGTH};
