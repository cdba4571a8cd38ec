//! journal-core — client-side sync for encrypted, hash-chained journals
//!
//! A journal is an append-only list of encrypted entries. Every entry's uid
//! is an HMAC over its predecessor's uid and its own ciphertext, so a batch
//! fetched from the server can be verified link by link from a trusted
//! checkpoint.
//!
//! # Module layout
//! - `crypto`      — journal key, crypto provider trait, XChaCha20/HMAC default
//! - `entry`       — entry record, linking, verification, chain builder
//! - `transport`   — blocking HTTP round trip and status → error mapping
//! - `client`      — fetch/push for one journal resource
//! - `cursor`      — caller-held checkpoint
//! - `config`      — client configuration (file + environment)
//! - `credentials` — login credentials and their versioned encoding
//! - `error`       — error types

pub mod client;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod transport;

pub use client::JournalClient;
pub use crypto::{CryptoProvider, SymmetricKey, XChaChaProvider};
pub use cursor::SyncCursor;
pub use entry::JournalEntry;
pub use error::{CryptoError, JournalError, Result};
pub use reqwest::Url;
