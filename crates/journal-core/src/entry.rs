//! Journal entries and the HMAC chain that links them.
//!
//! Each entry's uid commits to its predecessor's uid and its own ciphertext:
//!
//!   uid_i = hex(HMAC(K, uid_{i-1} || ciphertext_i))
//!
//! where uid_{-1} (genesis) is the empty string. The uid therefore doubles as
//! content address and chain pointer; verifying an entry needs only the key
//! and the preceding uid.

use serde::{Deserialize, Serialize};
use tracing::error;
use zeroize::Zeroizing;

use crate::crypto::{constant_time_eq, to_hex, CryptoProvider, SymmetricKey};
use crate::error::{CryptoError, JournalError, Result};

/// One journal record as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(with = "content_base64")]
    content: Vec<u8>,
    uid: String,
}

impl JournalEntry {
    /// Rebuild an entry from stored parts. Nothing is checked until `verify`.
    pub fn from_parts(uid: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            content,
            uid: uid.into(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Compute the chain uid for `ciphertext` following `prev_uid`.
pub fn chain_uid(
    crypto: &dyn CryptoProvider,
    key: &SymmetricKey,
    prev_uid: Option<&str>,
    ciphertext: &[u8],
) -> Result<String, CryptoError> {
    let prev = prev_uid.unwrap_or_default().as_bytes();
    let mut input = Vec::with_capacity(prev.len() + ciphertext.len());
    input.extend_from_slice(prev);
    input.extend_from_slice(ciphertext);
    Ok(to_hex(&crypto.hmac(key, &input)?))
}

/// Encrypt `plaintext` and link it after `previous` (genesis when `None`).
pub fn link_and_encrypt(
    crypto: &dyn CryptoProvider,
    key: &SymmetricKey,
    plaintext: &[u8],
    previous: Option<&JournalEntry>,
) -> Result<JournalEntry, CryptoError> {
    link_after(crypto, key, plaintext, previous.map(JournalEntry::uid))
}

pub(crate) fn link_after(
    crypto: &dyn CryptoProvider,
    key: &SymmetricKey,
    plaintext: &[u8],
    prev_uid: Option<&str>,
) -> Result<JournalEntry, CryptoError> {
    let content = crypto.encrypt(key, plaintext)?;
    let uid = chain_uid(crypto, key, prev_uid, &content)?;
    Ok(JournalEntry { content, uid })
}

/// Check that `entry` is correctly linked after `previous`.
pub fn verify(
    crypto: &dyn CryptoProvider,
    entry: &JournalEntry,
    key: &SymmetricKey,
    previous: Option<&JournalEntry>,
) -> Result<()> {
    check_link(crypto, key, entry, previous.map(JournalEntry::uid), 0)
}

fn check_link(
    crypto: &dyn CryptoProvider,
    key: &SymmetricKey,
    entry: &JournalEntry,
    prev_uid: Option<&str>,
    index: usize,
) -> Result<()> {
    let expected = chain_uid(crypto, key, prev_uid, &entry.content)?;
    if !constant_time_eq(expected.as_bytes(), entry.uid.as_bytes()) {
        error!(index, uid = %entry.uid, "journal entry failed HMAC verification");
        return Err(JournalError::Integrity {
            index,
            expected,
            actual: entry.uid.clone(),
        });
    }
    Ok(())
}

/// Verify a batch in order, anchored at `since` (an already trusted uid) or
/// at genesis. Stops at the first broken link.
pub fn verify_chain(
    crypto: &dyn CryptoProvider,
    entries: &[JournalEntry],
    key: &SymmetricKey,
    since: Option<&str>,
) -> Result<()> {
    let mut prev = since;
    for (index, entry) in entries.iter().enumerate() {
        check_link(crypto, key, entry, prev, index)?;
        prev = Some(entry.uid());
    }
    Ok(())
}

/// Decrypt an entry's payload. Does not check the chain.
pub fn decrypt_payload(
    crypto: &dyn CryptoProvider,
    entry: &JournalEntry,
    key: &SymmetricKey,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    crypto.decrypt(key, &entry.content)
}

/// Links successive plaintexts onto a chain tip, collecting a push batch.
pub struct ChainBuilder<'a> {
    crypto: &'a dyn CryptoProvider,
    key: &'a SymmetricKey,
    tip: Option<String>,
    entries: Vec<JournalEntry>,
}

impl<'a> ChainBuilder<'a> {
    /// Start at `since`, or at genesis for an empty journal.
    pub fn new(
        crypto: &'a dyn CryptoProvider,
        key: &'a SymmetricKey,
        since: Option<&str>,
    ) -> Self {
        Self {
            crypto,
            key,
            tip: since.map(str::to_owned),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, plaintext: &[u8]) -> Result<&JournalEntry, CryptoError> {
        let entry = link_after(self.crypto, self.key, plaintext, self.tip.as_deref())?;
        self.tip = Some(entry.uid.clone());
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn tip(&self) -> Option<&str> {
        self.tip.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<JournalEntry> {
        self.entries
    }
}

mod content_base64 {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
