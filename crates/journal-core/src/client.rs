//! Fetch and push for one journal resource.

use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{CryptoProvider, SymmetricKey};
use crate::cursor::SyncCursor;
use crate::entry::{self, ChainBuilder, JournalEntry};
use crate::error::{CryptoError, JournalError, Result};
use crate::transport::{HttpRequest, Transport};

const LAST_PARAM: &str = "last";

/// Derive `{base}/api/v1/journal/{journal}/` from the server base URL.
///
/// The journal uid is always a single path segment: a `/` inside it is
/// percent-encoded rather than splitting the path.
pub fn journal_resource(base: &Url, journal: &str) -> Result<Url> {
    if journal.is_empty() {
        return Err(JournalError::InvalidUrl("empty journal uid".into()));
    }
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| JournalError::InvalidUrl(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(["api", "v1", "journal", journal, ""]);
    Ok(url)
}

/// Stateless apart from its configuration; reuse freely, but serialize calls
/// that share a cursor.
#[derive(Clone)]
pub struct JournalClient {
    transport: Transport,
    crypto: Arc<dyn CryptoProvider>,
    remote: Url,
    uid: String,
}

impl JournalClient {
    pub fn new(
        transport: Transport,
        crypto: Arc<dyn CryptoProvider>,
        base: &Url,
        journal: &str,
    ) -> Result<Self> {
        let remote = journal_resource(base, journal)?;
        info!(remote = %remote, "created journal client");
        Ok(Self {
            transport,
            crypto,
            remote,
            uid: journal.to_owned(),
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn remote(&self) -> &Url {
        &self.remote
    }

    pub fn crypto(&self) -> &dyn CryptoProvider {
        self.crypto.as_ref()
    }

    fn url_with_last(&self, last: Option<&str>) -> Url {
        let mut url = self.remote.clone();
        if let Some(last) = last {
            url.query_pairs_mut().append_pair(LAST_PARAM, last);
        }
        url
    }

    /// Fetch entries after `since` and verify the whole batch.
    ///
    /// `since` is trusted as already verified and anchors the first link. Any
    /// broken link fails the call; no entries are returned in that case.
    pub fn fetch_entries(
        &self,
        key: &SymmetricKey,
        since: Option<&str>,
    ) -> Result<Vec<JournalEntry>> {
        let response = self
            .transport
            .execute(HttpRequest::get(self.url_with_last(since)))?;
        let entries: Vec<JournalEntry> = serde_json::from_slice(&response.body)?;
        debug!(journal = %self.uid, count = entries.len(), "fetched entries");

        entry::verify_chain(self.crypto.as_ref(), &entries, key, since)?;
        Ok(entries)
    }

    /// Upload entries already linked after `since`.
    ///
    /// The server uses `last` to reject pushes from a stale tip; that
    /// rejection surfaces as `JournalError::Http` (see `is_conflict`).
    pub fn push_entries(&self, entries: &[JournalEntry], since: Option<&str>) -> Result<()> {
        let body = serde_json::to_vec(entries)?;
        self.transport
            .execute(HttpRequest::post_json(self.url_with_last(since), body))?;
        debug!(journal = %self.uid, count = entries.len(), "pushed entries");
        Ok(())
    }

    /// Fetch since `cursor` and advance it to the end of the verified batch.
    pub fn sync(&self, key: &SymmetricKey, cursor: &mut SyncCursor) -> Result<Vec<JournalEntry>> {
        let entries = self.fetch_entries(key, cursor.last())?;
        cursor.advance(&entries);
        Ok(entries)
    }

    /// Encrypt and link `plaintexts` after `cursor`, push them, and advance
    /// the cursor once the server accepted the batch.
    pub fn append<I>(
        &self,
        key: &SymmetricKey,
        plaintexts: I,
        cursor: &mut SyncCursor,
    ) -> Result<Vec<JournalEntry>>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut builder = ChainBuilder::new(self.crypto.as_ref(), key, cursor.last());
        for plaintext in plaintexts {
            builder.push(plaintext.as_ref())?;
        }
        if builder.is_empty() {
            return Ok(Vec::new());
        }
        let entries = builder.finish();
        self.push_entries(&entries, cursor.last())?;
        cursor.advance(&entries);
        Ok(entries)
    }

    pub fn new_entry(
        &self,
        key: &SymmetricKey,
        plaintext: &[u8],
        previous: Option<&JournalEntry>,
    ) -> Result<JournalEntry, CryptoError> {
        entry::link_and_encrypt(self.crypto.as_ref(), key, plaintext, previous)
    }

    pub fn decrypt(
        &self,
        entry: &JournalEntry,
        key: &SymmetricKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        entry::decrypt_payload(self.crypto.as_ref(), entry, key)
    }
}
