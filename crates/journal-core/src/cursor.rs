//! Sync checkpoint held by the caller between fetches and pushes.

use serde::{Deserialize, Serialize};

use crate::entry::JournalEntry;

/// Caller-held checkpoint: the uid of the last entry already verified.
///
/// Moves forward only; `JournalClient` advances it after a batch verified
/// (fetch) or was accepted (append), never on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    last: Option<String>,
}

impl SyncCursor {
    pub fn genesis() -> Self {
        Self::default()
    }

    pub fn at(uid: impl Into<String>) -> Self {
        Self {
            last: Some(uid.into()),
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn is_genesis(&self) -> bool {
        self.last.is_none()
    }

    /// Move to the last uid of `batch`. An empty batch is a no-op.
    pub fn advance(&mut self, batch: &[JournalEntry]) {
        if let Some(tail) = batch.last() {
            self.last = Some(tail.uid().to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_tail_and_ignores_empty() {
        let mut cursor = SyncCursor::genesis();
        assert!(cursor.is_genesis());
        cursor.advance(&[]);
        assert!(cursor.is_genesis());

        let batch = vec![
            JournalEntry::from_parts("aa", vec![1]),
            JournalEntry::from_parts("bb", vec![2]),
        ];
        cursor.advance(&batch);
        assert_eq!(cursor.last(), Some("bb"));
        cursor.advance(&[]);
        assert_eq!(cursor, SyncCursor::at("bb"));
    }
}
