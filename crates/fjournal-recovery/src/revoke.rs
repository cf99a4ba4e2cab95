//! The in-memory revoke table.
//!
//! Built during the REVOKE pass, consulted read-only during REPLAY, and
//! cleared when recovery finishes on any path. A block is revoked for a
//! writing transaction when some transaction at or after it declared the
//! block stale; replaying the write would clobber newer data.

use hashbrown::HashMap;

use fjournal_types::{BlockNr, TxId};

/// Map from block number to the highest transaction id revoking it.
#[derive(Debug, Default)]
pub struct RevokeTable {
    entries: HashMap<BlockNr, TxId>,
}

impl RevokeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a revocation of `block` by transaction `tid`.
    ///
    /// An existing entry keeps the higher transaction id, under the
    /// wrapping tid order.
    pub fn set(&mut self, block: BlockNr, tid: TxId) {
        self.entries
            .entry(block)
            .and_modify(|stored| {
                if tid.after(*stored) {
                    *stored = tid;
                }
            })
            .or_insert(tid);
    }

    /// Whether a write to `block` by transaction `tid` must be skipped.
    #[must_use]
    pub fn is_revoked(&self, block: BlockNr, tid: TxId) -> bool {
        self.entries
            .get(&block)
            .is_some_and(|stored| stored.at_or_after(tid))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of distinct revoked blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
