//! The journal handle recovery operates on.
//!
//! A [`Journal`] owns its [`BlockCache`] collaborator and the parsed
//! superblock, and lends both (read-only) to the recovery passes. It is
//! not reentrant: one journal, one recovery at a time, on one thread.

use smallvec::SmallVec;
use tracing::{debug, warn};

use fjournal_block::{Block, BlockCache};
use fjournal_error::{JournalError, Result};
use fjournal_ondisk::{JournalSuperblock, SUPERBLOCK_BYTES};
use fjournal_types::{CompatFeatures, Geometry, IncompatFeatures, TxId};

/// Upper bound on bytes covered by one readahead window.
const MAX_READAHEAD_BYTES: usize = 128 * 1024;

/// Physical block numbers per readahead batch.
const READAHEAD_BATCH: usize = 8;

/// Logical offset of the superblock inside the journal.
const SUPERBLOCK_OFFSET: u32 = 0;

/// An open journal: parsed superblock plus its storage collaborator.
#[derive(Debug)]
pub struct Journal<C: BlockCache> {
    cache: C,
    superblock: JournalSuperblock,
    geometry: Geometry,
    compat: CompatFeatures,
    incompat: IncompatFeatures,
    /// Id the next live transaction will use once the log restarts.
    next_sequence: TxId,
    /// Transaction found corrupt (not merely torn) during scanning.
    failed_transaction: Option<TxId>,
    /// Exclusive high watermark of offsets already hinted for readahead.
    readahead_high: u32,
}

impl<C: BlockCache> Journal<C> {
    /// Read and validate the superblock, gate features, and build the
    /// journal handle.
    pub fn load(mut cache: C) -> Result<Self> {
        let physical = cache.bmap(SUPERBLOCK_OFFSET)?;
        let block = cache.read(physical)?;
        let superblock = JournalSuperblock::parse(block.as_slice())?;

        if superblock.block_size as usize != block.len() {
            return Err(JournalError::corrupt(format!(
                "superblock claims {}-byte blocks but the device serves {}",
                superblock.block_size,
                block.len()
            )));
        }
        if block.len() < SUPERBLOCK_BYTES {
            return Err(JournalError::corrupt(format!(
                "{}-byte blocks cannot hold a superblock",
                block.len()
            )));
        }
        let unknown = IncompatFeatures::unknown_bits(superblock.incompat);
        if unknown != 0 {
            return Err(JournalError::UnsupportedFeature { incompat: unknown });
        }

        let geometry = superblock.geometry();
        let compat = superblock.compat_features();
        let incompat = superblock.incompat_features();
        let next_sequence = superblock.sequence;
        debug!(
            block_size = superblock.block_size,
            first = geometry.first(),
            last = geometry.last(),
            sequence = %superblock.sequence,
            start = superblock.start,
            ?compat,
            ?incompat,
            "journal loaded"
        );

        Ok(Self {
            cache,
            superblock,
            geometry,
            compat,
            incompat,
            next_sequence,
            failed_transaction: None,
            readahead_high: 0,
        })
    }

    /// Read one logical log block, hinting readahead for the blocks
    /// behind it.
    pub fn read_log_block(&mut self, offset: u32) -> Result<Block> {
        if !self.geometry.contains(offset) {
            return Err(JournalError::OutOfRange {
                what: "logical log offset".to_owned(),
                value: format!(
                    "{offset} (log spans [{}, {}))",
                    self.geometry.first(),
                    self.geometry.last()
                ),
            });
        }
        let physical = self.cache.bmap(offset)?;
        let block = self.cache.read(physical)?;
        self.hint_readahead(offset);
        Ok(block)
    }

    /// Best-effort readahead for the window behind `offset`.
    ///
    /// Bounded to [`MAX_READAHEAD_BYTES`] of blocks, batched at most
    /// [`READAHEAD_BATCH`] physical numbers at a time, clipped at the
    /// end of the log. Translation failures stop the window early and
    /// are otherwise ignored.
    fn hint_readahead(&mut self, offset: u32) {
        if offset < self.readahead_high {
            return;
        }
        let window = (MAX_READAHEAD_BYTES / self.block_size()).max(1) as u32;
        let begin = offset + 1;
        let end = begin.saturating_add(window).min(self.geometry.last());

        let mut batch: SmallVec<[u64; READAHEAD_BATCH]> = SmallVec::new();
        for logical in begin..end {
            let Ok(physical) = self.cache.bmap(logical) else {
                break;
            };
            batch.push(physical);
            if batch.len() == READAHEAD_BATCH {
                self.cache.readahead(&batch);
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.cache.readahead(&batch);
        }
        self.readahead_high = end;
    }

    /// Write the superblock back through the cache.
    ///
    /// Only `start` and `sequence` ever change at recovery time; the
    /// rest round-trips from the load.
    pub fn commit_superblock(&mut self) -> Result<()> {
        let mut block = vec![0u8; self.block_size()];
        self.superblock.encode_into(&mut block)?;
        let physical = self.cache.bmap(SUPERBLOCK_OFFSET)?;
        self.cache.write(physical, &block)?;
        debug!(
            start = self.superblock.start,
            sequence = %self.superblock.sequence,
            "superblock written back"
        );
        Ok(())
    }

    /// Record a transaction whose commit failed verification against
    /// fully-present later records (real corruption, not a torn tail).
    pub(crate) fn mark_failed(&mut self, tid: TxId) {
        if self.failed_transaction.is_none() {
            warn!(transaction = %tid, "journal transaction is corrupt");
        }
        self.failed_transaction = Some(tid);
    }

    pub(crate) fn set_next_sequence(&mut self, tid: TxId) {
        self.next_sequence = tid;
    }

    /// Reset the in-memory log head to empty ahead of a write-back.
    pub(crate) fn reset_log_head(&mut self) {
        self.superblock.start = 0;
        self.superblock.sequence = self.next_sequence;
    }

    #[must_use]
    pub fn superblock(&self) -> &JournalSuperblock {
        &self.superblock
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.superblock.block_size as usize
    }

    #[must_use]
    pub fn compat(&self) -> CompatFeatures {
        self.compat
    }

    #[must_use]
    pub fn incompat(&self) -> IncompatFeatures {
        self.incompat
    }

    /// Id the next live transaction will use.
    #[must_use]
    pub fn next_sequence(&self) -> TxId {
        self.next_sequence
    }

    /// The corrupt transaction, if scanning found one.
    #[must_use]
    pub fn failed_transaction(&self) -> Option<TxId> {
        self.failed_transaction
    }

    #[must_use]
    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    /// Tear down the handle, returning the cache collaborator.
    #[must_use]
    pub fn into_cache(self) -> C {
        self.cache
    }
}
