#![forbid(unsafe_code)]
//! Block cache collaborator interface for the recovery engine.
//!
//! Recovery never talks to storage directly: it goes through
//! [`BlockCache`], which folds together the logical-to-physical journal
//! block map, buffered reads and writes, and a best-effort readahead
//! hint. Two backends ship here: [`MemBlockCache`] for tests and tools,
//! and [`FileBlockCache`] for journal image files.
//!
//! Buffers are owned values: a [`Block`] is released by dropping it, so
//! there is no get/release pairing to mismatch.

pub mod mem;

#[cfg(unix)]
pub mod file;

pub use mem::MemBlockCache;

#[cfg(unix)]
pub use file::FileBlockCache;

use fjournal_error::Result;

/// An owned block buffer returned by [`BlockCache::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
}

impl Block {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// The storage collaborator contract the recovery engine consumes.
///
/// Implementations are free to cache aggressively; recovery is
/// single-threaded and never holds more than a handful of blocks alive.
pub trait BlockCache {
    /// Translate a logical journal block offset to a physical block
    /// number on the backing device.
    fn bmap(&self, logical: u32) -> Result<u64>;

    /// Read one physical block in full.
    fn read(&mut self, physical: u64) -> Result<Block>;

    /// Write one physical block and mark it dirty.
    fn write(&mut self, physical: u64, data: &[u8]) -> Result<()>;

    /// Hint that the caller will soon read these physical blocks.
    ///
    /// Best effort: implementations may prefetch, coalesce, or ignore
    /// the batch entirely, and must never report failure through it.
    fn readahead(&mut self, batch: &[u64]) {
        let _ = batch;
    }

    /// Flush every dirty block to stable storage.
    fn flush(&mut self) -> Result<()>;
}
