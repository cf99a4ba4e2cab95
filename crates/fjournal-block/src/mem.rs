//! In-memory block cache backend.
//!
//! Backs tests and offline tooling. Unwritten blocks read as zeroes,
//! which is exactly how a never-written log tail presents to the
//! scanner. Fault injection (`poison_read`) lets recovery tests exercise
//! the fatal I/O paths without a real device.

use hashbrown::{HashMap, HashSet};

use fjournal_error::{JournalError, Result};

use crate::{Block, BlockCache};

/// A `HashMap`-backed block store with an identity-plus-base journal map.
#[derive(Debug)]
pub struct MemBlockCache {
    block_size: usize,
    /// Physical block number where the journal area starts.
    journal_base: u64,
    /// Number of mappable journal blocks; `bmap` fails past this.
    journal_blocks: u32,
    blocks: HashMap<u64, Vec<u8>>,
    dirty: HashSet<u64>,
    poisoned: HashSet<u64>,
    /// Blocks that bit-rot: remaining reads that still return data.
    decaying: HashMap<u64, u32>,
    /// Every readahead batch received, newest last.
    readahead_batches: Vec<Vec<u64>>,
    flushes: u32,
}

impl MemBlockCache {
    /// Create a cache whose journal area spans
    /// `[journal_base, journal_base + journal_blocks)`.
    #[must_use]
    pub fn new(block_size: usize, journal_base: u64, journal_blocks: u32) -> Self {
        Self {
            block_size,
            journal_base,
            journal_blocks,
            blocks: HashMap::new(),
            dirty: HashSet::new(),
            poisoned: HashSet::new(),
            decaying: HashMap::new(),
            readahead_batches: Vec::new(),
            flushes: 0,
        }
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Install a block's contents without marking it dirty.
    ///
    /// # Panics
    /// Panics if `data` is not exactly one block long.
    pub fn install(&mut self, physical: u64, data: &[u8]) {
        assert_eq!(data.len(), self.block_size, "install expects a full block");
        self.blocks.insert(physical, data.to_vec());
    }

    /// Contents of a block as the cache currently holds it.
    #[must_use]
    pub fn contents(&self, physical: u64) -> Option<&[u8]> {
        self.blocks.get(&physical).map(Vec::as_slice)
    }

    /// Force subsequent reads of `physical` to fail.
    pub fn poison_read(&mut self, physical: u64) {
        self.poisoned.insert(physical);
    }

    /// Simulate bit rot: after `good_reads` more successful reads,
    /// `physical` reads back as zeroes.
    pub fn decay_read(&mut self, physical: u64, good_reads: u32) {
        self.decaying.insert(physical, good_reads);
    }

    /// Whether `physical` has been written and not yet flushed.
    #[must_use]
    pub fn is_dirty(&self, physical: u64) -> bool {
        self.dirty.contains(&physical)
    }

    /// Number of completed flushes.
    #[must_use]
    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    /// Readahead batches observed so far, oldest first.
    #[must_use]
    pub fn readahead_batches(&self) -> &[Vec<u64>] {
        &self.readahead_batches
    }
}

impl BlockCache for MemBlockCache {
    fn bmap(&self, logical: u32) -> Result<u64> {
        if logical >= self.journal_blocks {
            return Err(JournalError::BadBlockMap { logical });
        }
        Ok(self.journal_base + u64::from(logical))
    }

    fn read(&mut self, physical: u64) -> Result<Block> {
        if self.poisoned.contains(&physical) {
            return Err(JournalError::ShortRead { physical });
        }
        if let Some(remaining) = self.decaying.get_mut(&physical) {
            if *remaining == 0 {
                return Ok(Block::new(vec![0u8; self.block_size]));
            }
            *remaining -= 1;
        }
        let data = self
            .blocks
            .get(&physical)
            .cloned()
            .unwrap_or_else(|| vec![0u8; self.block_size]);
        Ok(Block::new(data))
    }

    fn write(&mut self, physical: u64, data: &[u8]) -> Result<()> {
        if data.len() != self.block_size {
            return Err(JournalError::internal(format!(
                "write of {} bytes to a {}-byte block store",
                data.len(),
                self.block_size
            )));
        }
        self.blocks.insert(physical, data.to_vec());
        self.dirty.insert(physical);
        Ok(())
    }

    fn readahead(&mut self, batch: &[u64]) {
        self.readahead_batches.push(batch.to_vec());
    }

    fn flush(&mut self) -> Result<()> {
        self.dirty.clear();
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_blocks_read_as_zeroes() {
        let mut cache = MemBlockCache::new(64, 100, 10);
        let block = cache.read(105).expect("read");
        assert_eq!(block.as_slice(), &[0u8; 64]);
    }

    #[test]
    fn bmap_is_base_plus_logical_and_bounded() {
        let cache = MemBlockCache::new(64, 100, 10);
        assert_eq!(cache.bmap(0).expect("in range"), 100);
        assert_eq!(cache.bmap(9).expect("in range"), 109);
        assert!(matches!(
            cache.bmap(10),
            Err(JournalError::BadBlockMap { logical: 10 })
        ));
    }

    #[test]
    fn writes_dirty_then_flush_cleans() {
        let mut cache = MemBlockCache::new(4, 0, 4);
        cache.write(2, &[1, 2, 3, 4]).expect("write");
        assert!(cache.is_dirty(2));
        cache.flush().expect("flush");
        assert!(!cache.is_dirty(2));
        assert_eq!(cache.flushes(), 1);
        assert_eq!(cache.contents(2), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn decayed_blocks_go_zero_after_their_good_reads() {
        let mut cache = MemBlockCache::new(4, 0, 4);
        cache.install(1, &[9, 9, 9, 9]);
        cache.decay_read(1, 1);
        assert_eq!(cache.read(1).expect("first read").as_slice(), &[9, 9, 9, 9]);
        assert_eq!(cache.read(1).expect("second read").as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn poisoned_reads_fail() {
        let mut cache = MemBlockCache::new(4, 0, 4);
        cache.poison_read(3);
        assert!(matches!(
            cache.read(3),
            Err(JournalError::ShortRead { physical: 3 })
        ));
    }
}
