//! File-backed block cache for journal image files.
//!
//! A thin positioned-I/O backend: reads and writes go straight to the
//! image at `physical * block_size`, and `flush` maps to `fsync`. The
//! journal area is assumed contiguous at a fixed base, which is how
//! image files produced by dump tooling lay it out.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::Path;

use tracing::debug;

use fjournal_error::{JournalError, Result};

use crate::{Block, BlockCache};

/// Positioned-I/O block store over a journal image file.
#[derive(Debug)]
pub struct FileBlockCache {
    file: File,
    block_size: usize,
    journal_base: u64,
    journal_blocks: u32,
}

impl FileBlockCache {
    /// Open an image read-write.
    pub fn open(
        path: &Path,
        block_size: usize,
        journal_base: u64,
        journal_blocks: u32,
    ) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!(
            path = %path.display(),
            block_size,
            journal_base,
            journal_blocks,
            "opened journal image"
        );
        Ok(Self {
            file,
            block_size,
            journal_base,
            journal_blocks,
        })
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn byte_offset(&self, physical: u64) -> u64 {
        physical * self.block_size as u64
    }
}

impl BlockCache for FileBlockCache {
    fn bmap(&self, logical: u32) -> Result<u64> {
        if logical >= self.journal_blocks {
            return Err(JournalError::BadBlockMap { logical });
        }
        Ok(self.journal_base + u64::from(logical))
    }

    fn read(&mut self, physical: u64) -> Result<Block> {
        let mut data = vec![0u8; self.block_size];
        match self.file.read_exact_at(&mut data, self.byte_offset(physical)) {
            Ok(()) => Ok(Block::new(data)),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                Err(JournalError::ShortRead { physical })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, physical: u64, data: &[u8]) -> Result<()> {
        if data.len() != self.block_size {
            return Err(JournalError::internal(format!(
                "write of {} bytes to a {}-byte block image",
                data.len(),
                self.block_size
            )));
        }
        self.file.write_all_at(data, self.byte_offset(physical))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
