#![forbid(unsafe_code)]
//! FrankenJournal: crash recovery for a journaled block-storage
//! filesystem, in pure Rust.
//!
//! Given a possibly-torn, possibly-corrupted circular write-ahead log,
//! the engine reconstructs which transactions committed and replays
//! their block writes onto the backing store:
//!
//! ```no_run
//! use fjournal::{FileBlockCache, Journal};
//! # fn main() -> fjournal::Result<()> {
//! let cache = FileBlockCache::open(
//!     std::path::Path::new("fs.img"),
//!     4096, // block size
//!     1024, // physical base of the journal area
//!     8192, // journal length in blocks
//! )?;
//! let mut journal = Journal::load(cache)?;
//! let info = journal.recover()?;
//! println!(
//!     "replayed {} blocks from transactions {}..{}",
//!     info.nr_replays(),
//!     info.start_transaction(),
//!     info.end_transaction(),
//! );
//! # Ok(())
//! # }
//! ```
//!
//! This crate is a facade: the pieces live in `fjournal-types`,
//! `fjournal-error`, `fjournal-ondisk`, `fjournal-block`, and
//! `fjournal-recovery`.

pub use fjournal_block::{Block, BlockCache, MemBlockCache};
pub use fjournal_error::{JournalError, Result};
pub use fjournal_ondisk::{
    BlockTag, BlockType, CommitBlock, DescriptorBlock, JournalSuperblock, RecordHeader,
    RevokeBlock, SuperblockVersion,
};
pub use fjournal_recovery::{checksum, Journal, RecoveryInfo, RecoveryPass, RevokeTable};
pub use fjournal_types::{
    BlockNr, CompatFeatures, Geometry, IncompatFeatures, RoCompatFeatures, TagFlags, TxId,
    JOURNAL_MAGIC,
};

#[cfg(unix)]
pub use fjournal_block::FileBlockCache;
