#![forbid(unsafe_code)]
//! On-disk record formats for the FrankenJournal log.
//!
//! Every multi-byte field in the journal is big-endian. Three record kinds
//! share a 12-byte common header (magic, block type, transaction id):
//!
//! 1. descriptor blocks — a run of tags naming the data blocks that follow
//! 2. commit blocks — transaction boundary, optionally checksummed
//! 3. revoke blocks — a byte-counted array of revoked block numbers
//!
//! plus the journal superblock (V1 or V2) that anchors the whole log.
//!
//! Parsing here is structural only. Whether a block *belongs* to the log
//! (magic match, expected sequence) is the scanner's decision; this crate
//! never turns a stale or torn block into an error.

pub mod record;
pub mod superblock;

pub use record::{
    BlockTag, BlockType, CommitBlock, DescriptorBlock, RecordHeader, RevokeBlock,
    RECORD_HEADER_BYTES, TAG_BYTES_32, TAG_BYTES_64,
};
pub use superblock::{JournalSuperblock, SuperblockVersion, SUPERBLOCK_BYTES};

pub(crate) mod bytes {
    //! Cursor-based big-endian field readers and writers.

    use fjournal_error::{JournalError, Result};

    pub fn read_u32_be(bytes: &[u8], cursor: &mut usize, what: &str) -> Result<u32> {
        let end = cursor
            .checked_add(4)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| JournalError::corrupt(format!("{what} extends past the block")))?;
        let value = u32::from_be_bytes(
            bytes[*cursor..end]
                .try_into()
                .expect("4-byte slice for u32"),
        );
        *cursor = end;
        Ok(value)
    }

    pub fn read_array<const N: usize>(
        bytes: &[u8],
        cursor: &mut usize,
        what: &str,
    ) -> Result<[u8; N]> {
        let end = cursor
            .checked_add(N)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| JournalError::corrupt(format!("{what} extends past the block")))?;
        let array = bytes[*cursor..end]
            .try_into()
            .expect("fixed-width array slice");
        *cursor = end;
        Ok(array)
    }

    pub fn write_u32_be(bytes: &mut [u8], cursor: &mut usize, value: u32) {
        bytes[*cursor..*cursor + 4].copy_from_slice(&value.to_be_bytes());
        *cursor += 4;
    }
}
