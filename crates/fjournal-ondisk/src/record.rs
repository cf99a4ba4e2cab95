//! The three log record kinds and their common header.

use fjournal_types::{BlockNr, TagFlags, TxId, JOURNAL_MAGIC, TAG_UUID_BYTES};

/// Size of the common record header.
pub const RECORD_HEADER_BYTES: usize = 12;

/// Descriptor tag size without the 64-bit feature: `blocknr, flags`.
pub const TAG_BYTES_32: usize = 8;
/// Descriptor tag size with the 64-bit feature: `blocknr, flags, blocknr_high`.
pub const TAG_BYTES_64: usize = 12;

/// Offset of the first revoked block number inside a revoke block
/// (common header plus the 4-byte count field).
const REVOKE_ENTRIES_OFFSET: usize = 16;

/// The block types the common header can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Descriptor,
    Commit,
    SuperblockV1,
    SuperblockV2,
    Revoke,
}

impl BlockType {
    /// Classify a raw on-disk block-type word.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Descriptor),
            2 => Some(Self::Commit),
            3 => Some(Self::SuperblockV1),
            4 => Some(Self::SuperblockV2),
            5 => Some(Self::Revoke),
            _ => None,
        }
    }

    #[must_use]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Descriptor => 1,
            Self::Commit => 2,
            Self::SuperblockV1 => 3,
            Self::SuperblockV2 => 4,
            Self::Revoke => 5,
        }
    }
}

/// The 12-byte header every journal block begins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Raw magic word; compare against [`JOURNAL_MAGIC`].
    pub magic: u32,
    /// Raw block-type word; classify with [`BlockType::from_raw`].
    pub block_type: u32,
    /// Transaction id this block belongs to.
    pub sequence: TxId,
}

impl RecordHeader {
    /// Read the header from the front of a block.
    ///
    /// Returns `None` only when the buffer is shorter than a header; a
    /// garbage header parses fine and is rejected by the caller's magic
    /// and sequence checks.
    #[must_use]
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < RECORD_HEADER_BYTES {
            return None;
        }
        let word = |at: usize| {
            u32::from_be_bytes(block[at..at + 4].try_into().expect("4-byte header field"))
        };
        Some(Self {
            magic: word(0),
            block_type: word(4),
            sequence: TxId::new(word(8)),
        })
    }

    /// Whether the magic word marks this block as journal-written.
    #[inline]
    #[must_use]
    pub const fn has_journal_magic(&self) -> bool {
        self.magic == JOURNAL_MAGIC
    }

    /// Encode into the front of a block buffer.
    ///
    /// # Panics
    /// Panics if `block` is shorter than [`RECORD_HEADER_BYTES`].
    pub fn encode_into(&self, block: &mut [u8]) {
        block[0..4].copy_from_slice(&self.magic.to_be_bytes());
        block[4..8].copy_from_slice(&self.block_type.to_be_bytes());
        block[8..12].copy_from_slice(&self.sequence.get().to_be_bytes());
    }
}

/// One tag of a descriptor block: a target block plus its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTag {
    pub block_nr: BlockNr,
    pub flags: TagFlags,
}

/// A descriptor block: the list of data blocks logged by one transaction,
/// in the order their payloads follow in the log.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorBlock<'a> {
    data: &'a [u8],
    wide_blocks: bool,
}

impl<'a> DescriptorBlock<'a> {
    /// Wrap a raw block whose header already classified as a descriptor.
    /// `wide_blocks` is the 64-bit block-number incompat feature.
    #[must_use]
    pub const fn new(data: &'a [u8], wide_blocks: bool) -> Self {
        Self { data, wide_blocks }
    }

    /// Byte width of one tag in this descriptor.
    #[must_use]
    pub const fn tag_bytes(&self) -> usize {
        if self.wide_blocks {
            TAG_BYTES_64
        } else {
            TAG_BYTES_32
        }
    }

    /// Iterate the tags in on-disk order.
    #[must_use]
    pub fn tags(&self) -> TagIter<'a> {
        TagIter {
            data: self.data,
            cursor: RECORD_HEADER_BYTES,
            tag_bytes: self.tag_bytes(),
            wide_blocks: self.wide_blocks,
            done: false,
        }
    }

    /// Number of data blocks this descriptor covers, one per tag.
    #[must_use]
    pub fn count_blocks(&self) -> u32 {
        self.tags().count() as u32
    }
}

/// Iterator over descriptor tags.
///
/// Terminates at the tag carrying `LAST_TAG`, or as soon as the remaining
/// space cannot hold another tag. The optional 16-byte UUID trailer is
/// skipped unless `SAME_UUID` is set.
pub struct TagIter<'a> {
    data: &'a [u8],
    cursor: usize,
    tag_bytes: usize,
    wide_blocks: bool,
    done: bool,
}

impl Iterator for TagIter<'_> {
    type Item = BlockTag;

    fn next(&mut self) -> Option<BlockTag> {
        if self.done || self.cursor + self.tag_bytes > self.data.len() {
            return None;
        }

        let word = |at: usize| {
            u32::from_be_bytes(
                self.data[at..at + 4]
                    .try_into()
                    .expect("4-byte tag field"),
            )
        };

        let low = word(self.cursor);
        let flags = TagFlags::from_bits_truncate(word(self.cursor + 4));
        let high = if self.wide_blocks {
            word(self.cursor + 8)
        } else {
            0
        };
        self.cursor += self.tag_bytes;

        if !flags.contains(TagFlags::SAME_UUID) {
            self.cursor += TAG_UUID_BYTES;
        }
        if flags.contains(TagFlags::LAST_TAG) {
            self.done = true;
        }

        Some(BlockTag {
            block_nr: BlockNr::from_split(low, high),
            flags,
        })
    }
}

/// A commit block's checksum fields.
///
/// Layout after the common header: `checksum_type: u8`, `checksum_size:
/// u8`, 2 bytes padding, then the checksum slots of which only the first
/// is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitBlock {
    pub checksum_type: u8,
    pub checksum_size: u8,
    pub checksum: u32,
}

impl CommitBlock {
    /// Read the checksum fields from a commit block.
    ///
    /// Returns `None` when the block is too short to hold them; writers
    /// always emit full blocks, so this only trips on malformed input.
    #[must_use]
    pub fn parse(block: &[u8]) -> Option<Self> {
        if block.len() < RECORD_HEADER_BYTES + 8 {
            return None;
        }
        Some(Self {
            checksum_type: block[12],
            checksum_size: block[13],
            checksum: u32::from_be_bytes(
                block[16..20].try_into().expect("4-byte checksum slot"),
            ),
        })
    }
}

/// A revoke block: a flat, byte-counted array of revoked block numbers.
#[derive(Debug, Clone, Copy)]
pub struct RevokeBlock<'a> {
    data: &'a [u8],
    count: usize,
    wide_blocks: bool,
}

impl<'a> RevokeBlock<'a> {
    /// Wrap a raw block whose header already classified as a revoke record.
    ///
    /// The on-disk `count` field is the number of bytes used in the block,
    /// including the header; entries beyond the block buffer are ignored.
    #[must_use]
    pub fn new(data: &'a [u8], wide_blocks: bool) -> Self {
        let mut count = 0usize;
        if data.len() >= REVOKE_ENTRIES_OFFSET {
            count = u32::from_be_bytes(
                data[12..16].try_into().expect("4-byte revoke count"),
            ) as usize;
            count = count.min(data.len());
        }
        Self {
            data,
            count,
            wide_blocks,
        }
    }

    /// Bytes used by this record, header included.
    #[must_use]
    pub const fn count_bytes(&self) -> usize {
        self.count
    }

    /// Iterate the revoked block numbers.
    #[must_use]
    pub fn block_numbers(&self) -> RevokeIter<'a> {
        RevokeIter {
            data: self.data,
            cursor: REVOKE_ENTRIES_OFFSET,
            limit: self.count,
            entry_bytes: if self.wide_blocks { 8 } else { 4 },
        }
    }
}

/// Iterator over the revoked block numbers of one revoke record.
pub struct RevokeIter<'a> {
    data: &'a [u8],
    cursor: usize,
    limit: usize,
    entry_bytes: usize,
}

impl Iterator for RevokeIter<'_> {
    type Item = BlockNr;

    fn next(&mut self) -> Option<BlockNr> {
        if self.cursor + self.entry_bytes > self.limit {
            return None;
        }
        let raw = if self.entry_bytes == 8 {
            u64::from_be_bytes(
                self.data[self.cursor..self.cursor + 8]
                    .try_into()
                    .expect("8-byte revoke entry"),
            )
        } else {
            u64::from(u32::from_be_bytes(
                self.data[self.cursor..self.cursor + 4]
                    .try_into()
                    .expect("4-byte revoke entry"),
            ))
        };
        self.cursor += self.entry_bytes;
        Some(BlockNr::new(raw))
    }
}
