//! The journal superblock, V1 and V2.
//!
//! The superblock is the first block of the log area. It shares the
//! common record header (block type 3 for V1, 4 for V2), then carries the
//! static geometry of the log and its dynamic head: `start` (the logical
//! offset of the oldest live record, zero iff the log was cleanly shut
//! down) and `sequence` (the id of the first transaction expected in the
//! log). Recovery rewrites only `start` and `sequence`.

use fjournal_error::{JournalError, Result};
use fjournal_types::{
    CompatFeatures, Geometry, IncompatFeatures, RoCompatFeatures, TxId, JOURNAL_MAGIC,
};

use crate::bytes::{read_array, read_u32_be, write_u32_be};
use crate::record::{BlockType, RecordHeader, RECORD_HEADER_BYTES};

/// On-disk size of the superblock structure.
pub const SUPERBLOCK_BYTES: usize = 1024;

/// Maximum number of owning-filesystem UUIDs the users array can hold.
pub const MAX_USERS: usize = 48;

/// Byte length of one owning-filesystem UUID.
const USER_ID_BYTES: usize = 16;

/// Offset of the users array.
const USERS_OFFSET: usize = 0x100;

/// Header format version, taken from the superblock's block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperblockVersion {
    /// Original format: fields beyond `errno` are not meaningful.
    V1,
    /// Adds feature bitsets, UUIDs and the users list.
    V2,
}

/// Parsed journal superblock.
///
/// Feature words are kept raw so unknown bits survive a parse/encode
/// round trip; typed views are available through the accessor methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSuperblock {
    pub version: SuperblockVersion,
    /// Journal block size in bytes.
    pub block_size: u32,
    /// Total number of blocks in the log area.
    pub maxlen: u32,
    /// First logical block of log records (the superblock precedes it).
    pub first: u32,
    /// First transaction id expected in the log.
    pub sequence: TxId,
    /// Logical offset of the log head; zero marks a clean shutdown.
    pub start: u32,
    /// Sticky on-disk error indicator.
    pub errno: i32,
    /// Raw backwards-compatible feature word.
    pub compat: u32,
    /// Raw incompatible feature word.
    pub incompat: u32,
    /// Raw read-only-compatible feature word.
    pub ro_compat: u32,
    /// UUID of the journal itself.
    pub uuid: [u8; 16],
    /// Dynamic-superblock copy location.
    pub dynsuper: u32,
    /// Limit on the number of blocks per transaction.
    pub max_transaction: u32,
    /// Limit on the number of data blocks per transaction.
    pub max_trans_data: u32,
    /// Superblock checksum algorithm id (carried, not verified here).
    pub checksum_type: u8,
    /// Stored superblock checksum (carried, not verified here).
    pub checksum: u32,
    /// UUIDs of the filesystems sharing this log.
    pub users: Vec<[u8; 16]>,
}

impl JournalSuperblock {
    /// Parse and sanity-check a superblock from its raw block.
    pub fn parse(block: &[u8]) -> Result<Self> {
        if block.len() < SUPERBLOCK_BYTES {
            return Err(JournalError::corrupt(format!(
                "superblock needs {SUPERBLOCK_BYTES} bytes, block has {}",
                block.len()
            )));
        }

        let header = RecordHeader::parse(block)
            .ok_or_else(|| JournalError::corrupt("superblock header truncated"))?;
        if !header.has_journal_magic() {
            return Err(JournalError::corrupt(format!(
                "bad superblock magic {:#010x}",
                header.magic
            )));
        }
        let version = match BlockType::from_raw(header.block_type) {
            Some(BlockType::SuperblockV1) => SuperblockVersion::V1,
            Some(BlockType::SuperblockV2) => SuperblockVersion::V2,
            _ => {
                return Err(JournalError::corrupt(format!(
                    "block type {} is not a superblock",
                    header.block_type
                )));
            }
        };

        let mut cursor = RECORD_HEADER_BYTES;
        let block_size = read_u32_be(block, &mut cursor, "superblock block size")?;
        let maxlen = read_u32_be(block, &mut cursor, "superblock max length")?;
        let first = read_u32_be(block, &mut cursor, "superblock first block")?;
        let sequence = TxId::new(read_u32_be(block, &mut cursor, "superblock sequence")?);
        let start = read_u32_be(block, &mut cursor, "superblock start offset")?;
        let errno = read_u32_be(block, &mut cursor, "superblock errno")? as i32;
        let compat = read_u32_be(block, &mut cursor, "compat features")?;
        let incompat = read_u32_be(block, &mut cursor, "incompat features")?;
        let ro_compat = read_u32_be(block, &mut cursor, "ro-compat features")?;
        let uuid = read_array::<16>(block, &mut cursor, "journal uuid")?;
        let nr_users = read_u32_be(block, &mut cursor, "user count")?;
        let dynsuper = read_u32_be(block, &mut cursor, "dynamic superblock")?;
        let max_transaction = read_u32_be(block, &mut cursor, "max transaction")?;
        let max_trans_data = read_u32_be(block, &mut cursor, "max transaction data")?;
        let checksum_type = block[cursor];
        let checksum = u32::from_be_bytes(
            block[0xFC..0x100]
                .try_into()
                .expect("4-byte superblock checksum"),
        );

        if block_size == 0 {
            return Err(JournalError::corrupt("superblock block size is zero"));
        }
        if first == 0 || first >= maxlen {
            return Err(JournalError::OutOfRange {
                what: "superblock first block".to_owned(),
                value: format!("{first} (maxlen {maxlen})"),
            });
        }

        let mut users = Vec::new();
        if version == SuperblockVersion::V2 {
            let keep = (nr_users as usize).min(MAX_USERS);
            for index in 0..keep {
                let at = USERS_OFFSET + index * USER_ID_BYTES;
                users.push(
                    block[at..at + USER_ID_BYTES]
                        .try_into()
                        .expect("16-byte user id"),
                );
            }
        }

        Ok(Self {
            version,
            block_size,
            maxlen,
            first,
            sequence,
            start,
            errno,
            compat: if version == SuperblockVersion::V1 { 0 } else { compat },
            incompat: if version == SuperblockVersion::V1 { 0 } else { incompat },
            ro_compat: if version == SuperblockVersion::V1 { 0 } else { ro_compat },
            uuid,
            dynsuper,
            max_transaction,
            max_trans_data,
            checksum_type,
            checksum,
            users,
        })
    }

    /// Encode into a raw block buffer of at least [`SUPERBLOCK_BYTES`].
    pub fn encode_into(&self, block: &mut [u8]) -> Result<()> {
        if block.len() < SUPERBLOCK_BYTES {
            return Err(JournalError::internal(
                "superblock target buffer is too small",
            ));
        }
        if self.users.len() > MAX_USERS {
            return Err(JournalError::OutOfRange {
                what: "superblock user count".to_owned(),
                value: self.users.len().to_string(),
            });
        }

        block[..SUPERBLOCK_BYTES].fill(0);
        let block_type = match self.version {
            SuperblockVersion::V1 => BlockType::SuperblockV1,
            SuperblockVersion::V2 => BlockType::SuperblockV2,
        };
        RecordHeader {
            magic: JOURNAL_MAGIC,
            block_type: block_type.to_raw(),
            sequence: TxId::new(0),
        }
        .encode_into(block);

        let mut cursor = RECORD_HEADER_BYTES;
        write_u32_be(block, &mut cursor, self.block_size);
        write_u32_be(block, &mut cursor, self.maxlen);
        write_u32_be(block, &mut cursor, self.first);
        write_u32_be(block, &mut cursor, self.sequence.get());
        write_u32_be(block, &mut cursor, self.start);
        write_u32_be(block, &mut cursor, self.errno as u32);
        write_u32_be(block, &mut cursor, self.compat);
        write_u32_be(block, &mut cursor, self.incompat);
        write_u32_be(block, &mut cursor, self.ro_compat);
        block[cursor..cursor + 16].copy_from_slice(&self.uuid);
        cursor += 16;
        write_u32_be(block, &mut cursor, self.users.len() as u32);
        write_u32_be(block, &mut cursor, self.dynsuper);
        write_u32_be(block, &mut cursor, self.max_transaction);
        write_u32_be(block, &mut cursor, self.max_trans_data);
        block[cursor] = self.checksum_type;
        block[0xFC..0x100].copy_from_slice(&self.checksum.to_be_bytes());

        for (index, user) in self.users.iter().enumerate() {
            let at = USERS_OFFSET + index * USER_ID_BYTES;
            block[at..at + USER_ID_BYTES].copy_from_slice(user);
        }
        Ok(())
    }

    /// Typed view of the backwards-compatible feature word.
    #[must_use]
    pub fn compat_features(&self) -> CompatFeatures {
        CompatFeatures::from_bits_truncate(self.compat)
    }

    /// Typed view of the incompatible feature word.
    #[must_use]
    pub fn incompat_features(&self) -> IncompatFeatures {
        IncompatFeatures::from_bits_truncate(self.incompat)
    }

    /// Typed view of the read-only-compatible feature word.
    #[must_use]
    pub fn ro_compat_features(&self) -> RoCompatFeatures {
        RoCompatFeatures::from_bits_truncate(self.ro_compat)
    }

    /// The circular address space described by this superblock.
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.first, self.maxlen)
    }

    /// Whether the log was cleanly shut down (no recovery needed).
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.start == 0
    }
}
