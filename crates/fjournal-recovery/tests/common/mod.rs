//! Synthetic journal images for recovery tests.
//!
//! Builds the same byte layout the forward-logging path would produce:
//! descriptor blocks with tags, escaped data blocks, commit records
//! (optionally checksummed), and revoke records, laid out circularly
//! from a chosen head offset inside a [`MemBlockCache`].
#![allow(dead_code)]

use fjournal_block::{BlockCache, MemBlockCache};
use fjournal_ondisk::{BlockType, JournalSuperblock, RecordHeader, SuperblockVersion};
use fjournal_recovery::checksum;
use fjournal_types::{
    CompatFeatures, IncompatFeatures, TagFlags, TxId, CHECKSUM_SIZE_CRC32, CHECKSUM_TYPE_CRC32,
    JOURNAL_MAGIC,
};

/// Block size used by every fixture; the superblock needs 1024 bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Physical block where fixture journals start; keeps the journal area
/// clear of the low-numbered target blocks tests write to.
pub const JOURNAL_BASE: u64 = 1000;

/// A full-block deterministic payload.
pub fn payload(seed: u8) -> Vec<u8> {
    (0..BLOCK_SIZE)
        .map(|index| seed ^ u8::try_from(index % 251).expect("modulo fits u8"))
        .collect()
}

/// A payload whose first four bytes collide with the journal magic,
/// forcing the writer to escape it.
pub fn magic_payload(seed: u8) -> Vec<u8> {
    let mut data = payload(seed);
    data[..4].copy_from_slice(&JOURNAL_MAGIC.to_be_bytes());
    data
}

/// Builder for journal images.
pub struct JournalBuilder {
    first: u32,
    maxlen: u32,
    sequence: u32,
    start: u32,
    compat: CompatFeatures,
    incompat: IncompatFeatures,
    extra_incompat: u32,
    v1: bool,
    tag_uuids: bool,
    cursor: u32,
    crc: u32,
    cache: MemBlockCache,
}

impl JournalBuilder {
    /// A journal spanning logical blocks `[first, maxlen)` whose head
    /// sits at `start` and whose first expected transaction is
    /// `sequence`. `start == 0` builds a cleanly-shut-down log.
    pub fn new(first: u32, maxlen: u32, sequence: u32, start: u32) -> Self {
        Self {
            first,
            maxlen,
            sequence,
            start,
            compat: CompatFeatures::empty(),
            incompat: IncompatFeatures::empty(),
            extra_incompat: 0,
            v1: false,
            tag_uuids: false,
            cursor: start,
            crc: checksum::SEED,
            cache: MemBlockCache::new(BLOCK_SIZE, JOURNAL_BASE, maxlen),
        }
    }

    pub fn checksums(mut self) -> Self {
        self.compat |= CompatFeatures::CHECKSUM;
        self
    }

    pub fn async_commit(mut self) -> Self {
        self.incompat |= IncompatFeatures::ASYNC_COMMIT;
        self
    }

    pub fn wide_blocks(mut self) -> Self {
        self.incompat |= IncompatFeatures::BIT64;
        self
    }

    /// Set raw incompat bits beyond the defined ones.
    pub fn raw_incompat(mut self, bits: u32) -> Self {
        self.extra_incompat = bits;
        self
    }

    /// Emit a V1 superblock (no feature words on disk).
    pub fn v1(mut self) -> Self {
        self.v1 = true;
        self
    }

    /// Give the first tag of each descriptor an explicit UUID trailer.
    pub fn tag_uuids(mut self) -> Self {
        self.tag_uuids = true;
        self
    }

    /// Current logical write position.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    fn wide(&self) -> bool {
        self.incompat.contains(IncompatFeatures::BIT64)
    }

    fn place(&mut self, block: &[u8]) {
        assert!(self.cursor >= self.first && self.cursor < self.maxlen);
        self.cache.install(JOURNAL_BASE + u64::from(self.cursor), block);
        self.cursor += 1;
        if self.cursor >= self.maxlen {
            self.cursor -= self.maxlen - self.first;
        }
    }

    fn header_into(block: &mut [u8], block_type: BlockType, tid: u32) {
        RecordHeader {
            magic: JOURNAL_MAGIC,
            block_type: block_type.to_raw(),
            sequence: TxId::new(tid),
        }
        .encode_into(block);
    }

    /// Write a descriptor block and the journal copies of its data
    /// blocks. Payloads colliding with the magic are escaped.
    pub fn write_descriptor(&mut self, tid: u32, writes: &[(u64, Vec<u8>)]) {
        assert!(!writes.is_empty());
        let mut descriptor = vec![0u8; BLOCK_SIZE];
        Self::header_into(&mut descriptor, BlockType::Descriptor, tid);

        let mut journal_copies: Vec<Vec<u8>> = Vec::with_capacity(writes.len());
        let mut offset = 12;
        for (index, (block_nr, data)) in writes.iter().enumerate() {
            assert_eq!(data.len(), BLOCK_SIZE);
            let escaped = data[..4] == JOURNAL_MAGIC.to_be_bytes();
            let carries_uuid = self.tag_uuids && index == 0;

            let mut flags = TagFlags::empty();
            if escaped {
                flags |= TagFlags::ESCAPED;
            }
            if !carries_uuid {
                flags |= TagFlags::SAME_UUID;
            }
            if index == writes.len() - 1 {
                flags |= TagFlags::LAST_TAG;
            }

            let low = (*block_nr & 0xFFFF_FFFF) as u32;
            descriptor[offset..offset + 4].copy_from_slice(&low.to_be_bytes());
            descriptor[offset + 4..offset + 8].copy_from_slice(&flags.bits().to_be_bytes());
            offset += 8;
            if self.wide() {
                let high = (*block_nr >> 32) as u32;
                descriptor[offset..offset + 4].copy_from_slice(&high.to_be_bytes());
                offset += 4;
            }
            if carries_uuid {
                descriptor[offset..offset + 16].copy_from_slice(&[0x77; 16]);
                offset += 16;
            }

            let mut copy = data.clone();
            if escaped {
                copy[..4].fill(0);
            }
            journal_copies.push(copy);
        }

        self.place(&descriptor);
        if self.compat.contains(CompatFeatures::CHECKSUM) {
            self.crc = checksum::fold(self.crc, &descriptor);
        }
        for copy in journal_copies {
            self.place(&copy);
            if self.compat.contains(CompatFeatures::CHECKSUM) {
                self.crc = checksum::fold(self.crc, &copy);
            }
        }
    }

    fn commit_block(&mut self, tid: u32, stored_crc: Option<u32>) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        Self::header_into(&mut block, BlockType::Commit, tid);
        if let Some(crc) = stored_crc {
            block[12] = CHECKSUM_TYPE_CRC32;
            block[13] = CHECKSUM_SIZE_CRC32;
            block[16..20].copy_from_slice(&crc.to_be_bytes());
        }
        self.crc = checksum::SEED;
        block
    }

    /// Write a commit record closing `tid`.
    pub fn write_commit(&mut self, tid: u32) {
        let stored = self
            .compat
            .contains(CompatFeatures::CHECKSUM)
            .then_some(self.crc);
        let block = self.commit_block(tid, stored);
        self.place(&block);
    }

    /// Write a commit record whose stored checksum is wrong.
    pub fn write_bad_commit(&mut self, tid: u32) {
        let stored = self.crc ^ 0x5555_5555;
        let block = self.commit_block(tid, Some(stored));
        self.place(&block);
    }

    /// Write the all-zero commit triple an old writer produces, even
    /// when the checksum feature is on.
    pub fn write_legacy_commit(&mut self, tid: u32) {
        let block = self.commit_block(tid, None);
        self.place(&block);
    }

    /// Descriptor, data blocks, and a good commit in one go.
    pub fn write_transaction(&mut self, tid: u32, writes: &[(u64, Vec<u8>)]) {
        self.write_descriptor(tid, writes);
        self.write_commit(tid);
    }

    /// Write a revoke record for `blocks`, tagged `tid`.
    pub fn write_revoke(&mut self, tid: u32, blocks: &[u64]) {
        self.incompat |= IncompatFeatures::REVOKE;
        let entry_bytes = if self.wide() { 8 } else { 4 };
        let mut block = vec![0u8; BLOCK_SIZE];
        Self::header_into(&mut block, BlockType::Revoke, tid);
        let count = 16 + blocks.len() * entry_bytes;
        block[12..16].copy_from_slice(&(count as u32).to_be_bytes());
        let mut offset = 16;
        for block_nr in blocks {
            if self.wide() {
                block[offset..offset + 8].copy_from_slice(&block_nr.to_be_bytes());
            } else {
                let low = u32::try_from(*block_nr).expect("narrow revoke entry");
                block[offset..offset + 4].copy_from_slice(&low.to_be_bytes());
            }
            offset += entry_bytes;
        }
        self.place(&block);
    }

    /// Write a block the journal never produced (torn tail).
    pub fn write_garbage(&mut self) {
        let block = vec![0xFF_u8; BLOCK_SIZE];
        self.place(&block);
    }

    /// Install the superblock and hand back the finished image.
    pub fn finish(mut self) -> MemBlockCache {
        let superblock = JournalSuperblock {
            version: if self.v1 {
                SuperblockVersion::V1
            } else {
                SuperblockVersion::V2
            },
            block_size: BLOCK_SIZE as u32,
            maxlen: self.maxlen,
            first: self.first,
            sequence: TxId::new(self.sequence),
            start: self.start,
            errno: 0,
            compat: self.compat.bits(),
            incompat: self.incompat.bits() | self.extra_incompat,
            ro_compat: 0,
            uuid: [0x42; 16],
            dynsuper: 0,
            max_transaction: 0,
            max_trans_data: 0,
            checksum_type: 0,
            checksum: 0,
            users: vec![[0x42; 16]],
        };
        let mut block = vec![0u8; BLOCK_SIZE];
        superblock
            .encode_into(&mut block)
            .expect("fixture superblock encodes");
        self.cache.install(JOURNAL_BASE, &block);
        self.cache
    }
}

/// Parse the superblock back out of a finished image.
pub fn read_superblock(cache: &mut MemBlockCache) -> JournalSuperblock {
    let block = cache.read(JOURNAL_BASE).expect("superblock readable");
    JournalSuperblock::parse(block.as_slice()).expect("superblock parses")
}
