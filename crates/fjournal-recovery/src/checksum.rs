//! Cumulative transaction checksums.
//!
//! The format checksums a transaction by folding a big-endian-convention
//! CRC-32 (polynomial 0x04C11DB7, MSB-first, no reflection, no final
//! xor) over the descriptor block and then every data block it names, in
//! log order, seeded with `!0` at each transaction boundary. No registry
//! crate implements this exact convention — the common `crc32c` and
//! reflected-CRC-32 crates compute different functions — so the table
//! lives here, next to its only consumer.

use fjournal_ondisk::CommitBlock;
use fjournal_types::{CHECKSUM_SIZE_CRC32, CHECKSUM_TYPE_CRC32};

/// Accumulator seed at the start of each transaction.
pub const SEED: u32 = !0;

const POLYNOMIAL: u32 = 0x04C1_1DB7;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut index = 0;
    while index < 256 {
        let mut crc = (index as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 == 0 {
                crc << 1
            } else {
                (crc << 1) ^ POLYNOMIAL
            };
            bit += 1;
        }
        table[index] = crc;
        index += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = build_table();

/// Fold one block's bytes into the running checksum.
#[must_use]
pub fn fold(crc: u32, bytes: &[u8]) -> u32 {
    bytes.iter().fold(crc, |crc, &byte| {
        (crc << 8) ^ CRC_TABLE[(((crc >> 24) ^ u32::from(byte)) & 0xFF) as usize]
    })
}

/// Check an accumulated checksum against a commit record.
///
/// True iff the stored value matches *and* the record declares the
/// CRC-32 algorithm and size — or the record is the all-zero legacy
/// triple written by pre-checksum writers, which never counts as a
/// mismatch.
#[must_use]
pub fn verify_commit(accumulated: u32, commit: &CommitBlock) -> bool {
    if commit.checksum_type == CHECKSUM_TYPE_CRC32
        && commit.checksum_size == CHECKSUM_SIZE_CRC32
        && commit.checksum == accumulated
    {
        return true;
    }
    commit.checksum_type == 0 && commit.checksum_size == 0 && commit.checksum == 0
}
