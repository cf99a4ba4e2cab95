#![forbid(unsafe_code)]
//! Core value types for the FrankenJournal recovery engine.
//!
//! Everything here is a plain value: transaction ids with the wrapping
//! ordering the on-disk format requires, block numbers, the circular log
//! geometry, and the `bitflags` words that mirror the on-disk feature and
//! tag bits. On-disk bit assignments are fixed by the format and must not
//! be renumbered.

pub mod flags;
pub mod geometry;

pub use flags::{CompatFeatures, IncompatFeatures, RoCompatFeatures, TagFlags};
pub use geometry::Geometry;

use serde::{Deserialize, Serialize};

/// Magic number at the head of every journal block (big-endian on disk).
pub const JOURNAL_MAGIC: u32 = 0xC03B_3998;

/// Commit-record checksum algorithm id for big-endian CRC-32.
pub const CHECKSUM_TYPE_CRC32: u8 = 1;
/// Stored size in bytes of a CRC-32 commit checksum.
pub const CHECKSUM_SIZE_CRC32: u8 = 4;

/// Size of the per-tag UUID trailer inside descriptor blocks.
pub const TAG_UUID_BYTES: usize = 16;

/// A journal transaction id.
///
/// Transaction ids are 32-bit counters that are allowed to wrap, so
/// ordering uses the signed-difference convention: `a` is after `b` iff
/// `(a - b) as i32 > 0`. All recovery-window comparisons go through
/// [`TxId::after`] / [`TxId::at_or_after`]; never compare raw values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(u32);

impl TxId {
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The id of the next transaction, wrapping at `u32::MAX`.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Wrapping-order strict "greater than".
    #[inline]
    #[must_use]
    pub const fn after(self, other: Self) -> bool {
        (self.0.wrapping_sub(other.0) as i32) > 0
    }

    /// Wrapping-order "greater than or equal".
    #[inline]
    #[must_use]
    pub const fn at_or_after(self, other: Self) -> bool {
        (self.0.wrapping_sub(other.0) as i32) >= 0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A block number on the backing filesystem device.
///
/// 64-bit wide; formats without the 64-bit incompat feature only ever
/// produce values that fit in 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockNr(u64);

impl BlockNr {
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Assemble from the split low/high words a 64-bit descriptor tag carries.
    #[inline]
    #[must_use]
    pub const fn from_split(low: u32, high: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }
}

impl std::fmt::Display for BlockNr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_ordering_is_plain_when_far_from_wrap() {
        let five = TxId::new(5);
        let eight = TxId::new(8);
        assert!(eight.after(five));
        assert!(!five.after(eight));
        assert!(eight.at_or_after(eight));
    }

    #[test]
    fn tid_ordering_survives_wraparound() {
        let before = TxId::new(u32::MAX - 1);
        let after = before.next().next();
        assert_eq!(after.get(), 0);
        assert!(after.after(before));
        assert!(!before.after(after));
    }

    #[test]
    fn block_nr_split_assembly() {
        let nr = BlockNr::from_split(0xDEAD_BEEF, 0x1);
        assert_eq!(nr.get(), 0x1_DEAD_BEEF);
        assert_eq!(BlockNr::from_split(7, 0), BlockNr::new(7));
    }
}
