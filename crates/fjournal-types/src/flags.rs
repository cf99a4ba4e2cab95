//! On-disk flag words.
//!
//! Bit values are fixed by the journal format; they are the same bits the
//! original on-disk layout uses and must never be renumbered.

use bitflags::bitflags;

bitflags! {
    /// Per-tag flags inside a descriptor block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TagFlags: u32 {
        /// The logged payload had its leading magic bytes zeroed on write;
        /// replay must restore them.
        const ESCAPED = 0x1;
        /// No UUID trailer follows this tag (same owner as the previous tag).
        const SAME_UUID = 0x2;
        /// The target block was deleted by this transaction. Carried by the
        /// format; recovery replays these blocks like any other.
        const DELETED = 0x4;
        /// This is the final tag of the descriptor block.
        const LAST_TAG = 0x8;
    }
}

bitflags! {
    /// Backwards-compatible feature bits: old readers may ignore these.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompatFeatures: u32 {
        /// Commit records carry a cumulative per-transaction checksum.
        const CHECKSUM = 0x1;
    }
}

bitflags! {
    /// Incompatible feature bits: a reader that does not know a set bit
    /// must refuse the journal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IncompatFeatures: u32 {
        /// Revoke records are present in the log.
        const REVOKE = 0x1;
        /// Descriptor tags and revoke entries carry 64-bit block numbers.
        const BIT64 = 0x2;
        /// Commit records may hit disk before their data blocks.
        const ASYNC_COMMIT = 0x4;
    }
}

bitflags! {
    /// Read-only-compatible feature bits. None are defined for this
    /// format version; the word is still parsed and preserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RoCompatFeatures: u32 {}
}

impl IncompatFeatures {
    /// Incompat bits this implementation understands.
    #[must_use]
    pub const fn known() -> Self {
        Self::REVOKE.union(Self::BIT64).union(Self::ASYNC_COMMIT)
    }

    /// Bits set on disk that this implementation does not understand.
    #[must_use]
    pub const fn unknown_bits(raw: u32) -> u32 {
        raw & !Self::known().bits()
    }
}
