#![forbid(unsafe_code)]
//! Error types shared by every FrankenJournal crate.
//!
//! A deliberately small surface: recovery treats most anomalies (bad magic,
//! wrong sequence, checksum mismatch) as ordinary values, not errors.
//! `JournalError` is reserved for conditions that genuinely abort an
//! operation: failed I/O, failed logical-to-physical translation, and
//! journals whose format we must refuse to interpret.

use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T, E = JournalError> = std::result::Result<T, E>;

/// The unified error type for journal loading and recovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JournalError {
    /// A logical log block has no physical mapping.
    #[error("journal block {logical} has no physical mapping")]
    BadBlockMap {
        /// Logical offset that failed to translate.
        logical: u32,
    },

    /// A physical block could not be read in full.
    #[error("short read at physical block {physical}")]
    ShortRead {
        /// Physical block number of the failed read.
        physical: u64,
    },

    /// A block buffer could not be allocated or acquired.
    #[error("out of memory while buffering journal blocks")]
    OutOfMemory,

    /// A value fell outside the range the format permits.
    #[error("{what} out of range: {value}")]
    OutOfRange {
        /// What was being range-checked.
        what: String,
        /// The offending value, already formatted.
        value: String,
    },

    /// The journal's static structure is not interpretable.
    #[error("corrupt journal: {detail}")]
    Corrupt {
        /// Human-readable description of the structural problem.
        detail: String,
    },

    /// The superblock carries incompatible feature bits we do not know.
    #[error("journal uses unsupported incompat features {incompat:#010x}")]
    UnsupportedFeature {
        /// The unrecognized incompat bits.
        incompat: u32,
    },

    /// An underlying storage operation failed.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation that indicates a bug rather than bad input.
    #[error("internal error: {detail}")]
    Internal {
        /// Description of the violated invariant.
        detail: String,
    },
}

impl JournalError {
    /// Build an [`JournalError::Internal`] from anything displayable.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Build a [`JournalError::Corrupt`] from anything displayable.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt {
            detail: detail.into(),
        }
    }

    /// Whether this error belongs to the fatal I/O class that aborts a
    /// recovery pass (as opposed to a load-time format rejection).
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::BadBlockMap { .. } | Self::ShortRead { .. } | Self::OutOfMemory | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_carry_context() {
        let err = JournalError::BadBlockMap { logical: 42 };
        assert_eq!(
            err.to_string(),
            "journal block 42 has no physical mapping"
        );

        let err = JournalError::OutOfRange {
            what: "revoke count".to_owned(),
            value: "9000".to_owned(),
        };
        assert_eq!(err.to_string(), "revoke count out of range: 9000");
    }

    #[test]
    fn io_classification() {
        assert!(JournalError::ShortRead { physical: 7 }.is_io());
        assert!(JournalError::OutOfMemory.is_io());
        assert!(!JournalError::corrupt("bad superblock magic").is_io());
        assert!(!JournalError::UnsupportedFeature { incompat: 0x8 }.is_io());
    }
}
