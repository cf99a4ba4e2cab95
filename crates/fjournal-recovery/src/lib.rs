#![forbid(unsafe_code)]
//! Crash recovery for the FrankenJournal write-ahead log.
//!
//! The entry points live on [`Journal`]: [`Journal::recover`] runs the
//! full three-pass algorithm (scan, revoke collection, replay) and
//! [`Journal::skip_recovery`] discards the log after a scan. Both
//! return a [`RecoveryInfo`] describing what was found and applied.
//!
//! The engine is deliberately synchronous and single-threaded: the
//! filesystem must be quiesced while recovery runs, and only one
//! recovery may run against a given log at a time. The sole concurrency
//! concession is the bounded readahead hint issued to the block cache
//! collaborator.

pub mod checksum;
pub mod journal;
pub mod recovery;
pub mod revoke;

pub use journal::Journal;
pub use recovery::{RecoveryInfo, RecoveryPass};
pub use revoke::RevokeTable;
