//! The three-pass recovery algorithm.
//!
//! Recovery walks the log three times from the same starting point:
//!
//! 1. **SCAN** finds the end of the log — the id one past the last
//!    transaction with a believable commit record.
//! 2. **REVOKE** collects every revoke record inside that window into
//!    the revoke table.
//! 3. **REPLAY** writes each surviving data block to its real location,
//!    skipping blocks the revoke table suppresses.
//!
//! Running all of REVOKE before any REPLAY write is what makes the
//! revoke guarantee airtight: by the time the first block is written,
//! every revocation in the recoverable window is already known.
//!
//! A torn or never-written tail is detected structurally — wrong magic,
//! wrong sequence, unknown block type — and ends a pass normally. Only
//! failed I/O aborts recovery.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use fjournal_block::BlockCache;
use fjournal_error::Result;
use fjournal_ondisk::{BlockType, CommitBlock, DescriptorBlock, RecordHeader, RevokeBlock};
use fjournal_types::{CompatFeatures, IncompatFeatures, TagFlags, TxId, JOURNAL_MAGIC};

use crate::checksum;
use crate::journal::Journal;
use crate::revoke::RevokeTable;

/// Which of the three passes is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPass {
    Scan,
    Revoke,
    Replay,
}

/// What recovery found and did; returned by both entry points and
/// serializable for diagnostic tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryInfo {
    start_transaction: TxId,
    end_transaction: TxId,
    nr_replays: u32,
    nr_revokes: u32,
    nr_revoke_hits: u32,
    pass_mismatch: bool,
    needs_full_check: bool,
}

impl RecoveryInfo {
    /// First transaction id expected in the log.
    #[must_use]
    pub fn start_transaction(&self) -> TxId {
        self.start_transaction
    }

    /// Exclusive upper bound of the recovered transaction window.
    #[must_use]
    pub fn end_transaction(&self) -> TxId {
        self.end_transaction
    }

    /// Data blocks written back to their real locations.
    #[must_use]
    pub fn nr_replays(&self) -> u32 {
        self.nr_replays
    }

    /// Revoke entries collected from revoke records.
    #[must_use]
    pub fn nr_revokes(&self) -> u32 {
        self.nr_revokes
    }

    /// Data block writes suppressed by the revoke table.
    #[must_use]
    pub fn nr_revoke_hits(&self) -> u32 {
        self.nr_revoke_hits
    }

    /// Whether a later pass terminated at a different transaction than
    /// scanning established (possible only after partial I/O success).
    #[must_use]
    pub fn pass_mismatch(&self) -> bool {
        self.pass_mismatch
    }

    /// Whether the caller should force a full consistency check: a
    /// corrupt transaction was found, or the passes disagreed.
    #[must_use]
    pub fn needs_full_check(&self) -> bool {
        self.needs_full_check
    }
}

impl<C: BlockCache> Journal<C> {
    /// Recover the journal: scan, collect revocations, replay.
    ///
    /// A superblock `start` of zero marks a clean shutdown and makes
    /// this a no-op beyond restarting the transaction sequence. On
    /// every other outcome — including an aborting I/O error — the next
    /// transaction id is fixed past the recovered window, the revoke
    /// table is dropped, and written blocks are flushed; blocks already
    /// replayed before a failure remain applied.
    pub fn recover(&mut self) -> Result<RecoveryInfo> {
        let mut recovery_info = RecoveryInfo::default();

        if self.superblock().is_clean() {
            let sequence = self.superblock().sequence;
            debug!(%sequence, "no recovery required, last transaction was committed cleanly");
            recovery_info.start_transaction = sequence;
            recovery_info.end_transaction = sequence;
            self.set_next_sequence(sequence.next());
            return Ok(recovery_info);
        }

        let mut revoke_table = RevokeTable::new();
        let passes = self.run_passes(&mut recovery_info, &mut revoke_table);

        debug!(
            start = %recovery_info.start_transaction,
            end = %recovery_info.end_transaction,
            replayed = recovery_info.nr_replays,
            revoked = recovery_info.nr_revokes,
            revoke_hits = recovery_info.nr_revoke_hits,
            "recovery passes finished"
        );

        // Restart the log at the next transaction id, invalidating any
        // commit records still sitting in the log. This happens on the
        // failure path too.
        self.set_next_sequence(recovery_info.end_transaction.next());
        revoke_table.clear();

        let head_written = if passes.is_ok() {
            self.reset_log_head();
            self.commit_superblock()
        } else {
            Ok(())
        };
        let flushed = self.cache_mut().flush();

        recovery_info.needs_full_check =
            self.failed_transaction().is_some() || recovery_info.pass_mismatch;

        passes?;
        head_written?;
        flushed?;

        info!(
            start = %recovery_info.start_transaction,
            end = %recovery_info.end_transaction,
            needs_full_check = recovery_info.needs_full_check,
            "journal recovered"
        );
        Ok(recovery_info)
    }

    /// Discard the log without replaying it.
    ///
    /// Runs only the SCAN pass, to learn how many transactions are
    /// being thrown away, then resets the log head to empty. For
    /// callers with independent evidence that the log contents are
    /// stale.
    pub fn skip_recovery(&mut self) -> Result<RecoveryInfo> {
        let mut recovery_info = RecoveryInfo::default();

        if self.superblock().is_clean() {
            let sequence = self.superblock().sequence;
            recovery_info.start_transaction = sequence;
            recovery_info.end_transaction = sequence;
            self.set_next_sequence(sequence.next());
            return Ok(recovery_info);
        }

        let mut revoke_table = RevokeTable::new();
        let scanned =
            self.do_one_pass(&mut recovery_info, &mut revoke_table, RecoveryPass::Scan);

        match &scanned {
            Ok(()) => {
                let dropped = recovery_info
                    .end_transaction
                    .get()
                    .wrapping_sub(recovery_info.start_transaction.get());
                info!(dropped, "ignoring recoverable journal transactions");
                self.set_next_sequence(recovery_info.end_transaction.next());
            }
            Err(err) => {
                error!(%err, "error scanning journal; discarding the whole log");
                self.set_next_sequence(self.next_sequence().next());
            }
        }

        self.reset_log_head();
        let head_written = self.commit_superblock();
        let flushed = self.cache_mut().flush();

        recovery_info.needs_full_check =
            self.failed_transaction().is_some() || recovery_info.pass_mismatch;

        scanned?;
        head_written?;
        flushed?;
        Ok(recovery_info)
    }

    fn run_passes(
        &mut self,
        recovery_info: &mut RecoveryInfo,
        revoke_table: &mut RevokeTable,
    ) -> Result<()> {
        self.do_one_pass(recovery_info, revoke_table, RecoveryPass::Scan)?;
        self.do_one_pass(recovery_info, revoke_table, RecoveryPass::Revoke)?;
        self.do_one_pass(recovery_info, revoke_table, RecoveryPass::Replay)?;
        Ok(())
    }

    /// Walk the whole log once for one pass.
    fn do_one_pass(
        &mut self,
        recovery_info: &mut RecoveryInfo,
        revoke_table: &mut RevokeTable,
        pass: RecoveryPass,
    ) -> Result<()> {
        // Establish what we expect to find — in transaction ids and in
        // log offsets — from the superblock.
        let mut next_commit_id = self.superblock().sequence;
        let mut next_log_block = self.superblock().start;
        let geometry = self.geometry();
        let checksums = self.compat().contains(CompatFeatures::CHECKSUM);
        let wide_blocks = self.incompat().contains(IncompatFeatures::BIT64);
        let async_commit = self.incompat().contains(IncompatFeatures::ASYNC_COMMIT);

        if pass == RecoveryPass::Scan {
            recovery_info.start_transaction = next_commit_id;
        }
        debug!(
            ?pass,
            expected = %next_commit_id,
            offset = next_log_block,
            "starting recovery pass"
        );

        // Running transaction checksum; reseeded at every commit.
        let mut crc = checksum::SEED;
        // During SCAN, the end of the window once a commit checksum has
        // failed. Sticky: later commits only confirm corruption.
        let mut end_fixed: Option<TxId> = None;

        loop {
            // Outside SCAN the window is already known: stop when the
            // transaction id reaches its end.
            if pass != RecoveryPass::Scan
                && next_commit_id.at_or_after(recovery_info.end_transaction)
            {
                break;
            }

            let io_block = next_log_block;
            let block = self.read_log_block(io_block)?;
            next_log_block = geometry.wrap(next_log_block + 1);

            let Some(header) = RecordHeader::parse(block.as_slice()) else {
                break;
            };
            // Blocks the journal never wrote — or wrote for an earlier
            // cycle of the circular log — end the pass. This is how
            // the log tail is found, not an error.
            if !header.has_journal_magic() {
                break;
            }
            if header.sequence != next_commit_id {
                debug!(
                    ?pass,
                    found = %header.sequence,
                    expected = %next_commit_id,
                    offset = io_block,
                    "sequence mismatch ends pass"
                );
                break;
            }
            let Some(kind) = BlockType::from_raw(header.block_type) else {
                debug!(
                    block_type = header.block_type,
                    "unrecognised block type ends pass"
                );
                break;
            };

            match kind {
                BlockType::Descriptor => match pass {
                    RecoveryPass::Replay => {
                        let descriptor = DescriptorBlock::new(block.as_slice(), wide_blocks);
                        for tag in descriptor.tags() {
                            let data_offset = next_log_block;
                            next_log_block = geometry.wrap(next_log_block + 1);
                            let data = self.read_log_block(data_offset)?;

                            if revoke_table.is_revoked(tag.block_nr, next_commit_id) {
                                debug!(
                                    block = %tag.block_nr,
                                    transaction = %next_commit_id,
                                    "write suppressed by revoke"
                                );
                                recovery_info.nr_revoke_hits += 1;
                                continue;
                            }

                            let mut payload = data.into_vec();
                            if tag.flags.contains(TagFlags::ESCAPED) {
                                payload[..4].copy_from_slice(&JOURNAL_MAGIC.to_be_bytes());
                            }
                            self.cache_mut().write(tag.block_nr.get(), &payload)?;
                            recovery_info.nr_replays += 1;
                        }
                    }
                    RecoveryPass::Scan if checksums && end_fixed.is_none() => {
                        // Fold the descriptor and its data blocks into
                        // the running transaction checksum.
                        crc = checksum::fold(crc, block.as_slice());
                        let count =
                            DescriptorBlock::new(block.as_slice(), wide_blocks).count_blocks();
                        for _ in 0..count {
                            let data_offset = next_log_block;
                            next_log_block = geometry.wrap(next_log_block + 1);
                            let data = self.read_log_block(data_offset)?;
                            crc = checksum::fold(crc, data.as_slice());
                        }
                    }
                    RecoveryPass::Scan | RecoveryPass::Revoke => {
                        // Step over the described data blocks unread.
                        let count =
                            DescriptorBlock::new(block.as_slice(), wide_blocks).count_blocks();
                        next_log_block = geometry.wrap(next_log_block + count);
                    }
                },

                BlockType::Commit => {
                    if pass == RecoveryPass::Scan && checksums {
                        if let Some(failed) = end_fixed {
                            // A commit record beyond the failed
                            // transaction: the mismatch was real
                            // corruption, not an interrupted commit.
                            self.mark_failed(failed);
                            break;
                        }
                        let verified = CommitBlock::parse(block.as_slice())
                            .is_some_and(|commit| checksum::verify_commit(crc, &commit));
                        if !verified {
                            warn!(
                                transaction = %next_commit_id,
                                "commit checksum mismatch"
                            );
                            end_fixed = Some(next_commit_id);
                            if !async_commit {
                                self.mark_failed(next_commit_id);
                                break;
                            }
                        }
                        crc = checksum::SEED;
                    }
                    next_commit_id = next_commit_id.next();
                }

                BlockType::Revoke => {
                    if pass == RecoveryPass::Revoke {
                        let record = RevokeBlock::new(block.as_slice(), wide_blocks);
                        for block_nr in record.block_numbers() {
                            revoke_table.set(block_nr, next_commit_id);
                            recovery_info.nr_revokes += 1;
                        }
                    }
                }

                BlockType::SuperblockV1 | BlockType::SuperblockV2 => {
                    debug!(?pass, "superblock in the record stream ends pass");
                    break;
                }
            }
        }

        // We broke out of the walk: either the known end of the window,
        // or an unexpected block marking the end of the valid log.
        match pass {
            RecoveryPass::Scan => {
                recovery_info.end_transaction = end_fixed.unwrap_or(next_commit_id);
            }
            RecoveryPass::Revoke | RecoveryPass::Replay => {
                // It is bad news if the passes end in different places
                // (possible after partial I/O success), but the work
                // already done stands; the caller is told instead.
                if recovery_info.end_transaction != next_commit_id {
                    error!(
                        ?pass,
                        ended = %next_commit_id,
                        expected = %recovery_info.end_transaction,
                        "recovery pass ended at an unexpected transaction"
                    );
                    recovery_info.pass_mismatch = true;
                }
            }
        }
        Ok(())
    }
}
