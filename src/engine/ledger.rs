use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use ulid::Ulid;

use crate::limits::{MAX_BATCH_SIZE, MAX_SHIFT_MINUTES};
use crate::model::*;
use crate::observability;
use crate::sync::SyncOp;

use super::board::Board;
use super::validate::validate_draft;
use super::{Collaborators, EngineError};

struct Tracked {
    /// Insertion order, so batch results come back in the order edits began.
    seq: u64,
    change: PendingChange,
}

/// Result of one item in `commit_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub id: Ulid,
    pub result: Result<Booking, EngineError>,
}

impl CommitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&EngineError> {
        self.result.as_ref().err()
    }
}

/// Uncommitted time shifts, one per booking.
pub struct Ledger {
    entries: DashMap<Ulid, Tracked>,
    next_seq: AtomicU64,
    deps: Collaborators,
    board: Board,
}

impl Ledger {
    pub fn new(deps: Collaborators, board: Board) -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            deps,
            board,
        }
    }

    /// Accumulate `minutes` onto the booking's shift. The first call snapshots
    /// `snapshot_if_absent` as the original; later calls ignore it. New times
    /// are always derived from that original, so arrival order never matters.
    ///
    /// A shift past `MAX_SHIFT_MINUTES` is rejected and leaves the ledger as it was.
    pub fn add_delta(
        &self,
        id: Ulid,
        minutes: i64,
        snapshot_if_absent: &BookingDraft,
    ) -> Result<PendingChange, EngineError> {
        let change = match self.entries.entry(id) {
            Entry::Occupied(mut slot) => {
                let tracked = slot.get_mut();
                tracked.change.delta_minutes = checked_total(&tracked.change, minutes)?;
                tracked.change.clone()
            }
            Entry::Vacant(slot) => {
                let mut change = PendingChange {
                    booking_id: id,
                    delta_minutes: 0,
                    original: snapshot_if_absent.clone(),
                };
                change.delta_minutes = checked_total(&change, minutes)?;
                slot.insert(Tracked {
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    change: change.clone(),
                });
                change
            }
        };
        self.record_pending();
        tracing::debug!(
            "pending shift for {id}: {:+} min (cumulative {:+})",
            minutes,
            change.delta_minutes
        );
        Ok(change)
    }

    /// Send the shifted booking to the store. The entry is dropped only on
    /// success; on failure it stays exactly as it was.
    pub async fn commit(&self, id: Ulid) -> Result<Booking, EngineError> {
        let captured = self.get(id).ok_or(EngineError::NotFound(id))?;
        let payload = captured.payload();
        validate_draft(&payload, self.deps.directory.as_ref(), self.deps.catalog.as_ref())?;

        let started = Instant::now();
        let result = self.deps.remote.update(id, &payload).await;
        observability::record_write("update", result.is_ok(), started);
        if let Err(e) = result {
            tracing::warn!("commit of {id} failed, keeping pending shift: {e}");
            return Err(e.into());
        }

        // A delta that arrived mid-flight keeps the entry; its cumulative
        // value is still relative to the same original.
        self.entries.remove_if(&id, |_, t| t.change == captured);
        self.record_pending();

        let booking = payload.with_id(id);
        self.board.refresh_confirmed(booking.clone());
        self.deps.sync.dispatch(SyncOp::Update(booking.clone()));
        tracing::info!("committed {:+} min shift for {id}", captured.delta_minutes);
        Ok(booking)
    }

    /// Commit every pending id independently. Never fails as a whole: each
    /// outcome is reported, failed ids stay pending.
    pub async fn commit_all(&self) -> Vec<CommitOutcome> {
        let mut order: Vec<(u64, Ulid)> = self.entries.iter().map(|e| (e.seq, *e.key())).collect();
        order.sort();

        let mut outcomes = Vec::with_capacity(order.len());
        for chunk in order.chunks(MAX_BATCH_SIZE) {
            let results = join_all(chunk.iter().map(|(_, id)| self.commit(*id))).await;
            outcomes.extend(
                chunk
                    .iter()
                    .zip(results)
                    .map(|((_, id), result)| CommitOutcome { id: *id, result }),
            );
        }
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        if failed > 0 {
            tracing::warn!("batch commit: {failed} of {} failed", outcomes.len());
        }
        outcomes
    }

    /// Drop the pending shift. Absent ids are a no-op.
    pub fn revert(&self, id: Ulid) -> Option<PendingChange> {
        let removed = self.entries.remove(&id).map(|(_, t)| t.change);
        if removed.is_some() {
            self.record_pending();
            tracing::debug!("reverted pending shift for {id}");
        }
        removed
    }

    pub fn has_pending(&self, id: Ulid) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: Ulid) -> Option<PendingChange> {
        self.entries.get(&id).map(|t| t.change.clone())
    }

    /// All pending changes in the order they began.
    pub fn get_all(&self) -> Vec<PendingChange> {
        let mut all: Vec<(u64, PendingChange)> = self
            .entries
            .iter()
            .map(|t| (t.seq, t.change.clone()))
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, c)| c).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_pending(&self) {
        metrics::gauge!(observability::LEDGER_PENDING).set(self.entries.len() as f64);
    }
}

/// Cumulative delta after adding `minutes`, if it stays within bounds.
fn checked_total(change: &PendingChange, minutes: i64) -> Result<i64, EngineError> {
    change
        .delta_minutes
        .checked_add(minutes)
        .filter(|total| (-MAX_SHIFT_MINUTES..=MAX_SHIFT_MINUTES).contains(total))
        .filter(|total| change.original.span().checked_shift(*total).is_some())
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "shift of {minutes:+} min for {} is out of range",
                change.booking_id
            ))
        })
}
