use ulid::Ulid;

use crate::model::*;

use super::{CommitOutcome, Engine, EngineError};

impl Engine {
    /// Shift a booking by `minutes` without touching the store. The booking's
    /// current board copy becomes the original on the first nudge. A shift
    /// that would move it out of range is a `Validation` error.
    pub fn nudge(&self, id: Ulid, minutes: i64) -> Result<PendingChange, EngineError> {
        match self.ledger.get(id) {
            Some(existing) => self.ledger.add_delta(id, minutes, &existing.original),
            None => {
                let current = self.board.booking(id).ok_or(EngineError::NotFound(id))?;
                self.ledger.add_delta(id, minutes, &current.draft)
            }
        }
    }

    pub async fn commit(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.ledger.commit(id).await
    }

    pub async fn commit_all(&self) -> Vec<CommitOutcome> {
        self.ledger.commit_all().await
    }

    pub fn revert(&self, id: Ulid) -> Option<PendingChange> {
        self.ledger.revert(id)
    }

    pub async fn create(&self, draft: BookingDraft) -> Result<Booking, EngineError> {
        self.reconciler.create_tentative(draft).await
    }

    pub async fn update(&self, id: Ulid, patch: &BookingPatch) -> Result<Booking, EngineError> {
        self.reconciler.update_tentative(id, patch).await
    }

    /// Delete a booking. Any pending shift for it goes too.
    pub async fn remove(&self, id: Ulid) -> Result<(), EngineError> {
        self.ledger.revert(id);
        self.reconciler.remove_tentative(id).await
    }
}
