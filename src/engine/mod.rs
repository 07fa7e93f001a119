mod board;
mod buffer;
mod conflict;
mod error;
mod ledger;
mod mutations;
mod queries;
mod reconciler;
mod validate;
mod window;
#[cfg(test)]
mod testkit;

pub use board::Board;
pub use buffer::{buffer_minutes, effective_end, effective_end_with_service};
pub use conflict::{Slot, conflicting_pairs, detect};
pub use error::{EngineError, SyncWarning};
pub use ledger::{CommitOutcome, Ledger};
pub use reconciler::Reconciler;
pub use window::{resolve, within};

use std::sync::Arc;

use chrono_tz::Tz;

use crate::directory::{ResourceDirectory, ServiceCatalog};
use crate::notify::{self, Subscription};
use crate::store::RemoteStore;
use crate::sync::SyncDispatcher;

/// Everything outside the engine it talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub remote: Arc<dyn RemoteStore>,
    pub directory: Arc<dyn ResourceDirectory>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub sync: SyncDispatcher,
}

/// One salon's board with its ledger and reconciler.
///
/// Derived views (conflicts, windows, agenda) are computed on every read from
/// a fresh board snapshot with pending shifts laid over it.
pub struct Engine {
    pub board: Board,
    pub ledger: Ledger,
    pub reconciler: Reconciler,
    deps: Collaborators,
    tz: Tz,
}

impl Engine {
    pub fn new(deps: Collaborators, tz: Tz) -> Self {
        let board = Board::new();
        Self {
            ledger: Ledger::new(deps.clone(), board.clone()),
            reconciler: Reconciler::new(deps.clone(), board.clone()),
            board,
            deps,
            tz,
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Fill the board from the store.
    pub async fn load(&self) -> Result<(), EngineError> {
        self.reconciler.reload().await
    }

    /// Keep the board in step with the store until the subscription is dropped.
    pub fn listen(self: &Arc<Self>) -> Subscription {
        let engine = Arc::clone(self);
        notify::listen(
            self.deps.remote.subscribe(),
            move |bookings| engine.reconciler.apply_remote(&bookings),
            |e| tracing::warn!("store subscription error: {e}"),
        )
    }
}
