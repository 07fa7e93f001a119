use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use ulid::Ulid;

use crate::engine::{Board, SyncWarning};
use crate::model::{BoardEntry, Booking, BookingDraft, EntryId};
use crate::store::RemoteStore;

/// External calendar mirror. Best-effort: the engine never waits on it.
#[async_trait]
pub trait CalendarSyncService: Send + Sync {
    /// Mirror a new booking. `Some(event_id)` is stored as the booking's
    /// `external_ref`; `None` leaves the field to the caller.
    async fn sync_create(&self, booking: &Booking) -> Result<Option<String>, String>;

    async fn sync_update(&self, booking: &Booking) -> Result<(), String>;

    async fn sync_delete(&self, booking: &Booking) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOp {
    Create(Booking),
    Update(Booking),
    Delete(Booking),
}

impl SyncOp {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOp::Create(_) => "create",
            SyncOp::Update(_) => "update",
            SyncOp::Delete(_) => "delete",
        }
    }

    pub fn booking(&self) -> &Booking {
        match self {
            SyncOp::Create(b) | SyncOp::Update(b) | SyncOp::Delete(b) => b,
        }
    }
}

/// Where a calendar event id goes once the calendar hands one back.
struct WriteBack {
    remote: Arc<dyn RemoteStore>,
    board: Board,
}

/// Runs sync calls on their own task after a successful store write.
/// Failures end as a logged `SyncWarning`.
#[derive(Clone, Default)]
pub struct SyncDispatcher {
    service: Option<Arc<dyn CalendarSyncService>>,
}

impl SyncDispatcher {
    pub fn new(service: Option<Arc<dyn CalendarSyncService>>) -> Self {
        Self { service }
    }

    pub fn disabled() -> Self {
        Self { service: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.service.is_some()
    }

    /// Fire and forget. The handle is only useful to tests.
    pub fn dispatch(&self, op: SyncOp) -> Option<JoinHandle<()>> {
        self.spawn(op, None)
    }

    /// `dispatch` for a new booking. An event id returned by the calendar is
    /// written to `remote` and to the board's confirmed copy.
    pub fn dispatch_create(
        &self,
        booking: Booking,
        remote: Arc<dyn RemoteStore>,
        board: Board,
    ) -> Option<JoinHandle<()>> {
        self.spawn(SyncOp::Create(booking), Some(WriteBack { remote, board }))
    }

    fn spawn(&self, op: SyncOp, write_back: Option<WriteBack>) -> Option<JoinHandle<()>> {
        let service = self.service.clone()?;
        Some(tokio::spawn(async move {
            match run(service.as_ref(), &op).await {
                Ok(Some(event_id)) => {
                    if let Some(target) = write_back {
                        store_external_ref(&target, op.booking().id, event_id).await;
                    }
                }
                Ok(None) => {}
                Err(warning) => {
                    tracing::warn!("{warning}");
                    let label = op.label();
                    metrics::counter!(crate::observability::SYNC_FAILURES_TOTAL, "op" => label)
                        .increment(1);
                }
            }
        }))
    }
}

async fn run(
    service: &dyn CalendarSyncService,
    op: &SyncOp,
) -> Result<Option<String>, SyncWarning> {
    let result = match op {
        SyncOp::Create(b) => service.sync_create(b).await,
        SyncOp::Update(b) => service.sync_update(b).await.map(|()| None),
        SyncOp::Delete(b) => service.sync_delete(b).await.map(|()| None),
    };
    result.map_err(|message| SyncWarning {
        op: op.label(),
        booking_id: op.booking().id,
        message,
    })
}

/// Record `event_id` on the booking's current confirmed copy. A booking that
/// is gone or has an edit in flight is left alone.
async fn store_external_ref(target: &WriteBack, id: Ulid, event_id: String) {
    let current = match target.board.get(EntryId::Booking(id)) {
        Some(BoardEntry::Confirmed(b)) => b,
        _ => {
            tracing::debug!("calendar event {event_id} for {id} not stored, booking busy or gone");
            return;
        }
    };
    if current.draft.external_ref.as_deref() == Some(event_id.as_str()) {
        return;
    }
    let draft = BookingDraft {
        external_ref: Some(event_id),
        ..current.draft
    };
    match target.remote.update(id, &draft).await {
        Ok(()) => {
            target.board.refresh_confirmed(draft.with_id(id));
            tracing::debug!("stored calendar event for {id}");
        }
        Err(e) => tracing::warn!("could not store calendar event for {id}: {e}"),
    }
}
