//! Shared fixtures for engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;
use dashmap::DashSet;
use tokio::sync::{Mutex, Notify, broadcast, mpsc};
use ulid::Ulid;

use crate::directory::{InMemoryCatalog, InMemoryDirectory};
use crate::model::*;
use crate::notify::StoreEvent;
use crate::store::{InMemoryRemoteStore, RemoteStore, StoreError};
use crate::sync::{CalendarSyncService, SyncDispatcher};

use super::board::Board;
use super::ledger::Ledger;
use super::reconciler::Reconciler;
use super::{Collaborators, Engine};

/// In-memory store with switchable failures and an optional create gate.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryRemoteStore,
    failing_updates: DashSet<Ulid>,
    fail_all_updates: AtomicBool,
    fail_creates: AtomicBool,
    fail_deletes: AtomicBool,
    fail_fetch: AtomicBool,
    gated: AtomicBool,
    gate: Notify,
    updates: AtomicUsize,
    fetches: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_update_of(&self, id: Ulid) {
        self.failing_updates.insert(id);
    }

    pub fn fail_updates(&self, on: bool) {
        self.fail_all_updates.store(on, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, on: bool) {
        self.fail_creates.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, on: bool) {
        self.fail_fetch.store(on, Ordering::SeqCst);
    }

    /// Hold every write until `release` is called.
    pub fn hold_writes(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn wait_gate(&self) {
        while self.gated.load(Ordering::SeqCst) {
            let notified = self.gate.notified();
            if !self.gated.load(Ordering::SeqCst) {
                break;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn create(&self, draft: &BookingDraft) -> Result<Ulid, StoreError> {
        self.wait_gate().await;
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("create refused".into()));
        }
        self.inner.create(draft).await
    }

    async fn update(&self, id: Ulid, draft: &BookingDraft) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if self.fail_all_updates.load(Ordering::SeqCst) || self.failing_updates.contains(&id) {
            return Err(StoreError::Rejected("update refused".into()));
        }
        self.inner.update(id, draft).await
    }

    async fn delete(&self, id: Ulid) -> Result<(), StoreError> {
        self.wait_gate().await;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("delete refused".into()));
        }
        self.inner.delete(id).await
    }

    async fn fetch_all(&self) -> Result<Vec<Booking>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("offline".into()));
        }
        self.inner.fetch_all().await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

/// Forwards every sync call to a channel.
pub struct RecordingSync {
    tx: mpsc::UnboundedSender<(&'static str, Ulid)>,
    fail: bool,
}

impl RecordingSync {
    fn record(&self, op: &'static str, b: &Booking) -> Result<(), String> {
        let _ = self.tx.send((op, b.id));
        if self.fail { Err("calendar token expired".into()) } else { Ok(()) }
    }
}

#[async_trait]
impl CalendarSyncService for RecordingSync {
    async fn sync_create(&self, b: &Booking) -> Result<Option<String>, String> {
        self.record("create", b).map(|()| None)
    }

    async fn sync_update(&self, b: &Booking) -> Result<(), String> {
        self.record("update", b)
    }

    async fn sync_delete(&self, b: &Booking) -> Result<(), String> {
        self.record("delete", b)
    }
}

pub struct Kit {
    pub store: Arc<FlakyStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub catalog: Arc<InMemoryCatalog>,
    pub board: Board,
    pub sync: SyncDispatcher,
    sync_rx: Mutex<Option<mpsc::UnboundedReceiver<(&'static str, Ulid)>>>,
    pub resource: Ulid,
    pub pedicure: Ulid,
    pub haircut: Ulid,
    pub day: NaiveDate,
    pub tz: Tz,
}

impl Kit {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_sync(fail: bool) -> Self {
        Self::build(Some(fail))
    }

    fn build(sync_fail: Option<bool>) -> Self {
        let resource = Ulid::new();
        let pedicure = Ulid::new();
        let haircut = Ulid::new();

        let mut salon = SalonSchedule::default();
        salon.weekdays.insert(
            Weekday::Mon,
            DaySchedule {
                active: true,
                start_minutes: 9 * 60,
                end_minutes: 18 * 60,
            },
        );
        let directory = Arc::new(InMemoryDirectory::new(salon));
        let mut rs = ResourceSchedule::new(resource);
        rs.default_buffer = Some(10);
        rs.personal_buffers.insert(pedicure, 5);
        directory.upsert(rs);

        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.upsert(ServiceDefinition {
            id: pedicure,
            name: "Pedicure".into(),
            duration_minutes: 60,
            exclusive: true,
            buffer_after: None,
        });
        catalog.upsert(ServiceDefinition {
            id: haircut,
            name: "Haircut".into(),
            duration_minutes: 30,
            exclusive: false,
            buffer_after: None,
        });

        let (sync, sync_rx) = match sync_fail {
            Some(fail) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let service: Arc<dyn CalendarSyncService> = Arc::new(RecordingSync { tx, fail });
                (SyncDispatcher::new(Some(service)), Some(rx))
            }
            None => (SyncDispatcher::disabled(), None),
        };

        Self {
            store: Arc::new(FlakyStore::default()),
            directory,
            catalog,
            board: Board::new(),
            sync,
            sync_rx: Mutex::new(sync_rx),
            resource,
            pedicure,
            haircut,
            // A Monday.
            day: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            tz: Tz::UTC,
        }
    }

    pub fn deps(&self) -> Collaborators {
        Collaborators {
            remote: self.store.clone(),
            directory: self.directory.clone(),
            catalog: self.catalog.clone(),
            sync: self.sync.clone(),
        }
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.deps(), self.board.clone())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.deps(), self.board.clone())
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.deps(), self.tz)
    }

    pub fn at(&self, hour: u32, minute: u32) -> Ms {
        local_instant(self.day, hour * 60 + minute, self.tz).unwrap()
    }

    pub fn draft(&self, service_id: Ulid, hour: u32, minute: u32, minutes: i64) -> BookingDraft {
        let start = self.at(hour, minute);
        BookingDraft {
            resource_id: self.resource,
            service_id,
            client_id: Ulid::new(),
            start,
            end: start + minutes * MINUTE_MS,
            status: BookingStatus::Confirmed,
            notes: Some("regular".into()),
            price_cents: 5000,
            external_ref: None,
        }
    }

    /// Write straight into the backing store, bypassing failure switches.
    pub async fn seed(&self, draft: &BookingDraft) -> Ulid {
        self.store.inner.create(draft).await.unwrap()
    }

    /// Seed the store and show the booking as confirmed on the kit's board.
    pub async fn seed_confirmed(&self, draft: &BookingDraft) -> Booking {
        let id = self.seed(draft).await;
        let booking = draft.clone().with_id(id);
        self.board.push(BoardEntry::Confirmed(booking.clone()));
        booking
    }

    /// Next sync call, or None after a short wait.
    pub async fn next_sync(&self) -> Option<(&'static str, Ulid)> {
        let mut guard = self.sync_rx.lock().await;
        let rx = guard.as_mut()?;
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// True if no sync call arrives within a short wait.
    pub async fn no_sync(&self) -> bool {
        let mut guard = self.sync_rx.lock().await;
        let Some(rx) = guard.as_mut() else { return true };
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err()
    }
}
