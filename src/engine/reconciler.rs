use std::collections::{HashMap, HashSet};
use std::time::Instant;

use dashmap::DashSet;
use ulid::Ulid;

use crate::model::*;
use crate::observability;
use crate::sync::SyncOp;

use super::board::Board;
use super::validate::validate_draft;
use super::{Collaborators, EngineError};

/// Optimistic create/update/delete over the authoritative store.
///
/// Per booking: absent → Creating → Confirmed on ack, or absent again on
/// failure. Confirmed → Updating → Confirmed on ack, or a reload on failure.
/// Confirmed → removed at once; a failed delete reloads.
pub struct Reconciler {
    deps: Collaborators,
    board: Board,
    /// Ids with a delete in flight, kept off the board across reloads.
    deleting: DashSet<Ulid>,
}

impl Reconciler {
    pub fn new(deps: Collaborators, board: Board) -> Self {
        Self {
            deps,
            board,
            deleting: DashSet::new(),
        }
    }

    /// Show the booking at once under a temporary id, then create it remotely.
    /// On failure the tentative entry is removed and nothing else remains.
    pub async fn create_tentative(&self, draft: BookingDraft) -> Result<Booking, EngineError> {
        validate_draft(&draft, self.deps.directory.as_ref(), self.deps.catalog.as_ref())?;

        let temp_id = Ulid::new();
        self.board.push(BoardEntry::Creating {
            temp_id,
            draft: draft.clone(),
        });

        let started = Instant::now();
        let result = self.deps.remote.create(&draft).await;
        observability::record_write("create", result.is_ok(), started);

        match result {
            Ok(id) => {
                let booking = self.acknowledge_create(temp_id, draft, id);
                tracing::info!("created booking {id} (was tmp:{temp_id})");
                self.deps.sync.dispatch_create(
                    booking.clone(),
                    self.deps.remote.clone(),
                    self.board.clone(),
                );
                Ok(booking)
            }
            Err(e) => {
                self.board.remove(EntryId::Temp(temp_id));
                tracing::warn!("create failed, dropped tmp:{temp_id}: {e}");
                Err(e.into())
            }
        }
    }

    /// Swap the tentative entry for the authoritative one, in place. If the
    /// store's echo already reached the board, it is folded in so only one
    /// entry remains, and local fields the echo lacks are kept.
    fn acknowledge_create(&self, temp_id: Ulid, local: BookingDraft, id: Ulid) -> Booking {
        let mut confirmed = local.clone().with_id(id);
        self.board.mutate(|entries| {
            let mut state_is_updating = false;
            if let Some(pos) = entries.iter().position(|e| e.booking_id() == Some(id)) {
                let echo = entries.remove(pos);
                state_is_updating = matches!(echo, BoardEntry::Updating(_));
                if let BoardEntry::Confirmed(b) | BoardEntry::Updating(b) = echo {
                    confirmed = keep_local_fields(b, &local);
                }
                tracing::debug!("folded store echo of {id} into its tentative entry");
            }
            let entry = if state_is_updating {
                BoardEntry::Updating(confirmed.clone())
            } else {
                BoardEntry::Confirmed(confirmed.clone())
            };
            match entries.iter_mut().find(|e| e.id() == EntryId::Temp(temp_id)) {
                Some(slot) => *slot = entry,
                None => entries.push(entry),
            }
            true
        });
        confirmed
    }

    /// Apply `patch` in place and mark the entry tentative, then send the full
    /// booking. A failed write discards the local guess by reloading.
    pub async fn update_tentative(
        &self,
        id: Ulid,
        patch: &BookingPatch,
    ) -> Result<Booking, EngineError> {
        let current = self.board.booking(id).ok_or(EngineError::NotFound(id))?;
        let mut draft = current.draft.clone();
        patch.apply(&mut draft);
        validate_draft(&draft, self.deps.directory.as_ref(), self.deps.catalog.as_ref())?;

        let edited = draft.clone().with_id(id);
        self.board
            .replace(EntryId::Booking(id), BoardEntry::Updating(edited.clone()));

        let started = Instant::now();
        let result = self.deps.remote.update(id, &draft).await;
        observability::record_write("update", result.is_ok(), started);

        match result {
            Ok(()) => {
                let target = EntryId::Booking(id);
                self.board.mutate(|entries| {
                    match entries.iter_mut().find(|e| e.id() == target) {
                        Some(slot) if *slot == BoardEntry::Updating(edited.clone()) => {
                            *slot = BoardEntry::Confirmed(edited.clone());
                            true
                        }
                        _ => false,
                    }
                });
                self.deps.sync.dispatch(SyncOp::Update(edited.clone()));
                Ok(edited)
            }
            Err(e) => {
                tracing::warn!("update of {id} failed, reloading: {e}");
                if self.reload_discarding(Some(id)).await.is_err() {
                    // Without a fresh view, fall back to the last confirmed copy.
                    self.board.mutate(|entries| {
                        match entries.iter_mut().find(|e| e.id() == EntryId::Booking(id)) {
                            Some(slot) if slot.is_tentative() => {
                                *slot = BoardEntry::Confirmed(current);
                                true
                            }
                            _ => false,
                        }
                    });
                }
                Err(e.into())
            }
        }
    }

    /// Take the booking off the board at once, then delete it remotely.
    /// A failed delete reloads, which brings it back. If the reload fails
    /// too, the removed copy is restored as confirmed.
    pub async fn remove_tentative(&self, id: Ulid) -> Result<(), EngineError> {
        let removed = self.board.remove(EntryId::Booking(id));
        self.deleting.insert(id);

        let started = Instant::now();
        let result = self.deps.remote.delete(id).await;
        observability::record_write("delete", result.is_ok(), started);
        self.deleting.remove(&id);

        match result {
            Ok(()) => {
                tracing::info!("deleted booking {id}");
                if let Some(BoardEntry::Confirmed(b) | BoardEntry::Updating(b)) = removed {
                    self.deps.sync.dispatch(SyncOp::Delete(b));
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("delete of {id} failed, reloading: {e}");
                if self.reload_discarding(None).await.is_err() {
                    // The store still has it; show the copy we took off.
                    if let Some(BoardEntry::Confirmed(b) | BoardEntry::Updating(b)) = removed {
                        self.board.mutate(|entries| {
                            if entries.iter().any(|e| e.booking_id() == Some(id)) {
                                return false;
                            }
                            entries.push(BoardEntry::Confirmed(b));
                            true
                        });
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Merge an authoritative snapshot from the store subscription.
    pub fn apply_remote(&self, bookings: &[Booking]) {
        let deleting: HashSet<Ulid> = self.deleting.iter().map(|id| *id).collect();
        let changed = self.board.mutate(|entries| {
            let merged = merge_snapshot(entries, bookings, &deleting, None);
            if merged == *entries {
                return false;
            }
            *entries = merged;
            true
        });
        if changed {
            tracing::debug!("applied store snapshot of {} bookings", bookings.len());
        }
    }

    /// Replace the board's confirmed view with a fresh read of the store.
    pub async fn reload(&self) -> Result<(), EngineError> {
        self.reload_discarding(None).await
    }

    async fn reload_discarding(&self, discard: Option<Ulid>) -> Result<(), EngineError> {
        metrics::counter!(observability::RELOADS_TOTAL).increment(1);
        let bookings = match self.deps.remote.fetch_all().await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("reload failed: {e}");
                return Err(e.into());
            }
        };
        let deleting: HashSet<Ulid> = self.deleting.iter().map(|id| *id).collect();
        self.board.mutate(|entries| {
            *entries = merge_snapshot(entries, &bookings, &deleting, discard);
            true
        });
        tracing::info!("reloaded {} bookings from store", bookings.len());
        Ok(())
    }
}

/// Authoritative fields win; optional fields the store left empty keep the
/// local value.
fn keep_local_fields(mut echo: Booking, local: &BookingDraft) -> Booking {
    if echo.draft.notes.is_none() {
        echo.draft.notes = local.notes.clone();
    }
    if echo.draft.external_ref.is_none() {
        echo.draft.external_ref = local.external_ref.clone();
    }
    echo
}

/// Lay an authoritative snapshot over the board.
///
/// Creating entries and in-flight edits (except `discard`) stay as they are.
/// Confirmed entries take the store's version or vanish with it. Bookings new
/// to the board are appended, unless a delete for them is in flight or they
/// are the store's copy of a create still awaiting its ack.
fn merge_snapshot(
    current: &[BoardEntry],
    authoritative: &[Booking],
    deleting: &HashSet<Ulid>,
    discard: Option<Ulid>,
) -> Vec<BoardEntry> {
    let by_id: HashMap<Ulid, &Booking> = authoritative.iter().map(|b| (b.id, b)).collect();
    let mut seen: HashSet<Ulid> = HashSet::new();
    let mut awaiting_ack: Vec<&BookingDraft> = Vec::new();
    let mut out = Vec::with_capacity(current.len().max(authoritative.len()));

    for entry in current {
        match entry {
            BoardEntry::Creating { draft, .. } => {
                awaiting_ack.push(draft);
                out.push(entry.clone());
            }
            BoardEntry::Updating(b) if Some(b.id) != discard => {
                if seen.insert(b.id) {
                    out.push(entry.clone());
                }
            }
            BoardEntry::Updating(b) | BoardEntry::Confirmed(b) => {
                if deleting.contains(&b.id) {
                    continue;
                }
                if let Some(auth) = by_id.get(&b.id)
                    && seen.insert(b.id)
                {
                    out.push(BoardEntry::Confirmed((*auth).clone()));
                }
            }
        }
    }
    for b in authoritative {
        if deleting.contains(&b.id) || !seen.insert(b.id) {
            continue;
        }
        // Each tentative create hides at most one echo; the ack places it.
        if let Some(pos) = awaiting_ack.iter().position(|d| same_slot(d, &b.draft)) {
            awaiting_ack.swap_remove(pos);
            continue;
        }
        out.push(BoardEntry::Confirmed(b.clone()));
    }
    out
}

/// Same client in the same chair for the same service and time.
fn same_slot(a: &BookingDraft, b: &BookingDraft) -> bool {
    a.resource_id == b.resource_id
        && a.service_id == b.service_id
        && a.client_id == b.client_id
        && a.start == b.start
        && a.end == b.end
}
