use std::sync::Arc;

use tokio::sync::watch;
use ulid::Ulid;

use crate::model::*;

/// The locally visible booking collection.
///
/// Every mutation swaps in a new snapshot through the watch channel, so a
/// reader always holds a consistent, owned view and never a lock. Only the
/// ledger and the reconciler mutate it.
#[derive(Clone)]
pub struct Board {
    tx: Arc<watch::Sender<Vec<BoardEntry>>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Vec<BoardEntry> {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes on every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<BoardEntry>> {
        self.tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<BoardEntry> {
        self.tx.borrow().iter().find(|e| e.id() == id).cloned()
    }

    /// The local view of a booking, tentative edits included.
    pub fn booking(&self, id: Ulid) -> Option<Booking> {
        match self.get(EntryId::Booking(id))? {
            BoardEntry::Confirmed(b) | BoardEntry::Updating(b) => Some(b),
            BoardEntry::Creating { .. } => None,
        }
    }

    /// Run `f` against the entries. Watchers are woken only if it returns true.
    pub(crate) fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Vec<BoardEntry>) -> bool,
    {
        self.tx.send_if_modified(f)
    }

    pub(crate) fn push(&self, entry: BoardEntry) {
        self.mutate(|entries| {
            entries.push(entry);
            true
        });
    }

    pub(crate) fn remove(&self, id: EntryId) -> Option<BoardEntry> {
        let mut removed = None;
        self.mutate(|entries| match entries.iter().position(|e| e.id() == id) {
            Some(pos) => {
                removed = Some(entries.remove(pos));
                true
            }
            None => false,
        });
        removed
    }

    /// Swap the entry with `id` for `entry`, keeping its position.
    pub(crate) fn replace(&self, id: EntryId, entry: BoardEntry) -> bool {
        self.mutate(|entries| match entries.iter_mut().find(|e| e.id() == id) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        })
    }

    /// Refresh a confirmed entry after a committed write. Entries with an
    /// edit in flight are left for that edit to resolve.
    pub(crate) fn refresh_confirmed(&self, booking: Booking) -> bool {
        let id = EntryId::Booking(booking.id);
        self.mutate(|entries| match entries.iter_mut().find(|e| e.id() == id) {
            Some(slot) if matches!(slot, BoardEntry::Confirmed(_)) => {
                *slot = BoardEntry::Confirmed(booking);
                true
            }
            _ => false,
        })
    }
}
