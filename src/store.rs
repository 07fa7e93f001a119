use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::*;
use crate::notify::{ChangeFeed, StoreEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Rejected(String),
    NotFound(Ulid),
    /// A stored document failed strict decoding.
    Malformed { id: String, reason: String },
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Rejected(msg) => write!(f, "rejected by store: {msg}"),
            StoreError::NotFound(id) => write!(f, "document not found: {id}"),
            StoreError::Malformed { id, reason } => write!(f, "malformed document {id}: {reason}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The authoritative booking store. Writes always carry a complete draft.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create(&self, draft: &BookingDraft) -> Result<Ulid, StoreError>;

    async fn update(&self, id: Ulid, draft: &BookingDraft) -> Result<(), StoreError>;

    async fn delete(&self, id: Ulid) -> Result<(), StoreError>;

    /// Every booking that decodes cleanly.
    async fn fetch_all(&self) -> Result<Vec<Booking>, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Decode a raw document into a typed booking. Nothing is defaulted: a missing
/// or mistyped field, a bad id, or an inverted span rejects the document.
pub fn decode_booking(id: &str, doc: &Value) -> Result<Booking, StoreError> {
    let malformed = |reason: String| StoreError::Malformed {
        id: id.to_string(),
        reason,
    };
    let booking_id: Ulid = id.parse().map_err(|e| malformed(format!("bad id: {e}")))?;
    let draft: BookingDraft =
        serde_json::from_value(doc.clone()).map_err(|e| malformed(e.to_string()))?;
    if draft.start >= draft.end {
        return Err(malformed("start is not before end".into()));
    }
    Ok(draft.with_id(booking_id))
}

pub fn encode_draft(draft: &BookingDraft) -> Result<Value, StoreError> {
    serde_json::to_value(draft).map_err(|e| StoreError::Rejected(e.to_string()))
}

/// Document store held in memory. Documents stay raw JSON; every read decodes.
pub struct InMemoryRemoteStore {
    documents: DashMap<String, Value>,
    feed: Arc<ChangeFeed>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            feed: Arc::new(ChangeFeed::new()),
        }
    }

    /// Store a document as-is, bypassing encoding. Used for seeding.
    pub fn insert_raw(&self, id: impl Into<String>, doc: Value) {
        self.documents.insert(id.into(), doc);
        self.publish();
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn get(&self, id: Ulid) -> Option<Result<Booking, StoreError>> {
        let key = id.to_string();
        self.documents.get(&key).map(|doc| decode_booking(&key, doc.value()))
    }

    fn decode_all(&self) -> Vec<Booking> {
        let mut out = Vec::with_capacity(self.documents.len());
        for entry in self.documents.iter() {
            match decode_booking(entry.key(), entry.value()) {
                Ok(b) => out.push(b),
                Err(e) => {
                    tracing::warn!("skipping document: {e}");
                    metrics::counter!(crate::observability::MALFORMED_DOCUMENTS_TOTAL).increment(1);
                }
            }
        }
        out.sort_by_key(|b| (b.draft.start, b.id));
        out
    }

    fn publish(&self) {
        if !self.feed.has_subscribers() {
            return;
        }
        self.feed.send(StoreEvent::Snapshot(Arc::new(self.decode_all())));
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn create(&self, draft: &BookingDraft) -> Result<Ulid, StoreError> {
        let id = Ulid::new();
        self.documents.insert(id.to_string(), encode_draft(draft)?);
        self.publish();
        Ok(id)
    }

    async fn update(&self, id: Ulid, draft: &BookingDraft) -> Result<(), StoreError> {
        let doc = encode_draft(draft)?;
        match self.documents.get_mut(&id.to_string()) {
            Some(mut existing) => *existing = doc,
            None => return Err(StoreError::NotFound(id)),
        }
        self.publish();
        Ok(())
    }

    async fn delete(&self, id: Ulid) -> Result<(), StoreError> {
        if self.documents.remove(&id.to_string()).is_some() {
            self.publish();
        }
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.decode_all())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.feed.subscribe()
    }
}
