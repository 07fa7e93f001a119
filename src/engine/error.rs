use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No pending change or board entry for this booking.
    NotFound(Ulid),
    /// The store rejected a create, update, or delete.
    RemoteWrite(String),
    /// Malformed input caught before any remote call.
    Validation(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::RemoteWrite(e) => write!(f, "remote write failed: {e}"),
            EngineError::Validation(msg) => write!(f, "invalid booking: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::RemoteWrite(e.to_string())
    }
}

/// External calendar sync failure. Logged, never returned to a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWarning {
    pub op: &'static str,
    pub booking_id: Ulid,
    pub message: String,
}

impl std::fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "calendar {} for booking {} failed: {}",
            self.op, self.booking_id, self.message
        )
    }
}
