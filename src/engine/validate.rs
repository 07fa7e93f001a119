use crate::directory::{ResourceDirectory, ServiceCatalog};
use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Reject a draft before it reaches the store. Pure: no state is touched.
pub(crate) fn validate_draft(
    draft: &BookingDraft,
    directory: &dyn ResourceDirectory,
    catalog: &dyn ServiceCatalog,
) -> Result<(), EngineError> {
    if draft.start >= draft.end {
        return Err(EngineError::Validation("start must be before end".into()));
    }
    if draft.end - draft.start > MAX_BOOKING_DURATION_MS {
        return Err(EngineError::Validation("booking longer than a day".into()));
    }
    if let Some(ref n) = draft.notes
        && n.len() > MAX_NOTES_LEN
    {
        return Err(EngineError::Validation("notes too long".into()));
    }
    if directory.schedule(draft.resource_id).is_none() {
        return Err(EngineError::Validation(format!(
            "unknown resource {}",
            draft.resource_id
        )));
    }
    if catalog.service(draft.service_id).is_none() {
        return Err(EngineError::Validation(format!(
            "unknown service {}",
            draft.service_id
        )));
    }
    Ok(())
}
