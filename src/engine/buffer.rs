use ulid::Ulid;

use crate::model::*;

/// Turnover minutes after a booking of `service_id`: the resource's personal
/// override for the service, else its default, else zero. Negative values
/// count as zero.
pub fn buffer_minutes(resource: &ResourceSchedule, service_id: Ulid) -> i64 {
    resource
        .personal_buffers
        .get(&service_id)
        .copied()
        .or(resource.default_buffer)
        .unwrap_or(0)
        .max(0)
}

pub fn effective_end(base_end: Ms, resource: &ResourceSchedule, service_id: Ulid) -> Ms {
    base_end + buffer_minutes(resource, service_id) * MINUTE_MS
}

/// Like `effective_end`, but a service's own `buffer_after` sits between the
/// personal override and the resource default.
pub fn effective_end_with_service(
    base_end: Ms,
    resource: &ResourceSchedule,
    service: &ServiceDefinition,
) -> Ms {
    let minutes = resource
        .personal_buffers
        .get(&service.id)
        .copied()
        .or(service.buffer_after)
        .or(resource.default_buffer)
        .unwrap_or(0)
        .max(0);
    base_end + minutes * MINUTE_MS
}
