use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;

use crate::model::*;

// ── Working window resolution ─────────────────────────────────────

/// Open hours for a resource on `date`, or the salon's when `resource` is None.
///
/// Date overrides win outright (the resource's, then the salon's), then the
/// resource's own active weekday entry, then the salon's active weekday entry.
/// An override of `None` closes the day. A window whose start is not before
/// its end counts as closed.
pub fn resolve(
    resource: Option<&ResourceSchedule>,
    salon: &SalonSchedule,
    date: NaiveDate,
) -> Option<Window> {
    let resolved = if let Some(over) = resource.and_then(|r| r.date_overrides.get(&date)) {
        *over
    } else if let Some(over) = salon.date_overrides.get(&date) {
        *over
    } else {
        let weekday = date.weekday();
        resource
            .and_then(|r| r.weekdays.get(&weekday))
            .filter(|d| d.active)
            .or_else(|| salon.weekdays.get(&weekday).filter(|d| d.active))
            .map(DaySchedule::window)
    };
    resolved.filter(Window::is_open)
}

/// True if `span` lies wholly inside `window` on `date`.
pub fn within(window: &Window, date: NaiveDate, tz: Tz, span: &Span) -> bool {
    window
        .span_on(date, tz)
        .is_some_and(|open| open.contains_span(span))
}
