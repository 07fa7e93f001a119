use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only instant type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Same duration, moved by `minutes`. None if either end leaves the `Ms` range.
    pub fn checked_shift(&self, minutes: i64) -> Option<Span> {
        let delta = minutes.checked_mul(MINUTE_MS)?;
        Some(Span {
            start: self.start.checked_add(delta)?,
            end: self.end.checked_add(delta)?,
        })
    }

    /// Same duration, moved by `minutes`, saturating at the `Ms` range.
    pub fn shifted_minutes(&self, minutes: i64) -> Span {
        let delta = minutes.saturating_mul(MINUTE_MS);
        Span {
            start: self.start.saturating_add(delta),
            end: self.end.saturating_add(delta),
        }
    }
}

/// Calendar date of an instant in the salon's time zone.
pub fn local_date(t: Ms, tz: Tz) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(t).map(|dt| dt.with_timezone(&tz).date_naive())
}

/// Instant of a wall-clock minute offset on `date`. Ambiguous local times
/// resolve to the earliest instant; nonexistent ones (DST gap) yield None.
pub fn local_instant(date: NaiveDate, minutes: u32, tz: Tz) -> Option<Ms> {
    let wall: NaiveDateTime =
        date.and_time(NaiveTime::MIN) + TimeDelta::minutes(i64::from(minutes));
    tz.from_local_datetime(&wall)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Confirmed,
    Pending,
    NoShow,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Pending => "pending",
            BookingStatus::NoShow => "no-show",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// Every field of a booking except its id. This is the complete payload the
/// store receives on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub resource_id: Ulid,
    pub service_id: Ulid,
    pub client_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub price_cents: u64,
    /// Event id in the external calendar, once synced.
    pub external_ref: Option<String>,
}

impl BookingDraft {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn with_id(self, id: Ulid) -> Booking {
        Booking { id, draft: self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    #[serde(flatten)]
    pub draft: BookingDraft,
}

impl Booking {
    pub fn span(&self) -> Span {
        self.draft.span()
    }
}

/// Field-level edit. Applied in place on the board, then sent as a full draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPatch {
    pub resource_id: Option<Ulid>,
    pub service_id: Option<Ulid>,
    pub client_id: Option<Ulid>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
    pub status: Option<BookingStatus>,
    pub notes: Option<String>,
    pub price_cents: Option<u64>,
}

impl BookingPatch {
    pub fn apply(&self, draft: &mut BookingDraft) {
        if let Some(v) = self.resource_id {
            draft.resource_id = v;
        }
        if let Some(v) = self.service_id {
            draft.service_id = v;
        }
        if let Some(v) = self.client_id {
            draft.client_id = v;
        }
        if let Some(v) = self.start {
            draft.start = v;
        }
        if let Some(v) = self.end {
            draft.end = v;
        }
        if let Some(v) = self.status {
            draft.status = v;
        }
        if let Some(ref v) = self.notes {
            draft.notes = Some(v.clone());
        }
        if let Some(v) = self.price_cents {
            draft.price_cents = v;
        }
    }
}

// ── Catalog and schedules ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
    /// Member of the no-parallel class: may not overlap another exclusive booking.
    #[serde(default)]
    pub exclusive: bool,
    /// Minutes of turnover after the service, when the service defines one.
    #[serde(default)]
    pub buffer_after: Option<i64>,
}

/// Open interval in minutes after local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start_minutes: u32,
    pub end_minutes: u32,
}

impl Window {
    pub fn new(start_minutes: u32, end_minutes: u32) -> Self {
        Self {
            start_minutes,
            end_minutes,
        }
    }

    pub fn is_open(&self) -> bool {
        self.start_minutes < self.end_minutes
    }

    /// The window's instants on `date`. None when closed or not representable.
    pub fn span_on(&self, date: NaiveDate, tz: Tz) -> Option<Span> {
        if !self.is_open() {
            return None;
        }
        let start = local_instant(date, self.start_minutes, tz)?;
        let end = local_instant(date, self.end_minutes, tz)?;
        (start < end).then(|| Span::new(start, end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    #[serde(default = "default_active")]
    pub active: bool,
    pub start_minutes: u32,
    pub end_minutes: u32,
}

fn default_active() -> bool {
    true
}

impl DaySchedule {
    pub fn window(&self) -> Window {
        Window::new(self.start_minutes, self.end_minutes)
    }
}

/// A staff member's hours and buffer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchedule {
    pub resource_id: Ulid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub weekdays: HashMap<Weekday, DaySchedule>,
    /// `None` marks the date closed.
    #[serde(default)]
    pub date_overrides: HashMap<NaiveDate, Option<Window>>,
    /// Minutes of buffer per service id.
    #[serde(default)]
    pub personal_buffers: HashMap<Ulid, i64>,
    #[serde(default)]
    pub default_buffer: Option<i64>,
}

impl ResourceSchedule {
    pub fn new(resource_id: Ulid) -> Self {
        Self {
            resource_id,
            name: None,
            weekdays: HashMap::new(),
            date_overrides: HashMap::new(),
            personal_buffers: HashMap::new(),
            default_buffer: None,
        }
    }
}

/// Salon-wide defaults that apply when a resource has no entry of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalonSchedule {
    #[serde(default)]
    pub weekdays: HashMap<Weekday, DaySchedule>,
    #[serde(default)]
    pub date_overrides: HashMap<NaiveDate, Option<Window>>,
}

// ── Local edit state ─────────────────────────────────────────────

/// Uncommitted time shift of a confirmed booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub booking_id: Ulid,
    pub delta_minutes: i64,
    /// The booking as it was when the first delta arrived.
    pub original: BookingDraft,
}

impl PendingChange {
    pub fn new_span(&self) -> Span {
        self.original.span().shifted_minutes(self.delta_minutes)
    }

    pub fn new_start(&self) -> Ms {
        self.new_span().start
    }

    pub fn new_end(&self) -> Ms {
        self.new_span().end
    }

    /// Complete payload with the shifted times.
    pub fn payload(&self) -> BookingDraft {
        let span = self.new_span();
        BookingDraft {
            start: span.start,
            end: span.end,
            ..self.original.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryId {
    /// Assigned locally before the store has acknowledged a create.
    Temp(Ulid),
    Booking(Ulid),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Temp(id) => write!(f, "tmp:{id}"),
            EntryId::Booking(id) => write!(f, "{id}"),
        }
    }
}

/// One booking as the board shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEntry {
    Creating { temp_id: Ulid, draft: BookingDraft },
    Confirmed(Booking),
    /// Edited locally; the store has not accepted the edit yet.
    Updating(Booking),
}

impl BoardEntry {
    pub fn id(&self) -> EntryId {
        match self {
            BoardEntry::Creating { temp_id, .. } => EntryId::Temp(*temp_id),
            BoardEntry::Confirmed(b) | BoardEntry::Updating(b) => EntryId::Booking(b.id),
        }
    }

    pub fn booking_id(&self) -> Option<Ulid> {
        match self {
            BoardEntry::Creating { .. } => None,
            BoardEntry::Confirmed(b) | BoardEntry::Updating(b) => Some(b.id),
        }
    }

    pub fn draft(&self) -> &BookingDraft {
        match self {
            BoardEntry::Creating { draft, .. } => draft,
            BoardEntry::Confirmed(b) | BoardEntry::Updating(b) => &b.draft,
        }
    }

    pub fn is_tentative(&self) -> bool {
        !matches!(self, BoardEntry::Confirmed(_))
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaLine {
    pub id: EntryId,
    pub service_id: Ulid,
    /// Start and end after any pending ledger shift.
    pub span: Span,
    pub effective_end: Ms,
    pub tentative: bool,
    pub pending_delta_minutes: Option<i64>,
    pub conflicting: bool,
    pub out_of_hours: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAgenda {
    pub resource_id: Ulid,
    pub window: Option<Window>,
    pub lines: Vec<AgendaLine>,
}
