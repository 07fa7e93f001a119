use std::collections::HashSet;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::conflict::{self, Slot};
use super::{Engine, buffer, window};

impl Engine {
    /// Open hours of `resource_id` on `date`; the salon's own when None.
    pub fn working_window(&self, resource_id: Option<Ulid>, date: NaiveDate) -> Option<Window> {
        let salon = self.deps.directory.salon_schedule();
        let schedule = resource_id.and_then(|id| self.deps.directory.schedule(id));
        window::resolve(schedule.as_ref(), &salon, date)
    }

    /// End of the booking plus the resource's turnover buffer.
    pub fn effective_end(&self, booking: &Booking) -> Ms {
        let schedule = self.deps.directory.schedule(booking.draft.resource_id);
        self.buffered_end(&booking.draft, booking.draft.end, schedule.as_ref())
    }

    fn buffered_end(
        &self,
        draft: &BookingDraft,
        end: Ms,
        schedule: Option<&ResourceSchedule>,
    ) -> Ms {
        let Some(schedule) = schedule else {
            return end;
        };
        match self.deps.catalog.service(draft.service_id) {
            Some(service) => buffer::effective_end_with_service(end, schedule, &service),
            None => buffer::effective_end(end, schedule, draft.service_id),
        }
    }

    /// Board entries as the sweep sees them, pending shifts applied.
    fn slots(&self, entries: &[BoardEntry]) -> Vec<Slot> {
        entries
            .iter()
            .map(|entry| {
                let draft = entry.draft();
                // The shift is relative to the ledger's original, not to the
                // board copy, which a commit or snapshot may already have moved.
                let span = entry
                    .booking_id()
                    .and_then(|id| self.ledger.get(id))
                    .map_or_else(|| draft.span(), |p| p.new_span());
                Slot {
                    id: entry.id(),
                    service_id: draft.service_id,
                    span,
                }
            })
            .collect()
    }

    /// Entries overlapping another exclusive-service booking on the same day.
    pub fn conflicts(&self) -> HashSet<EntryId> {
        let slots = self.slots(&self.board.snapshot());
        conflict::detect(&slots, |id| self.deps.catalog.is_exclusive(id), self.tz)
    }

    /// The day as it would be rendered: one section per known resource.
    pub fn agenda(&self, date: NaiveDate) -> Vec<ResourceAgenda> {
        let entries = self.board.snapshot();
        let slots = self.slots(&entries);
        let conflicting =
            conflict::detect(&slots, |id| self.deps.catalog.is_exclusive(id), self.tz);
        let salon = self.deps.directory.salon_schedule();

        self.deps
            .directory
            .resource_ids()
            .into_iter()
            .map(|resource_id| {
                let schedule = self.deps.directory.schedule(resource_id);
                let open = window::resolve(schedule.as_ref(), &salon, date);
                let mut lines: Vec<AgendaLine> = entries
                    .iter()
                    .zip(&slots)
                    .filter(|(entry, slot)| {
                        entry.draft().resource_id == resource_id
                            && local_date(slot.span.start, self.tz) == Some(date)
                    })
                    .map(|(entry, slot)| AgendaLine {
                        id: slot.id,
                        service_id: slot.service_id,
                        span: slot.span,
                        effective_end: self.buffered_end(
                            entry.draft(),
                            slot.span.end,
                            schedule.as_ref(),
                        ),
                        tentative: entry.is_tentative(),
                        pending_delta_minutes: entry
                            .booking_id()
                            .and_then(|id| self.ledger.get(id))
                            .map(|p| p.delta_minutes),
                        conflicting: conflicting.contains(&slot.id),
                        out_of_hours: !open
                            .is_some_and(|w| window::within(&w, date, self.tz, &slot.span)),
                    })
                    .collect();
                lines.sort_by_key(|l| (l.span.start, l.id));
                ResourceAgenda {
                    resource_id,
                    window: open,
                    lines,
                }
            })
            .collect()
    }
}
