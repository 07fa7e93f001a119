use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use chrono_tz::Tz;
use ulid::Ulid;

use crate::model::*;

/// A booking as the conflict sweep sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: EntryId,
    pub service_id: Ulid,
    pub span: Span,
}

/// Every overlapping pair of exclusive-service slots on the same local day.
/// Each pair is reported once, earlier start first.
pub fn conflicting_pairs<F>(slots: &[Slot], is_exclusive: F, tz: Tz) -> Vec<(EntryId, EntryId)>
where
    F: Fn(Ulid) -> bool,
{
    let mut by_day: BTreeMap<NaiveDate, Vec<&Slot>> = BTreeMap::new();
    for slot in slots {
        if !is_exclusive(slot.service_id) {
            continue;
        }
        let Some(day) = local_date(slot.span.start, tz) else {
            continue;
        };
        by_day.entry(day).or_default().push(slot);
    }

    let mut pairs = Vec::new();
    for day in by_day.values_mut() {
        day.sort_by_key(|s| (s.span.start, s.id));
        for i in 0..day.len() {
            for j in (i + 1)..day.len() {
                // Sorted by start: nothing further right can reach back into `i`.
                if day[j].span.start >= day[i].span.end {
                    break;
                }
                if day[i].id != day[j].id && day[i].span.overlaps(&day[j].span) {
                    pairs.push((day[i].id, day[j].id));
                }
            }
        }
    }
    pairs
}

/// Ids of every slot that overlaps another exclusive slot on its day.
pub fn detect<F>(slots: &[Slot], is_exclusive: F, tz: Tz) -> HashSet<EntryId>
where
    F: Fn(Ulid) -> bool,
{
    conflicting_pairs(slots, is_exclusive, tz)
        .into_iter()
        .flat_map(|(a, b)| [a, b])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = 3_600_000;
    const M: Ms = MINUTE_MS;

    fn midnight(y: i32, m: u32, d: u32) -> Ms {
        local_instant(NaiveDate::from_ymd_opt(y, m, d).unwrap(), 0, Tz::UTC).unwrap()
    }

    fn slot(service_id: Ulid, start: Ms, end: Ms) -> Slot {
        Slot {
            id: EntryId::Booking(Ulid::new()),
            service_id,
            span: Span::new(start, end),
        }
    }

    struct Services {
        pedicure: Ulid,
        haircut: Ulid,
    }

    impl Services {
        fn new() -> Self {
            Self {
                pedicure: Ulid::new(),
                haircut: Ulid::new(),
            }
        }

        fn exclusive(&self) -> impl Fn(Ulid) -> bool + '_ {
            move |id| id == self.pedicure
        }
    }

    #[test]
    fn overlapping_exclusive_bookings_flagged_non_exclusive_ignored() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        let a = slot(svc.pedicure, d + 9 * H, d + 10 * H + 10 * M);
        let b = slot(svc.pedicure, d + 9 * H + 30 * M, d + 10 * H + 45 * M);
        let c = slot(svc.haircut, d + 9 * H, d + 11 * H);

        let flagged = detect(&[a, b, c], svc.exclusive(), Tz::UTC);
        assert_eq!(flagged, HashSet::from([a.id, b.id]));
    }

    #[test]
    fn conflicts_are_symmetric_and_never_self() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        let a = slot(svc.pedicure, d + 9 * H, d + 10 * H);
        let b = slot(svc.pedicure, d + 9 * H + 15 * M, d + 9 * H + 45 * M);

        let forward = conflicting_pairs(&[a, b], svc.exclusive(), Tz::UTC);
        let backward = conflicting_pairs(&[b, a], svc.exclusive(), Tz::UTC);
        assert_eq!(forward, backward);
        assert_eq!(forward, vec![(a.id, b.id)]);
        assert!(forward.iter().all(|(x, y)| x != y));

        let alone = detect(&[a], svc.exclusive(), Tz::UTC);
        assert!(alone.is_empty());
    }

    #[test]
    fn two_non_exclusive_overlaps_never_flagged() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        let a = slot(svc.haircut, d + 9 * H, d + 10 * H);
        let b = slot(svc.haircut, d + 9 * H, d + 10 * H);
        assert!(detect(&[a, b], svc.exclusive(), Tz::UTC).is_empty());
    }

    #[test]
    fn adjacent_bookings_do_not_conflict() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        let a = slot(svc.pedicure, d + 9 * H, d + 10 * H);
        let b = slot(svc.pedicure, d + 10 * H, d + 11 * H);
        assert!(detect(&[a, b], svc.exclusive(), Tz::UTC).is_empty());
    }

    #[test]
    fn equal_starts_conflict() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        let a = slot(svc.pedicure, d + 9 * H, d + 9 * H + 30 * M);
        let b = slot(svc.pedicure, d + 9 * H, d + 10 * H);
        assert_eq!(detect(&[a, b], svc.exclusive(), Tz::UTC).len(), 2);
    }

    #[test]
    fn every_member_of_every_pair_is_flagged() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        // b overlaps both a and c; a and c do not overlap each other.
        let a = slot(svc.pedicure, d + 9 * H, d + 10 * H);
        let b = slot(svc.pedicure, d + 9 * H + 30 * M, d + 11 * H);
        let c = slot(svc.pedicure, d + 10 * H + 30 * M, d + 12 * H);
        let pairs = conflicting_pairs(&[a, b, c], svc.exclusive(), Tz::UTC);
        assert_eq!(pairs.len(), 2);
        assert_eq!(
            detect(&[a, b, c], svc.exclusive(), Tz::UTC),
            HashSet::from([a.id, b.id, c.id])
        );
    }

    #[test]
    fn no_cross_day_comparison() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        // Late booking runs past midnight; the next one starts on the next day.
        let late = slot(svc.pedicure, d + 23 * H, d + 24 * H + 30 * M);
        let early = slot(svc.pedicure, d + 24 * H, d + 25 * H);
        assert!(detect(&[late, early], svc.exclusive(), Tz::UTC).is_empty());
    }

    #[test]
    fn day_buckets_follow_time_zone() {
        let svc = Services::new();
        let d = midnight(2026, 3, 2);
        // 22:30 and 23:30 UTC: same UTC day, but Berlin puts the second on March 3rd.
        let a = slot(svc.pedicure, d + 22 * H + 30 * M, d + 23 * H + 45 * M);
        let b = slot(svc.pedicure, d + 23 * H + 30 * M, d + 24 * H + 30 * M);
        assert_eq!(detect(&[a, b], svc.exclusive(), Tz::UTC).len(), 2);
        assert!(detect(&[a, b], svc.exclusive(), chrono_tz::Europe::Berlin).is_empty());
    }
}
