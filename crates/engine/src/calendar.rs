use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::model::{Resource, WorkSegment};

// ---------------------------------------------------------------------------
// Committed interval tracking
// ---------------------------------------------------------------------------

/// A single committed interval on a resource calendar.
#[derive(Debug, Clone)]
struct Reservation {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

/// A candidate placement on one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPlan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub segments: Vec<WorkSegment>,
}

/// Per-resource calendar for one run: committed intervals, work minutes
/// used per calendar day, and the resource's weekly availability.
#[derive(Debug)]
pub struct ResourceCalendar {
    daily_capacity_mins: i64,
    /// Weekday (0 = Monday) -> sorted, merged (start_min, end_min) windows.
    weekly: Option<[Vec<(i64, i64)>; 7]>,
    reservations: Vec<Reservation>,
    daily_used: BTreeMap<NaiveDate, i64>,
    committed_mins: i64,
}

const MINUTES_PER_DAY: i64 = 24 * 60;

impl ResourceCalendar {
    pub fn new(resource: &Resource) -> Self {
        let daily_capacity_mins =
            ((resource.capacity_hours_per_day * 60.0).round() as i64).clamp(0, MINUTES_PER_DAY);

        let weekly = if resource.availability.is_empty() {
            None
        } else {
            let mut days: [Vec<(i64, i64)>; 7] = Default::default();
            for w in &resource.availability {
                let day = w.weekday.num_days_from_monday() as usize;
                days[day].push((w.start_hour as i64 * 60, w.end_hour.min(24) as i64 * 60));
            }
            for windows in days.iter_mut() {
                windows.sort_unstable();
                *windows = merge_windows(windows);
            }
            Some(days)
        };

        Self {
            daily_capacity_mins,
            weekly,
            reservations: Vec::new(),
            daily_used: BTreeMap::new(),
            committed_mins: 0,
        }
    }

    /// Work minutes committed on this resource during the current run.
    pub fn committed_minutes(&self) -> i64 {
        self.committed_mins
    }

    /// Work minutes this resource can supply from `from` through the end of
    /// `last_day`: per calendar day, the open window time at or after `from`,
    /// capped at the daily capacity.
    pub fn capacity_minutes(&self, from: NaiveDateTime, last_day: NaiveDate) -> i64 {
        let mut total = 0;
        let mut date = from.date();
        while date <= last_day {
            let open: i64 = self
                .windows_on(date)
                .iter()
                .map(|&(s, e)| (e - s.max(from)).num_minutes().max(0))
                .sum();
            total += open.min(self.daily_capacity_mins);
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        total
    }

    fn windows_on(&self, date: NaiveDate) -> Vec<(NaiveDateTime, NaiveDateTime)> {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        match &self.weekly {
            None => vec![(midnight, midnight + Duration::days(1))],
            Some(days) => days[date.weekday().num_days_from_monday() as usize]
                .iter()
                .map(|&(s, e)| (midnight + Duration::minutes(s), midnight + Duration::minutes(e)))
                .collect(),
        }
    }

    /// Lay out `work_mins` of work starting no earlier than `from`, filling
    /// availability windows up to the remaining daily capacity. Returns
    /// `None` if the work cannot finish before `horizon_end`.
    fn lay_out(
        &self,
        from: NaiveDateTime,
        work_mins: i64,
        horizon_end: NaiveDateTime,
    ) -> Option<Vec<WorkSegment>> {
        let mut remaining = work_mins;
        let mut cursor = from;
        let mut segments: Vec<WorkSegment> = Vec::new();
        let mut date = from.date();

        while date <= horizon_end.date() {
            let mut day_left = self.daily_capacity_mins
                - self.daily_used.get(&date).copied().unwrap_or(0);

            for (win_start, win_end) in self.windows_on(date) {
                if day_left <= 0 {
                    break;
                }
                let seg_start = win_start.max(cursor);
                if seg_start >= win_end {
                    continue;
                }
                let open = (win_end - seg_start).num_minutes().min(day_left);
                let take = open.min(remaining);
                let seg_end = seg_start + Duration::minutes(take);
                if seg_end > horizon_end {
                    return None;
                }
                segments.push(WorkSegment {
                    start: seg_start,
                    end: seg_end,
                });
                day_left -= take;
                remaining -= take;
                cursor = seg_end;
                if remaining == 0 {
                    return Some(segments);
                }
            }

            date = date.succ_opt()?;
            cursor = cursor.max(date.and_time(chrono::NaiveTime::MIN));
        }
        None
    }

    fn overlaps_committed(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.reservations
            .iter()
            .any(|r| r.start < end && r.end > start)
    }

    /// Earliest placement of `work_mins` starting at or after `earliest`
    /// whose whole [start, end) span is free of committed intervals.
    ///
    /// Candidate starts are `earliest` plus every committed end at or after
    /// it, tried in ascending order.
    pub fn earliest_slot(
        &self,
        earliest: NaiveDateTime,
        work_mins: i64,
        horizon_end: NaiveDateTime,
    ) -> Option<SlotPlan> {
        let mut candidates: Vec<NaiveDateTime> = vec![earliest];
        candidates.extend(
            self.reservations
                .iter()
                .filter(|r| r.end >= earliest)
                .map(|r| r.end),
        );
        candidates.sort_unstable();
        candidates.dedup();

        for t in candidates {
            let Some(segments) = self.lay_out(t, work_mins, horizon_end) else {
                // Later candidates only have less room before the horizon.
                return None;
            };
            let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
                continue;
            };
            let (start, end) = (first.start, last.end);
            if !self.overlaps_committed(start, end) {
                return Some(SlotPlan {
                    start,
                    end,
                    segments,
                });
            }
        }
        None
    }

    /// Commit a plan returned by `earliest_slot`.
    pub fn reserve(&mut self, plan: &SlotPlan) {
        self.reservations.push(Reservation {
            start: plan.start,
            end: plan.end,
        });
        self.reservations.sort_by_key(|r| r.start);
        for seg in &plan.segments {
            let mins = (seg.end - seg.start).num_minutes();
            *self.daily_used.entry(seg.start.date()).or_insert(0) += mins;
            self.committed_mins += mins;
        }
    }
}

fn merge_windows(sorted: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(sorted.len());
    for &(s, e) in sorted {
        match merged.last_mut() {
            Some(last) if s <= last.1 => last.1 = last.1.max(e),
            _ => merged.push((s, e)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AvailabilityWindow, ResourceType};
    use chrono::Weekday;

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        // 2026-03-02 is a Monday.
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn make_resource(capacity: f64, availability: Vec<AvailabilityWindow>) -> Resource {
        Resource {
            id: "r".to_string(),
            name: "r".to_string(),
            resource_type: ResourceType::Machine,
            skills: Default::default(),
            capacity_hours_per_day: capacity,
            availability,
            current_utilization: 0.0,
            efficiency_rating: 1.0,
        }
    }

    fn horizon() -> NaiveDateTime {
        monday(0, 0) + Duration::days(30)
    }

    #[test]
    fn test_back_to_back_on_empty_calendar() {
        let mut cal = ResourceCalendar::new(&make_resource(8.0, vec![]));
        let a = cal.earliest_slot(monday(8, 0), 120, horizon()).unwrap();
        assert_eq!((a.start, a.end), (monday(8, 0), monday(10, 0)));
        cal.reserve(&a);

        let b = cal.earliest_slot(monday(8, 0), 360, horizon()).unwrap();
        assert_eq!((b.start, b.end), (monday(10, 0), monday(16, 0)));
        assert_eq!(b.segments.len(), 1);
    }

    #[test]
    fn test_daily_capacity_splits_across_days() {
        let mut cal = ResourceCalendar::new(&make_resource(8.0, vec![]));
        let a = cal.earliest_slot(monday(8, 0), 6 * 60, horizon()).unwrap();
        cal.reserve(&a);
        // 2h left on Monday, rest continues Tuesday from midnight.
        let b = cal.earliest_slot(monday(8, 0), 4 * 60, horizon()).unwrap();
        assert_eq!(b.start, monday(14, 0));
        assert_eq!(b.end, monday(2, 0) + Duration::days(1));
        assert_eq!(b.segments.len(), 2);
        cal.reserve(&b);
        assert_eq!(cal.committed_minutes(), 600);
    }

    #[test]
    fn test_windows_restrict_working_hours() {
        let windows = [Weekday::Mon, Weekday::Tue]
            .into_iter()
            .map(|weekday| AvailabilityWindow {
                weekday,
                start_hour: 9,
                end_hour: 17,
            })
            .collect();
        let cal = ResourceCalendar::new(&make_resource(8.0, windows));
        let plan = cal.earliest_slot(monday(15, 0), 5 * 60, horizon()).unwrap();
        assert_eq!(plan.start, monday(15, 0));
        assert_eq!(plan.end, monday(12, 0) + Duration::days(1));
        assert_eq!(
            plan.segments,
            vec![
                WorkSegment {
                    start: monday(15, 0),
                    end: monday(17, 0)
                },
                WorkSegment {
                    start: monday(9, 0) + Duration::days(1),
                    end: monday(12, 0) + Duration::days(1)
                },
            ]
        );
    }

    #[test]
    fn test_fills_gap_before_later_reservation() {
        let mut cal = ResourceCalendar::new(&make_resource(24.0, vec![]));
        let late = SlotPlan {
            start: monday(12, 0),
            end: monday(14, 0),
            segments: vec![WorkSegment {
                start: monday(12, 0),
                end: monday(14, 0),
            }],
        };
        cal.reserve(&late);
        let fits = cal.earliest_slot(monday(8, 0), 180, horizon()).unwrap();
        assert_eq!(fits.start, monday(8, 0));
        let too_long = cal.earliest_slot(monday(8, 0), 300, horizon()).unwrap();
        assert_eq!(too_long.start, monday(14, 0));
    }

    #[test]
    fn test_capacity_minutes_per_calendar_day() {
        let tuesday = monday(0, 0).date().succ_opt().unwrap();
        let open = ResourceCalendar::new(&make_resource(8.0, vec![]));
        // Monday from 08:00 still has 16 open hours, so both days give 8h.
        assert_eq!(open.capacity_minutes(monday(8, 0), tuesday), 16 * 60);
        // Starting late on Monday leaves only 2h of that day.
        assert_eq!(open.capacity_minutes(monday(22, 0), tuesday), 10 * 60);

        let windows = vec![AvailabilityWindow {
            weekday: Weekday::Mon,
            start_hour: 9,
            end_hour: 12,
        }];
        let short = ResourceCalendar::new(&make_resource(8.0, windows));
        assert_eq!(short.capacity_minutes(monday(8, 0), tuesday), 3 * 60);
    }

    #[test]
    fn test_no_slot_inside_horizon() {
        let windows = vec![AvailabilityWindow {
            weekday: Weekday::Sun,
            start_hour: 10,
            end_hour: 11,
        }];
        let cal = ResourceCalendar::new(&make_resource(1.0, windows));
        assert!(cal
            .earliest_slot(monday(8, 0), 120, monday(0, 0) + Duration::days(7))
            .is_none());
    }
}
