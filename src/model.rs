//! Business hour and agent records
//!
//! A business hour is a named weekly availability window: at most one
//! `{start, finish}` pair per weekday, in the window's own local wall-clock,
//! plus the fixed UTC offset that anchors it. Agents carry the set of
//! business hour ids they are scheduled under; their livechat status is
//! derived from which of those are currently open.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{HoursError, Result};
use crate::week::{to_utc_day_minute, to_utc_minute, weekday_name, TimeOfDay, UtcOffset, WeekTime};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessHourId(String);

impl BusinessHourId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessHourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BusinessHourId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One weekday's `{start, finish}` pair within a business hour.
/// Finish is same-day: overnight windows are not modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHour {
    #[serde(with = "crate::week::weekday_names")]
    pub day: Weekday,
    pub start: TimeOfDay,
    pub finish: TimeOfDay,
}

impl WorkHour {
    /// Whether `now` falls inside this entry once start and finish are
    /// shifted to UTC-referenced minute-of-day. Boundaries are inclusive on
    /// both ends.
    ///
    /// The shift stays in this entry's declared weekday bucket: a window
    /// pushed across midnight by its offset is not rolled into the adjacent
    /// day, and a converted finish that lands before the converted start
    /// matches nothing that day. Existing configured data may rely on this,
    /// so it is preserved rather than fixed.
    pub fn contains(&self, now: WeekTime, offset: UtcOffset) -> bool {
        if self.day != now.day() {
            return false;
        }
        let start = to_utc_minute(self.start, offset);
        let finish = to_utc_minute(self.finish, offset);
        start <= now.minute_of_day() && now.minute_of_day() <= finish
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timezone {
    pub name: String,
    #[serde(rename = "utcOffsetHours")]
    pub utc_offset: UtcOffset,
}

impl Timezone {
    pub fn fixed(name: impl Into<String>, utc_offset: UtcOffset) -> Self {
        Self {
            name: name.into(),
            utc_offset,
        }
    }

    /// Resolve an IANA zone to its fixed offset at the given instant.
    /// Seed tooling and tests think in zone names; records store the offset.
    pub fn named(tz: chrono_tz::Tz, at: DateTime<Utc>) -> Self {
        use chrono::{Offset, TimeZone};
        let seconds = tz
            .offset_from_utc_datetime(&at.naive_utc())
            .fix()
            .local_minus_utc();
        Self {
            name: tz.name().to_string(),
            utc_offset: UtcOffset::from_minutes((seconds / 60) as i16),
        }
    }
}

/// A named weekly availability window with its own timezone offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessHour {
    pub id: BusinessHourId,
    pub name: String,
    pub active: bool,
    pub work_hours: Vec<WorkHour>,
    pub timezone: Timezone,
    /// Stored open/closed flag maintained by the trigger bookkeeping.
    /// Reconciliation recomputes the open set from scratch and never reads it.
    #[serde(default)]
    pub open: bool,
}

impl BusinessHour {
    /// Whether this business hour must be open at `now`.
    /// Inactive records are never open; entries for `now`'s weekday are
    /// evaluated independently and unioned.
    pub fn is_open_at(&self, now: WeekTime) -> bool {
        self.active
            && self
                .work_hours
                .iter()
                .any(|entry| entry.contains(now, self.timezone.utc_offset))
    }

    /// Validate the definition. Collects every failure so a caller sees the
    /// whole list at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.id.as_str().trim().is_empty() {
            errors.push("id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }

        let mut seen_days: BTreeSet<u32> = BTreeSet::new();
        for entry in &self.work_hours {
            if entry.finish < entry.start {
                errors.push(format!(
                    "{}: finish {} before start {}",
                    weekday_name(entry.day),
                    entry.finish,
                    entry.start
                ));
            }
            if !seen_days.insert(entry.day.num_days_from_monday()) {
                errors.push(format!(
                    "more than one window for {}",
                    weekday_name(entry.day)
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HoursError::Validation(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivechatStatus {
    /// Permitted to be available until a status pass says otherwise
    #[default]
    Available,
    Unavailable,
}

/// The slice of a support user this crate cares about. Agent identities are
/// created and deleted by an external user-management system; here they are
/// only read and their business-hour fields updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    /// Business hours the agent is scheduled under; empty = not governed
    #[serde(default)]
    pub business_hour_ids: BTreeSet<BusinessHourId>,
    /// Which of those are currently open (repository bookkeeping)
    #[serde(default)]
    pub open_business_hour_ids: BTreeSet<BusinessHourId>,
    #[serde(default)]
    pub livechat_status: LivechatStatus,
}

impl Agent {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            business_hour_ids: BTreeSet::new(),
            open_business_hour_ids: BTreeSet::new(),
            livechat_status: LivechatStatus::default(),
        }
    }

    pub fn assigned_to(mut self, id: impl Into<BusinessHourId>) -> Self {
        self.business_hour_ids.insert(id.into());
        self
    }

    /// Permitted to be available: unconstrained, or inside at least one of
    /// its assigned windows.
    pub fn within_business_hours(&self) -> bool {
        self.business_hour_ids.is_empty() || !self.open_business_hour_ids.is_empty()
    }
}

/// One open/close boundary in local declared terms plus the offset: the
/// contract the external scheduler uses to know which UTC ticks to register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledHour {
    #[serde(with = "crate::week::weekday_names")]
    pub day: Weekday,
    pub time: TimeOfDay,
    pub utc_offset: UtcOffset,
}

impl ScheduledHour {
    /// The real UTC `(weekday, time)` tick for this boundary, day carry
    /// included. Registration must fire at the true instant even when the
    /// matching algorithm keeps windows in their declared weekday bucket.
    pub fn fire_at_utc(&self) -> (Weekday, TimeOfDay) {
        let (day, minute) = to_utc_day_minute(self.day, self.time, self.utc_offset);
        (day, TimeOfDay::from_minute_of_day(minute))
    }
}

// Weekday itself has no ordering; order boundaries Monday-first so schedule
// queries are deterministic.
impl Ord for ScheduledHour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.day
            .num_days_from_monday()
            .cmp(&other.day.num_days_from_monday())
            .then(self.time.cmp(&other.time))
            .then(self.utc_offset.cmp(&other.utc_offset))
    }
}

impl PartialOrd for ScheduledHour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Distinct boundary tuples across all configured windows, sorted. Every
/// start and every finish contributes one tuple; duplicates collapse.
pub fn schedule_hours<'a>(hours: impl IntoIterator<Item = &'a BusinessHour>) -> Vec<ScheduledHour> {
    let mut boundaries: BTreeSet<ScheduledHour> = BTreeSet::new();
    for bh in hours {
        for entry in &bh.work_hours {
            boundaries.insert(ScheduledHour {
                day: entry.day,
                time: entry.start,
                utc_offset: bh.timezone.utc_offset,
            });
            boundaries.insert(ScheduledHour {
                day: entry.day,
                time: entry.finish,
                utc_offset: bh.timezone.utc_offset,
            });
        }
    }
    boundaries.into_iter().collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_day() -> impl Strategy<Value = Weekday> {
        prop_oneof![
            Just(Weekday::Mon),
            Just(Weekday::Tue),
            Just(Weekday::Wed),
            Just(Weekday::Thu),
            Just(Weekday::Fri),
            Just(Weekday::Sat),
            Just(Weekday::Sun),
        ]
    }

    fn any_time() -> impl Strategy<Value = TimeOfDay> {
        (0u8..24, 0u8..60).prop_map(|(h, m)| TimeOfDay::new(h, m).unwrap())
    }

    fn any_window() -> impl Strategy<Value = BusinessHour> {
        (
            any_day(),
            any_time(),
            any_time(),
            -14 * 60..=14 * 60i16,
            any::<bool>(),
        )
            .prop_map(|(day, a, b, offset_minutes, active)| {
                let (start, finish) = if a <= b { (a, b) } else { (b, a) };
                BusinessHour {
                    id: "bh".into(),
                    name: "desk".to_string(),
                    active,
                    work_hours: vec![WorkHour { day, start, finish }],
                    timezone: Timezone::fixed("Test", UtcOffset::from_minutes(offset_minutes)),
                    open: false,
                }
            })
    }

    proptest! {
        /// Open implies active and a declared entry for that weekday
        #[test]
        fn open_implies_active_and_declared_day(
            bh in any_window(),
            day in any_day(),
            now in any_time()
        ) {
            let now = WeekTime::new(day, now);
            if bh.is_open_at(now) {
                prop_assert!(bh.active);
                prop_assert!(bh.work_hours.iter().any(|w| w.day == day));
            }
        }

        /// With a zero offset, matching reduces to plain interval containment
        #[test]
        fn zero_offset_is_plain_containment(
            day in any_day(),
            a in any_time(),
            b in any_time(),
            now in any_time()
        ) {
            let (start, finish) = if a <= b { (a, b) } else { (b, a) };
            let entry = WorkHour { day, start, finish };
            let open = entry.contains(WeekTime::new(day, now), UtcOffset::UTC);
            prop_assert_eq!(open, start <= now && now <= finish);
        }

        /// Validation never panics, whatever the definition looks like
        #[test]
        fn validate_never_panics(bh in any_window()) {
            let _ = bh.validate();
        }

        /// Every schedule boundary came from some window's start or finish
        #[test]
        fn schedule_boundaries_are_grounded(windows in prop::collection::vec(any_window(), 0..5)) {
            let boundaries = schedule_hours(windows.iter());
            for boundary in &boundaries {
                let grounded = windows.iter().any(|bh| {
                    bh.timezone.utc_offset == boundary.utc_offset
                        && bh.work_hours.iter().any(|w| {
                            w.day == boundary.day
                                && (w.start == boundary.time || w.finish == boundary.time)
                        })
                });
                prop_assert!(grounded);
            }
        }
    }
}
