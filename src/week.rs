//! Week-anchored wall-clock arithmetic
//!
//! Value types for the matching algorithm: hour:minute of day, fixed UTC
//! offsets, and an instant reduced to `(weekday, minute-of-day)` in UTC.
//! Everything here is pure and synchronous; nothing reads the system clock.
//! Callers inject the instant.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::HoursError;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Widest real-world UTC offset is UTC+14 (Line Islands)
pub const MAX_OFFSET_HOURS: f64 = 14.0;

/// Full English weekday name, the form business hour records use on the wire
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(raw: &str) -> Result<Weekday, HoursError> {
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| HoursError::Validation(format!("unknown weekday name: {raw:?}")))
}

/// Serde adapter: weekdays as their full English names
pub mod weekday_names {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(super::weekday_name(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_weekday(&raw).map_err(serde::de::Error::custom)
    }
}

/// Wall-clock hour:minute without a date. Parsed from and serialized as
/// `"HH:mm"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, HoursError> {
        if hour >= 24 || minute >= 60 {
            return Err(HoursError::Validation(format!(
                "time of day out of range: {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// Invariant: `minute_of_day < MINUTES_PER_DAY`
    pub(crate) fn from_minute_of_day(minute_of_day: u16) -> Self {
        debug_assert!(minute_of_day < MINUTES_PER_DAY);
        Self {
            hour: (minute_of_day / 60) as u8,
            minute: (minute_of_day % 60) as u8,
        }
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn minute_of_day(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl FromStr for TimeOfDay {
    type Err = HoursError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| HoursError::Validation(format!("expected HH:mm, got {s:?}")))?;
        let hour: u8 = h
            .parse()
            .map_err(|_| HoursError::Validation(format!("bad hour in {s:?}")))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| HoursError::Validation(format!("bad minute in {s:?}")))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Fixed UTC offset in whole minutes. Serialized as a signed decimal hour
/// count (`-5`, `5.5`, ...), which is how business hour records carry it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcOffset {
    minutes: i16,
}

impl UtcOffset {
    pub const UTC: UtcOffset = UtcOffset { minutes: 0 };

    pub fn from_minutes(minutes: i16) -> Self {
        Self { minutes }
    }

    pub fn from_hours(hours: f64) -> Result<Self, HoursError> {
        if !hours.is_finite() || hours.abs() > MAX_OFFSET_HOURS {
            return Err(HoursError::Validation(format!(
                "UTC offset out of range: {hours}"
            )));
        }
        Ok(Self {
            minutes: (hours * 60.0).round() as i16,
        })
    }

    pub fn minutes(self) -> i16 {
        self.minutes
    }

    pub fn hours(self) -> f64 {
        self.minutes as f64 / 60.0
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let abs = self.minutes.unsigned_abs();
        write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
    }
}

impl Serialize for UtcOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.hours())
    }
}

impl<'de> Deserialize<'de> for UtcOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hours = f64::deserialize(deserializer)?;
        Self::from_hours(hours).map_err(serde::de::Error::custom)
    }
}

/// An instant reduced to `(weekday, minute-of-day)` in UTC: all the matching
/// algorithm is allowed to see of the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekTime {
    day: Weekday,
    minute_of_day: u16,
}

impl WeekTime {
    pub fn new(day: Weekday, time: TimeOfDay) -> Self {
        Self {
            day,
            minute_of_day: time.minute_of_day(),
        }
    }

    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self {
            day: at.weekday(),
            minute_of_day: (at.hour() * 60 + at.minute()) as u16,
        }
    }

    pub fn day(self) -> Weekday {
        self.day
    }

    pub fn minute_of_day(self) -> u16 {
        self.minute_of_day
    }
}

impl fmt::Display for WeekTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            weekday_name(self.day),
            TimeOfDay::from_minute_of_day(self.minute_of_day)
        )
    }
}

/// Shift a local wall-clock time to its UTC-referenced minute-of-day.
/// Local = UTC + offset, so this subtracts the offset and wraps modulo 24h;
/// the caller decides what weekday bucket the result belongs to.
pub fn to_utc_minute(local: TimeOfDay, offset: UtcOffset) -> u16 {
    let shifted = local.minute_of_day() as i32 - offset.minutes() as i32;
    shifted.rem_euclid(MINUTES_PER_DAY as i32) as u16
}

/// Same shift, but with the day carried: returns the UTC weekday relative to
/// `day` and the UTC minute-of-day. Used for cron registration, where a tick
/// must fire at the real UTC instant even when the shift crosses midnight.
pub fn to_utc_day_minute(day: Weekday, local: TimeOfDay, offset: UtcOffset) -> (Weekday, u16) {
    let shifted = local.minute_of_day() as i32 - offset.minutes() as i32;
    let minute = shifted.rem_euclid(MINUTES_PER_DAY as i32) as u16;
    // |offset| <= 14h and local < 24h, so the carry is at most one day
    let day = match shifted.div_euclid(MINUTES_PER_DAY as i32) {
        d if d > 0 => day.succ(),
        d if d < 0 => day.pred(),
        _ => day,
    };
    (day, minute)
}
