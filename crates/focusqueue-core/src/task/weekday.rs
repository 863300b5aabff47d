//! Weekday sets shared by focus blocks and recurring tasks.
//!
//! Serialized as a sorted list of indices, 0 = Sunday ... 6 = Saturday.

use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Bit set of weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const fn empty() -> Self {
        WeekdaySet(0)
    }

    pub const fn all() -> Self {
        WeekdaySet(0b111_1111)
    }

    /// Monday through Friday.
    pub const fn weekdays() -> Self {
        WeekdaySet(0b011_1110)
    }

    /// Build from indices, 0 = Sunday.
    ///
    /// # Errors
    ///
    /// Returns an error for any index above 6.
    pub fn from_indices(days: &[u8]) -> Result<Self, ValidationError> {
        let mut set = WeekdaySet::empty();
        for &day in days {
            if day > 6 {
                return Err(ValidationError::InvalidWeekday(day));
            }
            set.0 |= 1 << day;
        }
        Ok(set)
    }

    pub fn with(mut self, day: Weekday) -> Self {
        self.0 |= 1 << day.num_days_from_sunday();
        self
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn indices(&self) -> Vec<u8> {
        (0..7u8).filter(|d| self.0 & (1 << d) != 0).collect()
    }
}

impl TryFrom<Vec<u8>> for WeekdaySet {
    type Error = ValidationError;

    fn try_from(days: Vec<u8>) -> Result<Self, Self::Error> {
        WeekdaySet::from_indices(&days)
    }
}

impl From<WeekdaySet> for Vec<u8> {
    fn from(set: WeekdaySet) -> Self {
        set.indices()
    }
}

const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.indices().iter().map(|&d| NAMES[d as usize]).collect();
        write!(f, "{}", names.join(","))
    }
}

/// Parses `mon,wed,fri`, `weekdays`, `daily`, or digit lists like `1,3,5`.
impl FromStr for WeekdaySet {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "all" => return Ok(WeekdaySet::all()),
            "weekdays" => return Ok(WeekdaySet::weekdays()),
            _ => {}
        }

        let mut set = WeekdaySet::empty();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let lower = part.to_ascii_lowercase();
            let index = match NAMES.iter().position(|n| lower.starts_with(n)) {
                Some(i) => i as u8,
                None => lower
                    .parse::<u8>()
                    .map_err(|_| ValidationError::value("weekdays", format!("unknown day '{part}'")))?,
            };
            set = set.union(WeekdaySet::from_indices(&[index])?);
        }
        Ok(set)
    }
}

impl WeekdaySet {
    fn union(self, other: WeekdaySet) -> WeekdaySet {
        WeekdaySet(self.0 | other.0)
    }
}
