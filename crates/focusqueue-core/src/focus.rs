//! Focus blocks: recurring daily windows that scope task visibility to one
//! context.
//!
//! ## Evaluation policy
//!
//! - A block is active when the local time of day is in `[start, end)` and
//!   the weekday is in the block's set. An empty set means every day.
//! - `end < start` wraps past midnight. The late part (`[start, 24:00)`) is
//!   checked against today's weekday and the early part (`[00:00, end)`)
//!   against yesterday's, so a Friday 22:00-02:00 block is still active at
//!   01:00 on Saturday.
//! - `start == end` is an empty window and never active.
//! - When several blocks are active at once, the first in input order wins.
//!   Across contexts, contexts are visited by ascending display order.
//! - Local time comes from a fixed UTC offset; DST shifts are not modelled.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::task::{context, ContextId, TaskContext, WeekdaySet};

/// A minute-precision wall-clock time, serialized as `"HH:mm"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(TimeOfDay)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimeOfDay(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// A recurring daily window bound to one context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FocusBlock {
    pub id: String,
    pub context_id: ContextId,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    /// Empty means every day
    #[serde(default)]
    pub days: WeekdaySet,
}

impl FocusBlock {
    pub fn new(
        context_id: impl Into<ContextId>,
        start: TimeOfDay,
        end: TimeOfDay,
        days: WeekdaySet,
    ) -> Self {
        Self {
            id: format!("block-{}", uuid::Uuid::new_v4()),
            context_id: context_id.into(),
            start,
            end,
            days,
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end < self.start
    }

    fn runs_on(&self, day: chrono::Weekday) -> bool {
        self.days.is_empty() || self.days.contains(day)
    }

    /// Whether the block covers a local wall-clock instant.
    pub fn is_active_at(&self, local: NaiveDateTime) -> bool {
        let t = local.time();
        let today = local.weekday();
        let (start, end) = (self.start.as_naive(), self.end.as_naive());

        if start < end {
            t >= start && t < end && self.runs_on(today)
        } else if start > end {
            (t >= start && self.runs_on(today)) || (t < end && self.runs_on(today.pred()))
        } else {
            false
        }
    }
}

/// Decides which focus block, if any, is active.
#[derive(Debug, Clone, Copy)]
pub struct FocusBlockEvaluator {
    offset: FixedOffset,
}

impl FocusBlockEvaluator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset).naive_local()
    }

    /// First active block in input order.
    pub fn active_block<'a>(
        &self,
        blocks: &'a [FocusBlock],
        now: DateTime<Utc>,
    ) -> Option<&'a FocusBlock> {
        let local = self.local(now);
        let mut active = blocks.iter().filter(|b| b.is_active_at(local));
        let first = active.next()?;
        let shadowed = active.count();
        if shadowed > 0 {
            debug!(
                block = %first.id,
                shadowed,
                "overlapping focus blocks, keeping the first"
            );
        }
        Some(first)
    }

    /// Active block across contexts, visited by display order.
    pub fn active_block_in_contexts<'a>(
        &self,
        contexts: &'a [TaskContext],
        now: DateTime<Utc>,
    ) -> Option<&'a FocusBlock> {
        let local = self.local(now);
        let mut active = context::ordered(contexts)
            .into_iter()
            .flat_map(|c| c.focus_blocks.iter())
            .filter(|b| b.is_active_at(local));
        let first = active.next()?;
        if active.next().is_some() {
            debug!(block = %first.id, "overlapping focus blocks across contexts");
        }
        Some(first)
    }
}
