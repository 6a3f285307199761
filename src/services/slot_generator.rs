use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppResult;
use crate::models::scheduling::{TimeSlot, WorkingWindow};
use crate::services::schedule_utils;

/// One candidate start within the working window of a specific date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSlot {
    pub date: NaiveDate,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl CandidateSlot {
    pub fn bounds(&self) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
        Ok((
            schedule_utils::at_minute(self.date, self.start_minute)?,
            schedule_utils::at_minute(self.date, self.end_minute)?,
        ))
    }

    pub fn to_time_slot(&self) -> TimeSlot {
        TimeSlot {
            start: schedule_utils::format_hhmm(self.start_minute),
            end: schedule_utils::format_hhmm(self.end_minute),
            days: vec![schedule_utils::weekday_name(self.date).to_string()],
        }
    }
}

/// Lazy walk over the starts `window.start, window.start + step, ..` that still
/// leave room for `duration` before the window closes.
#[derive(Debug, Clone)]
pub struct SlotIter {
    date: NaiveDate,
    next_start: u32,
    last_start: Option<u32>,
    duration: u32,
    step: u32,
}

impl Iterator for SlotIter {
    type Item = CandidateSlot;

    fn next(&mut self) -> Option<Self::Item> {
        let last_start = self.last_start?;
        if self.next_start > last_start {
            return None;
        }
        let start_minute = self.next_start;
        self.next_start = self.next_start.saturating_add(self.step);
        if self.next_start == start_minute {
            self.last_start = None;
        }
        Some(CandidateSlot {
            date: self.date,
            start_minute,
            end_minute: start_minute + self.duration,
        })
    }
}

pub fn candidate_slots(date: NaiveDate, duration_minutes: i64, window: &WorkingWindow) -> SlotIter {
    candidate_slots_with_step(date, duration_minutes, window, window.step_minutes)
}

pub fn candidate_slots_with_step(
    date: NaiveDate,
    duration_minutes: i64,
    window: &WorkingWindow,
    step_minutes: u32,
) -> SlotIter {
    let duration = u32::try_from(duration_minutes.max(1)).unwrap_or(u32::MAX);
    let last_start = window
        .end_minute
        .checked_sub(duration)
        .filter(|last| *last >= window.start_minute);

    SlotIter {
        date,
        next_start: window.start_minute,
        last_start,
        duration,
        step: step_minutes.max(1),
    }
}

/// `TimeSlot` view of [`candidate_slots`].
pub fn generate_time_slots(
    date: NaiveDate,
    duration_minutes: i64,
    window: &WorkingWindow,
) -> impl Iterator<Item = TimeSlot> {
    candidate_slots(date, duration_minutes, window).map(|slot| slot.to_time_slot())
}
