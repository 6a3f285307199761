use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::goal::Goal;
use crate::models::preferences::TimeRange;
use crate::models::scheduling::{
    MinuteRange, SchedulingConstraints, SchedulingContext, WorkingWindow,
};
use crate::models::settings::EngineSettings;
use crate::models::task::Task;
use crate::models::time_block::BlockStatus;
use crate::services::schedule_utils;

/// Normalizes caller constraints into the view every pass reads from.
pub fn build_context(
    constraints: &SchedulingConstraints,
    settings: &EngineSettings,
    now: DateTime<Utc>,
) -> AppResult<SchedulingContext> {
    let preferences = constraints.user_preferences.clone();
    let working_window = parse_working_window(
        &preferences.working_hours.start,
        &preferences.working_hours.end,
        preferences.context_switching.minimum_block_duration,
        settings.minimum_slot_step_minutes,
    )?;

    let mut deadlines: HashMap<String, DateTime<Utc>> = HashMap::new();
    for deadline in &constraints.deadlines {
        deadlines
            .entry(deadline.task_id.clone())
            .and_modify(|current| {
                if deadline.due_date < *current {
                    *current = deadline.due_date;
                }
            })
            .or_insert(deadline.due_date);
    }

    let existing_blocks = constraints
        .existing_blocks
        .iter()
        .filter(|block| block.status != BlockStatus::Cancelled)
        .cloned()
        .collect::<Vec<_>>();

    let goals = resolve_goals(&constraints.goals);

    let context = SchedulingContext {
        high_energy_ranges: parse_ranges(&preferences.energy_management.high_energy_times),
        deep_work_ranges: parse_ranges(&preferences.deep_work_preferences.preferred_times),
        preferences,
        energy_profile: constraints.energy_profile.clone(),
        buffer_preferences: constraints.buffer_preferences.clone(),
        deadlines,
        existing_blocks,
        goals,
        working_window,
        now,
        planning_date: now.date_naive(),
    };

    debug!(
        target: "engine::context",
        window_start = context.working_window.start_minute,
        window_end = context.working_window.end_minute,
        step = context.working_window.step_minutes,
        existing = context.existing_blocks.len(),
        goals = context.goals.len(),
        "scheduling context built"
    );

    Ok(context)
}

/// Earliest of the task's own due date and any deadline entry for it.
pub fn effective_due_date(task: &Task, context: &SchedulingContext) -> Option<DateTime<Utc>> {
    match (task.due_date, context.deadlines.get(&task.id).copied()) {
        (Some(own), Some(listed)) => Some(own.min(listed)),
        (own, listed) => own.or(listed),
    }
}

fn parse_working_window(
    start: &str,
    end: &str,
    minimum_block_duration: i64,
    minimum_step: u32,
) -> AppResult<WorkingWindow> {
    let start_minute = schedule_utils::parse_hhmm(start)?;
    let end_minute = schedule_utils::parse_hhmm(end)?;
    if end_minute < start_minute {
        return Err(AppError::validation(format!(
            "working hours end {end} precedes start {start}"
        )));
    }

    let requested = u32::try_from(minimum_block_duration.max(0)).unwrap_or(u32::MAX);
    Ok(WorkingWindow {
        start_minute,
        end_minute,
        step_minutes: requested.max(minimum_step).max(1),
    })
}

fn parse_ranges(ranges: &[TimeRange]) -> Vec<MinuteRange> {
    ranges
        .iter()
        .filter_map(|range| {
            match (
                schedule_utils::parse_hhmm(&range.start),
                schedule_utils::parse_hhmm(&range.end),
            ) {
                (Ok(start), Ok(end)) if end > start => Some(MinuteRange { start, end }),
                _ => {
                    warn!(target: "engine::context", start = %range.start, end = %range.end, "ignoring unusable time range");
                    None
                }
            }
        })
        .collect()
}

/// Deduplicated by id (first occurrence wins), highest priority first.
fn resolve_goals(goals: &[Goal]) -> Vec<Goal> {
    let mut seen = HashSet::new();
    let mut resolved = goals
        .iter()
        .filter(|goal| seen.insert(goal.id.clone()))
        .cloned()
        .collect::<Vec<_>>();
    resolved.sort_by(|a, b| b.priority.cmp(&a.priority));
    resolved
}
