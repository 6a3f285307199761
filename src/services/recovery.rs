use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::models::replanning::{AdaptationStrategy, ChangeType, EnergyImpact};
use crate::models::scheduling::SchedulingConstraints;
use crate::models::settings::EngineSettings;
use crate::models::time_block::{BlockType, TimeBlock};
use crate::services::adaptation_strategies::{simplify_block, ScheduleEdit, StrategyOutcome};
use crate::services::schedule_optimizer::SchedulingEngine;
use crate::services::schedule_utils;

const CANCEL_ALL_CONFIDENCE: f64 = 1.0;
const POSTPONE_CONFIDENCE: f64 = 0.8;
const SIMPLIFY_CONFIDENCE: f64 = 0.9;
const INTERLEAVE_CONFIDENCE: f64 = 0.6;
const COMPRESSION_BASE_CONFIDENCE: f64 = 0.5;
const COMPRESSION_RECOVERY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOption {
    CancelAll,
    Compression,
    Postponement,
    Simplification,
    Interleaving,
}

impl RecoveryOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryOption::CancelAll => "cancel_all",
            RecoveryOption::Compression => "compression",
            RecoveryOption::Postponement => "postponement",
            RecoveryOption::Simplification => "simplification",
            RecoveryOption::Interleaving => "interleaving",
        }
    }
}

pub struct RecoveryInput<'a> {
    pub missed: &'a [TimeBlock],
    pub remaining: &'a [TimeBlock],
    pub scheduler: &'a dyn SchedulingEngine,
    pub constraints: &'a SchedulingConstraints,
    pub now: DateTime<Utc>,
    pub settings: &'a EngineSettings,
}

impl<'a> RecoveryInput<'a> {
    fn upcoming(&self) -> Vec<&'a TimeBlock> {
        let mut upcoming: Vec<&TimeBlock> = self
            .remaining
            .iter()
            .filter(|block| block.is_upcoming(self.now))
            .collect();
        upcoming.sort_by_key(|block| block.start_time);
        upcoming
    }

    fn missed_minutes(&self) -> i64 {
        self.missed
            .iter()
            .map(|block| block.duration_minutes().max(0))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPlan {
    pub option: RecoveryOption,
    pub outcome: StrategyOutcome,
}

/// Every applicable recovery candidate, in tie-break order.
pub fn recovery_candidates(input: &RecoveryInput<'_>) -> AppResult<Vec<RecoveryPlan>> {
    let minutes_left =
        schedule_utils::minutes_until_end_of_day(input.now, input.settings.end_of_day_hour)?;
    if minutes_left < input.settings.min_recovery_minutes {
        return Ok(vec![cancel_all(input, minutes_left)]);
    }

    let mut plans = vec![compression(input)?, postponement(input)?];
    let upcoming = input.upcoming();
    if !upcoming.is_empty() {
        plans.push(simplification(input)?);
    }
    if upcoming
        .iter()
        .any(|block| block.duration_minutes() < input.settings.max_extendable_minutes)
    {
        plans.push(interleaving(input)?);
    }
    Ok(plans)
}

/// Highest confidence wins; the earlier candidate wins ties. The rest are returned
/// so they can be offered as alternatives.
pub fn suggest_recovery(input: &RecoveryInput<'_>) -> AppResult<(RecoveryPlan, Vec<RecoveryPlan>)> {
    let mut plans = recovery_candidates(input)?.into_iter();
    let Some(mut best) = plans.next() else {
        return Ok((cancel_all(input, 0), Vec::new()));
    };
    let mut others = Vec::new();
    for plan in plans {
        if plan.outcome.confidence > best.outcome.confidence {
            others.push(std::mem::replace(&mut best, plan));
        } else {
            others.push(plan);
        }
    }

    info!(
        target: "engine::recovery",
        option = best.option.as_str(),
        missed = input.missed.len(),
        confidence = best.outcome.confidence,
        "recovery option selected"
    );
    Ok((best, others))
}

fn plan(
    option: RecoveryOption,
    edit: ScheduleEdit<'_>,
    confidence: f64,
    energy_impact: EnergyImpact,
    reasoning: String,
) -> RecoveryPlan {
    RecoveryPlan {
        option,
        outcome: edit.finish(
            AdaptationStrategy::MissedBlockRecovery,
            confidence,
            energy_impact,
            reasoning,
        ),
    }
}

fn cancel_all(input: &RecoveryInput<'_>, minutes_left: i64) -> RecoveryPlan {
    let mut edit = ScheduleEdit::new(input.remaining);
    for block in input.missed {
        edit.affect_goals(block);
        edit.record_external(
            ChangeType::Cancelled,
            block,
            None,
            format!("Dropped missed block '{}'; the day is nearly over", block.title),
        );
    }
    plan(
        RecoveryOption::CancelAll,
        edit,
        CANCEL_ALL_CONFIDENCE,
        EnergyImpact::Positive,
        format!(
            "Only {minutes_left} minutes left today; cancelled {} missed blocks instead of cramming",
            input.missed.len()
        ),
    )
}

/// Shrinks upcoming blocks in order, pulling later ones forward so the freed
/// minutes collect before the end of the last block.
fn pack_shrunk<'b>(
    blocks: &[&'b TimeBlock],
    mut shrink_for: impl FnMut(&TimeBlock) -> i64,
) -> AppResult<(Vec<(&'b TimeBlock, TimeBlock)>, i64)> {
    let mut pull = 0i64;
    let mut packed = Vec::with_capacity(blocks.len());
    for block in blocks {
        let duration = block.duration_minutes().max(0);
        let shrink = shrink_for(*block).clamp(0, duration);
        let start = schedule_utils::add_minutes(block.start_time, -pull)?;
        packed.push((*block, block.resized(start, duration - shrink)));
        pull += shrink;
    }
    Ok((packed, pull))
}

fn catch_up_block(
    missed: &[TimeBlock],
    start: DateTime<Utc>,
    minutes: i64,
) -> AppResult<TimeBlock> {
    let titles = missed
        .iter()
        .map(|block| block.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let end = schedule_utils::add_minutes(start, minutes)?;
    let mut block = TimeBlock::new(format!("Catch-up: {titles}"), start, end, BlockType::Work);
    block.description = format!("Recovered work from {} missed blocks", missed.len());
    for missed_block in missed {
        for goal_id in &missed_block.goal_ids {
            if !block.goal_ids.contains(goal_id) {
                block.goal_ids.push(goal_id.clone());
            }
        }
    }
    if let Some(first) = missed.first() {
        block.domain_id = first.domain_id.clone();
        block.user_id = first.user_id.clone();
        block.project_id = first.project_id.clone();
    }
    Ok(block)
}

/// Places a catch-up block in the minutes freed at the tail of `packed` and
/// records what happened to each missed block.
fn fold_missed_into_catch_up(
    input: &RecoveryInput<'_>,
    edit: &mut ScheduleEdit<'_>,
    packed: &[(&TimeBlock, TimeBlock)],
    freed: i64,
    work_minutes: i64,
) -> AppResult<i64> {
    let placed = freed.min(work_minutes).max(0);
    let anchor = packed.last().map(|(_, new_block)| new_block.end_time);

    match anchor {
        Some(start) if placed > 0 => {
            let catch_up = catch_up_block(input.missed, start, placed)?;
            for block in input.missed {
                edit.record_external(
                    ChangeType::Moved,
                    block,
                    Some(catch_up.clone()),
                    format!("Folded '{}' into the catch-up block", block.title),
                );
            }
            edit.add(catch_up);
        }
        _ => {
            for block in input.missed {
                edit.affect_goals(block);
                edit.record_external(
                    ChangeType::Cancelled,
                    block,
                    None,
                    format!("No room freed for '{}'", block.title),
                );
            }
        }
    }
    Ok(placed)
}

fn compression(input: &RecoveryInput<'_>) -> AppResult<RecoveryPlan> {
    let settings = input.settings;
    let missed_minutes = input.missed_minutes();
    let target = (missed_minutes as f64 * settings.recovery_compression_target).floor() as i64;

    let mut budget = target;
    let upcoming = input.upcoming();
    let (packed, freed) = pack_shrunk(&upcoming, |block| {
        let duration = block.duration_minutes();
        if budget <= 0 || duration <= settings.min_compressible_minutes {
            return 0;
        }
        let shrink =
            ((duration as f64 * settings.max_compression_ratio).floor() as i64).min(budget);
        budget -= shrink;
        shrink
    })?;

    let mut edit = ScheduleEdit::new(input.remaining);
    for (original, compressed) in &packed {
        if compressed != *original {
            edit.record(
                ChangeType::Shortened,
                original,
                Some(compressed.clone()),
                format!("Compressed '{}' to make room for missed work", original.title),
            );
        }
    }
    let recovered = fold_missed_into_catch_up(input, &mut edit, &packed, freed, missed_minutes)?;

    let ratio = if missed_minutes > 0 {
        recovered as f64 / missed_minutes as f64
    } else {
        1.0
    };
    Ok(plan(
        RecoveryOption::Compression,
        edit,
        COMPRESSION_BASE_CONFIDENCE + COMPRESSION_RECOVERY_WEIGHT * ratio,
        EnergyImpact::Negative,
        format!("Compressed today's remaining blocks to recover {recovered} of {missed_minutes} missed minutes"),
    ))
}

fn postponement(input: &RecoveryInput<'_>) -> AppResult<RecoveryPlan> {
    let tomorrow = schedule_utils::add_days(input.now.date_naive(), 1)?;
    let next_midnight = schedule_utils::at_minute(tomorrow, 0)?;

    let mut constraints = input.constraints.clone();
    constraints
        .existing_blocks
        .extend(input.remaining.iter().cloned());

    let mut edit = ScheduleEdit::new(input.remaining);
    let mut claimed: Vec<TimeBlock> = Vec::new();
    for block in input.missed {
        let start = next_day_start(input, &constraints, &claimed, block, tomorrow, next_midnight);
        let postponed = block.moved_to(start);
        claimed.push(postponed.clone());
        edit.record_external(
            ChangeType::Postponed,
            block,
            Some(postponed.clone()),
            format!("Deferred missed block '{}' to tomorrow", block.title),
        );
        edit.add(postponed);
    }

    Ok(plan(
        RecoveryOption::Postponement,
        edit,
        POSTPONE_CONFIDENCE,
        EnergyImpact::Neutral,
        format!("Deferred {} missed blocks to tomorrow", input.missed.len()),
    ))
}

/// First free slot tomorrow from the scheduler, else the same time of day tomorrow.
fn next_day_start(
    input: &RecoveryInput<'_>,
    constraints: &SchedulingConstraints,
    claimed: &[TimeBlock],
    block: &TimeBlock,
    tomorrow: NaiveDate,
    next_midnight: DateTime<Utc>,
) -> DateTime<Utc> {
    let same_time_tomorrow =
        schedule_utils::add_minutes(block.start_time, 24 * 60).unwrap_or(block.start_time);
    let duration = block.duration_minutes().max(1);
    let weekday = schedule_utils::weekday_name(tomorrow);

    let slots = match input
        .scheduler
        .find_available_slots_at(duration, constraints, next_midnight)
    {
        Ok(slots) => slots,
        Err(err) => {
            warn!(target: "engine::recovery", error = %err, "slot lookup failed; keeping time of day");
            return same_time_tomorrow;
        }
    };

    slots
        .iter()
        .filter(|slot| slot.days.iter().any(|day| day == weekday))
        .filter_map(|slot| {
            let minute = schedule_utils::parse_hhmm(&slot.start).ok()?;
            let start = schedule_utils::at_minute(tomorrow, minute).ok()?;
            let end = schedule_utils::add_minutes(start, duration).ok()?;
            claimed
                .iter()
                .all(|taken| !taken.overlaps(start, end))
                .then_some(start)
        })
        .next()
        .unwrap_or_else(|| {
            debug!(target: "engine::recovery", block_id = %block.id, "no slot tomorrow; keeping time of day");
            same_time_tomorrow
        })
}

fn simplification(input: &RecoveryInput<'_>) -> AppResult<RecoveryPlan> {
    let upcoming = input.upcoming();
    let (packed, freed) = pack_shrunk(&upcoming, |block| {
        block.duration_minutes() - simplify_block(block, input.settings).duration_minutes()
    })?;
    let simplified_missed: i64 = input
        .missed
        .iter()
        .map(|block| simplify_block(block, input.settings).duration_minutes())
        .sum();

    let mut edit = ScheduleEdit::new(input.remaining);
    for (original, simplified) in &packed {
        if simplified != *original {
            edit.record(
                ChangeType::Shortened,
                original,
                Some(simplified.clone()),
                format!("Simplified '{}' to its essentials", original.title),
            );
        }
    }
    let placed = fold_missed_into_catch_up(input, &mut edit, &packed, freed, simplified_missed)?;

    Ok(plan(
        RecoveryOption::Simplification,
        edit,
        SIMPLIFY_CONFIDENCE,
        EnergyImpact::Positive,
        format!("Simplified the rest of the day and fit {placed} minutes of reduced missed work"),
    ))
}

fn interleaving(input: &RecoveryInput<'_>) -> AppResult<RecoveryPlan> {
    let settings = input.settings;
    let mut outstanding = input.missed_minutes();
    let mut push = 0i64;
    let mut edit = ScheduleEdit::new(input.remaining);

    for block in input.upcoming() {
        let duration = block.duration_minutes().max(0);
        let extension = if duration < settings.max_extendable_minutes {
            settings.max_extension_minutes.min(outstanding).max(0)
        } else {
            0
        };
        if push == 0 && extension == 0 {
            continue;
        }
        let start = schedule_utils::add_minutes(block.start_time, push)?;
        let adjusted = block.resized(start, duration + extension);
        outstanding -= extension;
        push += extension;
        edit.record(
            ChangeType::Moved,
            block,
            Some(adjusted),
            if extension > 0 {
                format!("Extended '{}' by {extension} minutes to absorb missed work", block.title)
            } else {
                format!("Pushed '{}' back after extended blocks", block.title)
            },
        );
    }

    for block in input.missed {
        edit.record_external(
            ChangeType::Cancelled,
            block,
            None,
            format!("Missed work from '{}' spread across today's blocks", block.title),
        );
    }

    Ok(plan(
        RecoveryOption::Interleaving,
        edit,
        INTERLEAVE_CONFIDENCE,
        EnergyImpact::Neutral,
        format!("Interleaved {push} minutes of missed work into today's shorter blocks"),
    ))
}
