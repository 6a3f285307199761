use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::AppResult;
use crate::models::goal::{self, Goal, GoalPriority};
use crate::models::replanning::{
    AdaptationStrategy, ChangeType, EnergyImpact, RePlanningResult, ReplanImpact, ScheduleChange,
};
use crate::models::scheduling::AlternativeSchedule;
use crate::models::settings::EngineSettings;
use crate::models::task::Task;
use crate::models::time_block::{BlockType, TimeBlock};
use crate::services::schedule_utils;

const MICRO_CONFIDENCE: f64 = 0.9;
const SHIFT_CONFIDENCE: f64 = 0.75;
const REPRIORITIZE_CONFIDENCE: f64 = 0.8;
const EMERGENCY_CONFIDENCE: f64 = 0.7;
const COMPRESSION_BASE_CONFIDENCE: f64 = 0.5;
const COMPRESSION_RECOVERY_WEIGHT: f64 = 0.3;
const CRITICAL_DUE_WINDOW_HOURS: i64 = 24;

/// Snapshot every strategy works from.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub schedule: &'a [TimeBlock],
    pub goals: &'a [Goal],
    pub tasks: &'a [Task],
    pub priority_goals: &'a [String],
    pub disruption_minutes: i64,
    pub remaining_minutes: i64,
    pub now: DateTime<Utc>,
    pub settings: &'a EngineSettings,
}

impl<'a> StrategyInput<'a> {
    /// Active blocks that have not started yet, earliest first.
    pub fn upcoming_blocks(&self) -> Vec<&'a TimeBlock> {
        let mut upcoming: Vec<&TimeBlock> = self
            .schedule
            .iter()
            .filter(|block| block.is_upcoming(self.now))
            .collect();
        upcoming.sort_by_key(|block| block.start_time);
        upcoming
    }

    fn end_of_day(&self) -> AppResult<DateTime<Utc>> {
        schedule_utils::end_of_day(self.now, self.settings.end_of_day_hour)
    }

    fn task(&self, task_id: &str) -> Option<&'a Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    fn due_date_of(&self, block: &TimeBlock) -> Option<DateTime<Utc>> {
        block
            .task_id
            .as_deref()
            .and_then(|task_id| self.task(task_id))
            .and_then(|task| task.due_date)
    }

    fn goal_priority(&self, block: &TimeBlock) -> GoalPriority {
        goal::highest_priority(&block.goal_ids, self.goals)
    }

    fn deadline_at_risk(
        &self,
        block: &TimeBlock,
        new_end: DateTime<Utc>,
        end_of_day: DateTime<Utc>,
    ) -> bool {
        new_end > end_of_day || self.due_date_of(block).is_some_and(|due| new_end > due)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub strategy: AdaptationStrategy,
    pub new_schedule: Vec<TimeBlock>,
    pub changes: Vec<ScheduleChange>,
    pub confidence: f64,
    pub impact: ReplanImpact,
    pub reasoning: String,
}

impl StrategyOutcome {
    pub fn into_result(self, alternatives: Vec<AlternativeSchedule>) -> RePlanningResult {
        RePlanningResult {
            confidence: schedule_utils::clamp_unit(self.confidence),
            new_schedule: self.new_schedule,
            changes: self.changes,
            alternatives,
            reasoning: self.reasoning,
            impact: self.impact,
            strategy: self.strategy,
        }
    }

    pub fn to_alternative(&self) -> AlternativeSchedule {
        AlternativeSchedule {
            name: self.strategy.as_str().to_string(),
            description: self.reasoning.clone(),
            schedule: self.new_schedule.clone(),
            tradeoffs: vec![format!(
                "{} changes, energy impact {}",
                self.changes.len(),
                self.impact.energy_impact.as_str()
            )],
            confidence: schedule_utils::clamp_unit(self.confidence),
        }
    }
}

/// Pending edits against the committed schedule.
pub(crate) struct ScheduleEdit<'a> {
    original: &'a [TimeBlock],
    replacements: HashMap<String, Option<TimeBlock>>,
    additions: Vec<TimeBlock>,
    pub(crate) changes: Vec<ScheduleChange>,
    goals_affected: Vec<String>,
    deadlines_risk: Vec<String>,
}

impl<'a> ScheduleEdit<'a> {
    pub(crate) fn new(original: &'a [TimeBlock]) -> Self {
        Self {
            original,
            replacements: HashMap::new(),
            additions: Vec::new(),
            changes: Vec::new(),
            goals_affected: Vec::new(),
            deadlines_risk: Vec::new(),
        }
    }

    /// Records a change to a block that is not part of the edited schedule.
    pub(crate) fn record_external(
        &mut self,
        change_type: ChangeType,
        original: &TimeBlock,
        new_block: Option<TimeBlock>,
        reasoning: String,
    ) {
        self.changes
            .push(ScheduleChange::new(change_type, original.clone(), new_block, reasoning));
    }

    pub(crate) fn add(&mut self, block: TimeBlock) {
        self.additions.push(block);
    }

    pub(crate) fn record(
        &mut self,
        change_type: ChangeType,
        original: &TimeBlock,
        new_block: Option<TimeBlock>,
        reasoning: String,
    ) {
        self.replacements
            .insert(original.id.clone(), new_block.clone());
        self.changes
            .push(ScheduleChange::new(change_type, original.clone(), new_block, reasoning));
    }

    pub(crate) fn affect_goals(&mut self, block: &TimeBlock) {
        for goal_id in &block.goal_ids {
            if !self.goals_affected.contains(goal_id) {
                self.goals_affected.push(goal_id.clone());
            }
        }
    }

    pub(crate) fn flag_deadline(&mut self, block: &TimeBlock) {
        let key = block.task_id.clone().unwrap_or_else(|| block.id.clone());
        if !self.deadlines_risk.contains(&key) {
            self.deadlines_risk.push(key);
        }
    }

    pub(crate) fn finish(
        self,
        strategy: AdaptationStrategy,
        confidence: f64,
        energy_impact: EnergyImpact,
        reasoning: String,
    ) -> StrategyOutcome {
        let mut new_schedule: Vec<TimeBlock> = self
            .original
            .iter()
            .filter_map(|block| match self.replacements.get(&block.id) {
                Some(replacement) => replacement.clone(),
                None => Some(block.clone()),
            })
            .chain(self.additions)
            .collect();
        new_schedule.sort_by_key(|block| block.start_time);

        debug!(
            target: "engine::replanning",
            strategy = %strategy,
            changes = self.changes.len(),
            "strategy applied"
        );

        StrategyOutcome {
            strategy,
            new_schedule,
            changes: self.changes,
            confidence,
            impact: ReplanImpact {
                goals_affected: self.goals_affected,
                deadlines_risk: self.deadlines_risk,
                energy_impact,
            },
            reasoning,
        }
    }
}

/// Delays only the next upcoming block by at most the configured cap.
pub fn micro_adjustment(input: &StrategyInput<'_>) -> AppResult<StrategyOutcome> {
    let mut edit = ScheduleEdit::new(input.schedule);
    let delay = input
        .disruption_minutes
        .min(input.settings.micro_adjustment_max_minutes)
        .max(0);

    let next = input.upcoming_blocks().into_iter().next();
    let reasoning = match next {
        Some(block) if delay > 0 => {
            let moved = block.moved_to(schedule_utils::add_minutes(block.start_time, delay)?);
            if input.deadline_at_risk(block, moved.end_time, input.end_of_day()?) {
                edit.flag_deadline(block);
            }
            edit.record(
                ChangeType::Moved,
                block,
                Some(moved),
                format!("Delayed '{}' by {delay} minutes to absorb the disruption", block.title),
            );
            format!("Small disruption absorbed by delaying '{}' {delay} minutes", block.title)
        }
        _ => "Disruption too small to require changes".to_string(),
    };

    Ok(edit.finish(
        AdaptationStrategy::MicroAdjustment,
        MICRO_CONFIDENCE,
        EnergyImpact::Neutral,
        reasoning,
    ))
}

/// Moves every upcoming block later by the full disruption, keeping order and lengths.
pub fn schedule_shift(input: &StrategyInput<'_>) -> AppResult<StrategyOutcome> {
    let mut edit = ScheduleEdit::new(input.schedule);
    let delay = input.disruption_minutes.max(0);
    let end_of_day = input.end_of_day()?;
    let upcoming = input.upcoming_blocks();

    if delay > 0 {
        for block in &upcoming {
            let moved = block.moved_to(schedule_utils::add_minutes(block.start_time, delay)?);
            if input.deadline_at_risk(block, moved.end_time, end_of_day) {
                edit.flag_deadline(block);
            }
            edit.record(
                ChangeType::Moved,
                block,
                Some(moved),
                format!("Shifted '{}' {delay} minutes later", block.title),
            );
        }
    }

    let reasoning = format!(
        "Shifted {} upcoming blocks by {delay} minutes; {} may now run past their limits",
        edit.changes.len(),
        edit.deadlines_risk.len()
    );
    Ok(edit.finish(
        AdaptationStrategy::ScheduleShift,
        SHIFT_CONFIDENCE,
        EnergyImpact::Neutral,
        reasoning,
    ))
}

/// Pushes upcoming blocks by the outstanding delay while trimming compressible
/// ones until the disruption is recovered.
pub fn block_compression(input: &StrategyInput<'_>) -> AppResult<StrategyOutcome> {
    let settings = input.settings;
    let mut edit = ScheduleEdit::new(input.schedule);
    let disruption = input.disruption_minutes.max(0);
    let end_of_day = input.end_of_day()?;
    let mut outstanding = disruption;

    for block in input.upcoming_blocks() {
        if outstanding <= 0 {
            break;
        }
        let duration = block.duration_minutes();
        let shrink = if duration > settings.min_compressible_minutes {
            ((duration as f64 * settings.max_compression_ratio).floor() as i64).min(outstanding)
        } else {
            0
        };
        let new_start = schedule_utils::add_minutes(block.start_time, outstanding)?;
        let compressed = block.resized(new_start, duration - shrink);
        outstanding -= shrink;

        if input.deadline_at_risk(block, compressed.end_time, end_of_day) {
            edit.flag_deadline(block);
        }
        if shrink > 0 {
            edit.affect_goals(block);
            edit.record(
                ChangeType::Shortened,
                block,
                Some(compressed),
                format!("Shortened '{}' by {shrink} minutes to recover time", block.title),
            );
        } else {
            edit.record(
                ChangeType::Moved,
                block,
                Some(compressed),
                format!("Pushed '{}' back behind the delay", block.title),
            );
        }
    }

    let recovered = disruption - outstanding.max(0);
    let ratio = if disruption > 0 {
        recovered as f64 / disruption as f64
    } else {
        1.0
    };
    let reasoning = format!(
        "Compressed upcoming blocks to recover {recovered} of {disruption} lost minutes"
    );
    Ok(edit.finish(
        AdaptationStrategy::BlockCompression,
        COMPRESSION_BASE_CONFIDENCE + COMPRESSION_RECOVERY_WEIGHT * ratio,
        EnergyImpact::Negative,
        reasoning,
    ))
}

/// Keeps priority work, re-admits the rest by goal priority within the time
/// left, and postpones whatever does not fit to the next day.
pub fn goal_reprioritization(input: &StrategyInput<'_>) -> AppResult<StrategyOutcome> {
    let mut edit = ScheduleEdit::new(input.schedule);
    let disruption = input.disruption_minutes.max(0);
    let upcoming = input.upcoming_blocks();

    let is_protected = |block: &TimeBlock| {
        block
            .goal_ids
            .iter()
            .any(|goal_id| input.priority_goals.contains(goal_id))
            || input.goal_priority(block).is_high_or_above()
    };
    let (kept, mut candidates): (Vec<&TimeBlock>, Vec<&TimeBlock>) =
        upcoming.iter().copied().partition(|block| is_protected(block));

    let kept_minutes: i64 = kept.iter().map(|block| block.duration_minutes().max(0)).sum();
    let mut budget = input.remaining_minutes - disruption - kept_minutes;
    candidates.sort_by(|a, b| input.goal_priority(b).cmp(&input.goal_priority(a)));

    let mut admitted = kept.clone();
    let mut postponed = Vec::new();
    for block in candidates {
        let minutes = block.duration_minutes().max(0);
        if minutes <= budget {
            budget -= minutes;
            admitted.push(block);
        } else {
            postponed.push(block);
        }
    }
    admitted.sort_by_key(|block| block.start_time);

    let end_of_day = input.end_of_day()?;
    let mut cursor = schedule_utils::add_minutes(input.now, disruption)?;
    for block in &admitted {
        let start = cursor.max(block.start_time);
        let laid_out = block.moved_to(start);
        cursor = laid_out.end_time;
        if input.deadline_at_risk(block, laid_out.end_time, end_of_day) {
            edit.flag_deadline(block);
        }
        if start != block.start_time {
            edit.record(
                ChangeType::Moved,
                block,
                Some(laid_out),
                format!("Re-sequenced '{}' after the disruption", block.title),
            );
        }
    }

    for block in &postponed {
        let tomorrow = schedule_utils::add_minutes(block.start_time, 24 * 60)?;
        edit.affect_goals(block);
        if input.due_date_of(block).is_some_and(|due| due < tomorrow) {
            edit.flag_deadline(block);
        }
        edit.record(
            ChangeType::Postponed,
            block,
            Some(block.moved_to(tomorrow)),
            format!("Postponed '{}' to tomorrow to protect higher-priority goals", block.title),
        );
    }

    let reasoning = format!(
        "Kept {} priority blocks, re-admitted {}, postponed {} to tomorrow",
        kept.len(),
        admitted.len() - kept.len(),
        postponed.len()
    );
    Ok(edit.finish(
        AdaptationStrategy::GoalReprioritization,
        REPRIORITIZE_CONFIDENCE,
        EnergyImpact::Positive,
        reasoning,
    ))
}

/// Shrinks a block to `max(floor, duration * factor)` minutes, never lengthening it.
pub fn simplify_block(block: &TimeBlock, settings: &EngineSettings) -> TimeBlock {
    let duration = block.duration_minutes().max(0);
    let target = ((duration as f64 * settings.simplify_factor).round() as i64)
        .max(settings.simplify_floor_minutes);
    block.resized(block.start_time, duration.min(target))
}

/// Keeps only critical blocks (simplified) and cancels everything else.
pub fn emergency_simplification(input: &StrategyInput<'_>) -> AppResult<StrategyOutcome> {
    let mut edit = ScheduleEdit::new(input.schedule);
    let due_cutoff = schedule_utils::add_minutes(input.now, CRITICAL_DUE_WINDOW_HOURS * 60)?;
    let mut kept = 0usize;
    let mut cancelled = 0usize;

    for block in input.upcoming_blocks() {
        let critical = block.block_type == BlockType::Meeting
            || input.goal_priority(block) == GoalPriority::Critical
            || input.due_date_of(block).is_some_and(|due| due <= due_cutoff);

        if critical {
            kept += 1;
            let simplified = simplify_block(block, input.settings);
            if simplified.end_time < block.end_time {
                edit.record(
                    ChangeType::Shortened,
                    block,
                    Some(simplified),
                    format!("Reduced '{}' to its essentials", block.title),
                );
            }
        } else {
            cancelled += 1;
            edit.affect_goals(block);
            if input.due_date_of(block).is_some() {
                edit.flag_deadline(block);
            }
            edit.record(
                ChangeType::Cancelled,
                block,
                None,
                format!("Cancelled '{}' to free the rest of the day", block.title),
            );
        }
    }

    let reasoning = format!(
        "Emergency mode: kept {kept} critical blocks in simplified form, cancelled {cancelled}"
    );
    Ok(edit.finish(
        AdaptationStrategy::EmergencySimplification,
        EMERGENCY_CONFIDENCE,
        EnergyImpact::Positive,
        reasoning,
    ))
}
