use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::scheduling::{
    ConflictSeverity, ConflictType, SchedulingConflict, SchedulingConstraints, SchedulingContext,
    SchedulingPass, SchedulingResult, TimeSlot,
};
use crate::models::settings::EngineSettings;
use crate::models::task::Task;
use crate::models::time_block::{BlockType, TimeBlock};
use crate::services::alternatives;
use crate::services::availability::is_slot_available;
use crate::services::context_builder::{self, effective_due_date};
use crate::services::schedule_utils;
use crate::services::slot_generator::{self, CandidateSlot};
use crate::services::slot_scorer::{self, SlotScore};
use crate::services::task_classifier::{EnergyRequirement, KeywordClassifier, TaskClassifier};

const MIN_TASK_MINUTES: i64 = 15;
const MAX_BATCH_SIZE: usize = 3;
const URGENT_THRESHOLD: f64 = 0.8;
const HIGH_ENERGY_FLOOR: f64 = 0.6;
const MEDIUM_ENERGY_BAND: (f64, f64) = (0.4, 0.7);
const LOW_ENERGY_CEILING: f64 = 0.5;
const MISMATCH_ENERGY_FLOOR: f64 = 0.5;
const HIGH_ENERGY_RANGE_BONUS: f64 = 0.1;

/// Passes tried for every primary schedule, in tie-break order.
pub const PRIMARY_PASSES: [SchedulingPass; 4] = [
    SchedulingPass::DeadlinePressure,
    SchedulingPass::EnergyOptimization,
    SchedulingPass::GoalAlignment,
    SchedulingPass::UserPreference,
];

/// Scheduler surface the re-planning engine depends on.
pub trait SchedulingEngine: Send + Sync {
    fn schedule_at(
        &self,
        tasks: &[Task],
        constraints: &SchedulingConstraints,
        now: DateTime<Utc>,
    ) -> SchedulingResult;

    fn optimize_existing_at(
        &self,
        blocks: &[TimeBlock],
        constraints: &SchedulingConstraints,
        now: DateTime<Utc>,
    ) -> SchedulingResult;

    fn find_available_slots_at(
        &self,
        duration_minutes: i64,
        constraints: &SchedulingConstraints,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<TimeSlot>>;

    fn schedule(&self, tasks: &[Task], constraints: &SchedulingConstraints) -> SchedulingResult {
        self.schedule_at(tasks, constraints, Utc::now())
    }

    fn optimize_existing(
        &self,
        blocks: &[TimeBlock],
        constraints: &SchedulingConstraints,
    ) -> SchedulingResult {
        self.optimize_existing_at(blocks, constraints, Utc::now())
    }

    fn find_available_slots(
        &self,
        duration_minutes: i64,
        constraints: &SchedulingConstraints,
    ) -> AppResult<Vec<TimeSlot>> {
        self.find_available_slots_at(duration_minutes, constraints, Utc::now())
    }
}

/// Knobs that distinguish the alternative schedules from the primary passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlacementOptions {
    pub duration_factor: f64,
    pub padding_minutes: i64,
    pub step_minutes: Option<u32>,
    pub earliest_fit: bool,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            duration_factor: 1.0,
            padding_minutes: 0,
            step_minutes: None,
            earliest_fit: false,
        }
    }
}

impl PlacementOptions {
    fn scaled_duration(&self, minutes: i64) -> i64 {
        let factor = if self.duration_factor.is_finite() && self.duration_factor > 0.0 {
            self.duration_factor
        } else {
            1.0
        };
        (minutes as f64 * factor).ceil() as i64
    }
}

#[derive(Debug)]
pub(crate) struct PassOutcome {
    pub result: SchedulingResult,
    pub quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SlotClass {
    Any,
    HighEnergyRange,
    EnergyAtLeast(f64),
    EnergyBetween(f64, f64),
    EnergyAtMost(f64),
    DeepWorkRange,
}

impl SlotClass {
    fn is_usable(&self, context: &SchedulingContext) -> bool {
        match self {
            SlotClass::HighEnergyRange => !context.high_energy_ranges.is_empty(),
            SlotClass::DeepWorkRange => !context.deep_work_ranges.is_empty(),
            _ => true,
        }
    }

    fn admits(&self, slot: &CandidateSlot, energy: f64, context: &SchedulingContext) -> bool {
        match *self {
            SlotClass::Any => true,
            SlotClass::HighEnergyRange => context
                .high_energy_ranges
                .iter()
                .any(|range| range.contains(slot.start_minute, slot.end_minute)),
            SlotClass::EnergyAtLeast(floor) => energy >= floor,
            SlotClass::EnergyBetween(low, high) => energy >= low && energy <= high,
            SlotClass::EnergyAtMost(ceiling) => energy <= ceiling,
            SlotClass::DeepWorkRange => context
                .deep_work_ranges
                .iter()
                .any(|range| range.contains(slot.start_minute, slot.end_minute)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    energy_level: f64,
    score: SlotScore,
}

pub struct ScheduleOptimizer {
    settings: EngineSettings,
    classifier: Arc<dyn TaskClassifier>,
}

impl Default for ScheduleOptimizer {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl ScheduleOptimizer {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_classifier(settings, Arc::new(KeywordClassifier))
    }

    pub fn with_classifier(settings: EngineSettings, classifier: Arc<dyn TaskClassifier>) -> Self {
        Self {
            settings,
            classifier,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn requirement(&self, task: &Task) -> EnergyRequirement {
        self.classifier.classify_energy(&task.classification_text())
    }

    pub(crate) fn is_deep(&self, task: &Task) -> bool {
        self.classifier.is_deep_work(&task.classification_text())
    }

    pub(crate) fn run_pass(
        &self,
        pass: SchedulingPass,
        tasks: &[Task],
        context: &SchedulingContext,
        options: PlacementOptions,
    ) -> AppResult<Option<PassOutcome>> {
        let mut builder = PassBuilder::new(self, context, options);
        match pass {
            SchedulingPass::DeadlinePressure => self.deadline_pass(&mut builder, tasks)?,
            SchedulingPass::EnergyOptimization => self.energy_pass(&mut builder, tasks)?,
            SchedulingPass::GoalAlignment => self.goal_pass(&mut builder, tasks)?,
            SchedulingPass::UserPreference => self.preference_pass(&mut builder, tasks)?,
            other => {
                return Err(AppError::scheduling(format!(
                    "{other} is not a placement pass"
                )))
            }
        }
        Ok(builder.finish(pass, tasks))
    }

    fn deadline_pass(&self, builder: &mut PassBuilder<'_>, tasks: &[Task]) -> AppResult<()> {
        for task in self.order_by_urgency(tasks.iter().collect(), builder.context) {
            builder.place(&[task], &task.title, &[SlotClass::Any])?;
        }
        Ok(())
    }

    fn energy_pass(&self, builder: &mut PassBuilder<'_>, tasks: &[Task]) -> AppResult<()> {
        let buckets = [
            (
                EnergyRequirement::High,
                vec![
                    SlotClass::HighEnergyRange,
                    SlotClass::EnergyAtLeast(HIGH_ENERGY_FLOOR),
                    SlotClass::Any,
                ],
            ),
            (
                EnergyRequirement::Medium,
                vec![
                    SlotClass::EnergyBetween(MEDIUM_ENERGY_BAND.0, MEDIUM_ENERGY_BAND.1),
                    SlotClass::Any,
                ],
            ),
            (
                EnergyRequirement::Low,
                vec![SlotClass::EnergyAtMost(LOW_ENERGY_CEILING), SlotClass::Any],
            ),
        ];

        for (requirement, classes) in buckets {
            let bucket = tasks
                .iter()
                .filter(|task| self.requirement(task) == requirement)
                .collect();
            for task in self.order_by_urgency(bucket, builder.context) {
                let placement = builder.place(&[task], &task.title, &classes)?;
                if let Some(placement) = placement {
                    if requirement == EnergyRequirement::High
                        && placement.energy_level < MISMATCH_ENERGY_FLOOR
                    {
                        builder.conflicts.push(SchedulingConflict {
                            conflict_type: ConflictType::EnergyMismatch,
                            description: format!(
                                "'{}' needs high energy but landed at {:.0}% expected energy",
                                task.title,
                                placement.energy_level * 100.0
                            ),
                            severity: ConflictSeverity::Low,
                            suggestions: vec![
                                "Move the task into a high-energy window".to_string(),
                            ],
                            task_id: Some(task.id.clone()),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn goal_pass(&self, builder: &mut PassBuilder<'_>, tasks: &[Task]) -> AppResult<()> {
        let context = builder.context;
        for goal in &context.goals {
            let linked = tasks
                .iter()
                .filter(|task| task.goal_id.as_deref() == Some(goal.id.as_str()))
                .collect();
            let ordered = self.order_by_urgency(linked, context);
            for batch in ordered.chunks(MAX_BATCH_SIZE) {
                let batched = batch.len() > 1
                    && builder
                        .place(batch, &goal.title, &[SlotClass::Any])?
                        .is_some();
                if batched {
                    continue;
                }
                for task in batch {
                    builder.place(&[*task], &task.title, &[SlotClass::Any])?;
                }
            }
        }

        // Tasks whose goal is unknown to the context are placed like goal-less ones.
        let remaining = tasks
            .iter()
            .filter(|task| match task.goal_id.as_deref() {
                Some(goal_id) => context.goal(goal_id).is_none(),
                None => true,
            })
            .collect();
        for task in self.order_by_urgency(remaining, context) {
            builder.place(&[task], &task.title, &[SlotClass::Any])?;
        }
        Ok(())
    }

    fn preference_pass(&self, builder: &mut PassBuilder<'_>, tasks: &[Task]) -> AppResult<()> {
        let (deep, shallow): (Vec<&Task>, Vec<&Task>) =
            tasks.iter().partition(|task| self.is_deep(task));

        for task in self.order_by_urgency(deep, builder.context) {
            builder.place(
                &[task],
                &task.title,
                &[SlotClass::DeepWorkRange, SlotClass::Any],
            )?;
        }
        for task in self.order_by_urgency(shallow, builder.context) {
            builder.place(&[task], &task.title, &[SlotClass::Any])?;
        }
        Ok(())
    }

    /// Urgency desc, then earlier due date, then higher priority.
    fn order_by_urgency<'t>(
        &self,
        mut tasks: Vec<&'t Task>,
        context: &SchedulingContext,
    ) -> Vec<&'t Task> {
        tasks.sort_by(|a, b| {
            let due_a = effective_due_date(a, context);
            let due_b = effective_due_date(b, context);
            let urgency_a = slot_scorer::deadline_urgency(due_a, context.now);
            let urgency_b = slot_scorer::deadline_urgency(due_b, context.now);
            urgency_b
                .partial_cmp(&urgency_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| compare_due(due_a, due_b))
                .then_with(|| b.priority.cmp(&a.priority))
        });
        tasks
    }

    fn select_primary(
        &self,
        tasks: &[Task],
        context: &SchedulingContext,
    ) -> Option<SchedulingResult> {
        let mut best: Option<PassOutcome> = None;
        for pass in PRIMARY_PASSES {
            match self.run_pass(pass, tasks, context, PlacementOptions::default()) {
                Ok(Some(outcome)) => {
                    debug!(
                        target: "engine::optimizer",
                        pass = %pass,
                        quality = outcome.quality,
                        blocks = outcome.result.schedule.len(),
                        "pass evaluated"
                    );
                    if best
                        .as_ref()
                        .map_or(true, |current| outcome.quality > current.quality)
                    {
                        best = Some(outcome);
                    }
                }
                Ok(None) => {
                    debug!(target: "engine::optimizer", pass = %pass, "pass placed no tasks");
                }
                Err(err) => {
                    warn!(target: "engine::optimizer", pass = %pass, error = %err, "pass failed");
                }
            }
        }
        best.map(|outcome| outcome.result)
    }

    /// Back-to-back layout from the configured start of the planning day.
    fn basic_fallback(&self, tasks: &[Task], now: DateTime<Utc>) -> AppResult<SchedulingResult> {
        let start_minute = schedule_utils::parse_hhmm(&self.settings.fallback_start)?;
        let gap = self.settings.fallback_buffer_minutes.max(0);
        let mut cursor = schedule_utils::at_minute(now.date_naive(), start_minute)?;

        let mut schedule = Vec::with_capacity(tasks.len());
        for task in tasks {
            let end = schedule_utils::add_minutes(cursor, task_duration(task))?;
            let block_type = block_type_for(self.requirement(task), self.is_deep(task));
            schedule.push(build_block(&[task], &task.title, cursor, end, block_type));
            cursor = schedule_utils::add_minutes(end, gap)?;
        }

        Ok(SchedulingResult {
            reasoning: format!(
                "No optimization pass produced a schedule; {} tasks laid out back-to-back from {}",
                schedule.len(),
                self.settings.fallback_start
            ),
            schedule,
            conflicts: Vec::new(),
            alternatives: Vec::new(),
            confidence: schedule_utils::clamp_unit(self.settings.fallback_confidence),
            pass: SchedulingPass::BasicFallback,
        })
    }

    fn should_reschedule_block(&self, block: &TimeBlock, context: &SchedulingContext) -> bool {
        debug!(
            target: "engine::optimizer",
            block_id = %block.id,
            snapshot = %context.now,
            "existing block kept in place"
        );
        false
    }
}

impl SchedulingEngine for ScheduleOptimizer {
    fn schedule_at(
        &self,
        tasks: &[Task],
        constraints: &SchedulingConstraints,
        now: DateTime<Utc>,
    ) -> SchedulingResult {
        let context = match context_builder::build_context(constraints, &self.settings, now) {
            Ok(context) => Some(context),
            Err(err) => {
                warn!(target: "engine::optimizer", error = %err, "unable to build scheduling context");
                None
            }
        };

        let primary = context
            .as_ref()
            .and_then(|context| self.select_primary(tasks, context));

        let mut result = match primary {
            Some(result) => result,
            None => match self.basic_fallback(tasks, now) {
                Ok(result) => result,
                Err(err) => error_schedule(&err),
            },
        };

        if result.pass != SchedulingPass::ErrorFallback {
            if let Some(context) = context.as_ref() {
                result.alternatives = alternatives::generate_alternatives(self, tasks, context);
            }
        }

        info!(
            target: "engine::optimizer",
            pass = %result.pass,
            blocks = result.schedule.len(),
            conflicts = result.conflicts.len(),
            confidence = result.confidence,
            "schedule generated"
        );
        result
    }

    fn optimize_existing_at(
        &self,
        blocks: &[TimeBlock],
        constraints: &SchedulingConstraints,
        now: DateTime<Utc>,
    ) -> SchedulingResult {
        let context = match context_builder::build_context(constraints, &self.settings, now) {
            Ok(context) => context,
            Err(err) => return error_schedule(&err),
        };

        let active: Vec<&TimeBlock> = blocks.iter().filter(|block| block.is_active()).collect();
        let mut conflicts = Vec::new();

        for (idx, block) in active.iter().enumerate() {
            for other in &active[idx + 1..] {
                if block.overlaps(other.start_time, other.end_time) {
                    conflicts.push(SchedulingConflict {
                        conflict_type: ConflictType::Overlap,
                        description: format!(
                            "'{}' overlaps '{}'",
                            block.title, other.title
                        ),
                        severity: ConflictSeverity::High,
                        suggestions: vec![format!("Move '{}' to a free slot", other.title)],
                        task_id: other.task_id.clone(),
                    });
                }
            }
        }

        let mut scores = Vec::with_capacity(active.len());
        for block in &active {
            if self.should_reschedule_block(block, &context) {
                continue;
            }
            let requirement = self
                .classifier
                .classify_energy(&format!("{} {}", block.title, block.description));
            let energy = context.energy_profile.energy_at(block.start_time.hour());
            scores.push(slot_scorer::energy_match(energy, requirement));

            let gap = (energy - requirement.required_energy()).abs();
            if gap > self.settings.energy_mismatch_threshold {
                conflicts.push(SchedulingConflict {
                    conflict_type: ConflictType::EnergyMismatch,
                    description: format!(
                        "'{}' needs {} energy at an hour expected to be {:.0}%",
                        block.title,
                        requirement,
                        energy * 100.0
                    ),
                    severity: ConflictSeverity::Low,
                    suggestions: vec!["Swap with a block better suited to this hour".to_string()],
                    task_id: block.task_id.clone(),
                });
            }
        }
        sort_conflicts(&mut conflicts);

        let confidence = if scores.is_empty() {
            1.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        SchedulingResult {
            schedule: blocks.to_vec(),
            reasoning: format!(
                "Reviewed {} active blocks; {} conflicts found, no block relocated",
                active.len(),
                conflicts.len()
            ),
            conflicts,
            alternatives: Vec::new(),
            confidence: schedule_utils::clamp_unit(confidence),
            pass: SchedulingPass::ExistingSchedule,
        }
    }

    fn find_available_slots_at(
        &self,
        duration_minutes: i64,
        constraints: &SchedulingConstraints,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<TimeSlot>> {
        let context = context_builder::build_context(constraints, &self.settings, now)?;
        let mut ranked: Vec<(f64, TimeSlot)> = Vec::new();

        for offset in 0..self.settings.slot_search_days.max(0) {
            let date = schedule_utils::add_days(context.planning_date, offset)?;
            for candidate in
                slot_generator::candidate_slots(date, duration_minutes, &context.working_window)
            {
                let (start, end) = candidate.bounds()?;
                if start < now || !is_slot_available(start, end, &[], &context.existing_blocks) {
                    continue;
                }
                let mut desirability = context.energy_profile.energy_at(start.hour());
                if context
                    .high_energy_ranges
                    .iter()
                    .any(|range| range.contains(candidate.start_minute, candidate.end_minute))
                {
                    desirability += HIGH_ENERGY_RANGE_BONUS;
                }
                ranked.push((desirability, candidate.to_time_slot()));
            }
        }

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        debug!(target: "engine::optimizer", count = ranked.len(), duration_minutes, "available slots ranked");
        Ok(ranked.into_iter().map(|(_, slot)| slot).collect())
    }
}

/// Accumulates one pass's schedule.
struct PassBuilder<'a> {
    optimizer: &'a ScheduleOptimizer,
    context: &'a SchedulingContext,
    options: PlacementOptions,
    schedule: Vec<TimeBlock>,
    conflicts: Vec<SchedulingConflict>,
    alignments: Vec<f64>,
    placed: HashSet<String>,
}

impl<'a> PassBuilder<'a> {
    fn new(
        optimizer: &'a ScheduleOptimizer,
        context: &'a SchedulingContext,
        options: PlacementOptions,
    ) -> Self {
        Self {
            optimizer,
            context,
            options,
            schedule: Vec::new(),
            conflicts: Vec::new(),
            alignments: Vec::new(),
            placed: HashSet::new(),
        }
    }

    /// Places `tasks` as one block titled `title`, trying `classes` in order.
    fn place(
        &mut self,
        tasks: &[&Task],
        title: &str,
        classes: &[SlotClass],
    ) -> AppResult<Option<Placement>> {
        if tasks.is_empty() {
            return Ok(None);
        }

        let optimizer = self.optimizer;
        let requirement = tasks
            .iter()
            .map(|task| optimizer.requirement(task))
            .max_by(|a, b| {
                a.required_energy()
                    .partial_cmp(&b.required_energy())
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or(EnergyRequirement::Medium);
        let deep = tasks.iter().any(|task| optimizer.is_deep(task));
        let due = tasks
            .iter()
            .filter_map(|task| effective_due_date(task, self.context))
            .min();
        let has_goal = tasks.iter().any(|task| task.goal_id.is_some());
        let total = tasks
            .iter()
            .try_fold(0i64, |total, task| total.checked_add(task_duration(task)))
            .ok_or_else(|| {
                AppError::scheduling(format!("'{title}' exceeds the representable duration"))
            })?;
        let duration = self.options.scaled_duration(total);

        let Some(placement) = self.find_slot(duration, requirement, due, has_goal, classes)? else {
            return Ok(None);
        };

        for task in tasks {
            if let Some(task_due) = effective_due_date(task, self.context) {
                if placement.end > task_due {
                    self.conflicts.push(SchedulingConflict {
                        conflict_type: ConflictType::DeadlineRisk,
                        description: format!(
                            "'{}' is scheduled to finish after its due date {}",
                            task.title,
                            task_due.to_rfc3339()
                        ),
                        severity: ConflictSeverity::Medium,
                        suggestions: vec!["Free an earlier slot for this task".to_string()],
                        task_id: Some(task.id.clone()),
                    });
                }
            }
            self.placed.insert(task.id.clone());
        }

        self.alignments.push(placement.score.energy_match);
        self.schedule.push(build_block(
            tasks,
            title,
            placement.start,
            placement.end,
            block_type_for(requirement, deep),
        ));
        Ok(Some(placement))
    }

    /// Best-scoring available slot on the first day of the window that has one.
    fn find_slot(
        &self,
        duration: i64,
        requirement: EnergyRequirement,
        due: Option<DateTime<Utc>>,
        has_goal: bool,
        classes: &[SlotClass],
    ) -> AppResult<Option<Placement>> {
        let context = self.context;
        let settings = &self.optimizer.settings;
        let step = self
            .options
            .step_minutes
            .unwrap_or(context.working_window.step_minutes);
        let padding = self.options.padding_minutes.max(0);
        if duration > context.working_window.length_minutes() {
            return Ok(None);
        }

        for class in classes.iter().filter(|class| class.is_usable(context)) {
            for offset in 0..settings.scheduling_window_days.max(0) {
                let date = schedule_utils::add_days(context.planning_date, offset)?;
                let mut best: Option<Placement> = None;

                for candidate in slot_generator::candidate_slots_with_step(
                    date,
                    duration,
                    &context.working_window,
                    step,
                ) {
                    let (start, end) = candidate.bounds()?;
                    if start < context.now {
                        continue;
                    }
                    let energy_level = context.energy_profile.energy_at(start.hour());
                    if !class.admits(&candidate, energy_level, context) {
                        continue;
                    }
                    let reserved_start = schedule_utils::add_minutes(start, -padding)?;
                    let reserved_end = schedule_utils::add_minutes(end, padding)?;
                    if !is_slot_available(
                        reserved_start,
                        reserved_end,
                        &self.schedule,
                        &context.existing_blocks,
                    ) {
                        continue;
                    }

                    let score = slot_scorer::score_slot(
                        energy_level,
                        requirement,
                        due,
                        has_goal,
                        context.now,
                        &settings.scoring_weights,
                    );
                    let placement = Placement {
                        start,
                        end,
                        energy_level,
                        score,
                    };
                    if self.options.earliest_fit {
                        return Ok(Some(placement));
                    }
                    if best
                        .as_ref()
                        .map_or(true, |current| score.total > current.score.total)
                    {
                        best = Some(placement);
                    }
                }

                if best.is_some() {
                    return Ok(best);
                }
            }
        }
        Ok(None)
    }

    fn finish(mut self, pass: SchedulingPass, tasks: &[Task]) -> Option<PassOutcome> {
        if !tasks.is_empty() && self.placed.is_empty() {
            return None;
        }

        for task in tasks.iter().filter(|task| !self.placed.contains(&task.id)) {
            self.conflicts.push(unplaced_conflict(task, self.context));
        }
        sort_conflicts(&mut self.conflicts);
        self.schedule.sort_by_key(|block| block.start_time);

        let quality = self.quality(tasks);
        let reasoning = format!(
            "{}: placed {} of {} tasks in {} blocks with {} conflicts",
            pass_label(pass),
            tasks
                .iter()
                .filter(|task| self.placed.contains(&task.id))
                .count(),
            tasks.len(),
            self.schedule.len(),
            self.conflicts.len()
        );

        Some(PassOutcome {
            result: SchedulingResult {
                schedule: self.schedule,
                conflicts: self.conflicts,
                alternatives: Vec::new(),
                reasoning,
                confidence: quality,
                pass,
            },
            quality,
        })
    }

    fn quality(&self, tasks: &[Task]) -> f64 {
        let weights = &self.optimizer.settings.quality;
        let alignment = if self.alignments.is_empty() {
            1.0
        } else {
            self.alignments.iter().sum::<f64>() / self.alignments.len() as f64
        };

        let urgent: Vec<&Task> = tasks
            .iter()
            .filter(|task| {
                let due = effective_due_date(task, self.context);
                slot_scorer::deadline_urgency(due, self.context.now) >= URGENT_THRESHOLD
            })
            .collect();
        let coverage = if urgent.is_empty() {
            1.0
        } else {
            urgent
                .iter()
                .filter(|task| self.placed.contains(&task.id))
                .count() as f64
                / urgent.len() as f64
        };

        schedule_utils::clamp_unit(
            weights.base - weights.conflict_penalty * self.conflicts.len() as f64
                + weights.energy_weight * alignment
                + weights.coverage_weight * coverage,
        )
    }
}

/// Terminal result when even the fallback layout cannot be produced.
pub fn error_schedule(err: &AppError) -> SchedulingResult {
    warn!(target: "engine::optimizer", error = %err, "returning error schedule");
    SchedulingResult {
        schedule: Vec::new(),
        conflicts: vec![SchedulingConflict {
            conflict_type: ConflictType::SchedulingFailure,
            description: format!("Scheduling failed: {err}"),
            severity: ConflictSeverity::Critical,
            suggestions: vec![
                "Check working hours and task estimates".to_string(),
                "Retry once the inputs are corrected".to_string(),
            ],
            task_id: None,
        }],
        alternatives: Vec::new(),
        reasoning: format!("Scheduling failed: {err}"),
        confidence: 0.0,
        pass: SchedulingPass::ErrorFallback,
    }
}

pub(crate) fn task_duration(task: &Task) -> i64 {
    task.estimated_minutes.max(MIN_TASK_MINUTES)
}

pub(crate) fn block_type_for(requirement: EnergyRequirement, deep: bool) -> BlockType {
    if deep {
        BlockType::Deep
    } else {
        match requirement {
            EnergyRequirement::High => BlockType::Focus,
            EnergyRequirement::Low => BlockType::Shallow,
            EnergyRequirement::Medium => BlockType::Work,
        }
    }
}

/// Block covering `tasks`; a single task keeps its own links.
pub(crate) fn build_block(
    tasks: &[&Task],
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    block_type: BlockType,
) -> TimeBlock {
    let mut block = TimeBlock::new(title, start, end, block_type);
    if let [task] = tasks {
        block.description = task.description.clone();
        block.task_id = Some(task.id.clone());
        block.project_id = task.project_id.clone();
    } else {
        block.description = tasks
            .iter()
            .map(|task| task.title.as_str())
            .collect::<Vec<_>>()
            .join("; ");
    }
    for task in tasks {
        if let Some(goal_id) = &task.goal_id {
            if !block.goal_ids.contains(goal_id) {
                block.goal_ids.push(goal_id.clone());
            }
        }
    }
    if let Some(first) = tasks.first() {
        block.domain_id = first.domain_id.clone();
        block.user_id = first.user_id.clone();
    }
    block
}

fn unplaced_conflict(task: &Task, context: &SchedulingContext) -> SchedulingConflict {
    match effective_due_date(task, context) {
        Some(due) => SchedulingConflict {
            conflict_type: ConflictType::DeadlineRisk,
            description: format!(
                "'{}' could not be placed before its due date {}",
                task.title,
                due.to_rfc3339()
            ),
            severity: ConflictSeverity::High,
            suggestions: vec![
                "Extend working hours".to_string(),
                format!("Reduce the scope of '{}'", task.title),
                "Negotiate a later due date".to_string(),
            ],
            task_id: Some(task.id.clone()),
        },
        None => SchedulingConflict {
            conflict_type: ConflictType::Unscheduled,
            description: format!("'{}' did not fit in the scheduling window", task.title),
            severity: ConflictSeverity::Medium,
            suggestions: vec![
                "Free up time in the coming two weeks".to_string(),
                "Split the task into smaller pieces".to_string(),
            ],
            task_id: Some(task.id.clone()),
        },
    }
}

fn sort_conflicts(conflicts: &mut [SchedulingConflict]) {
    conflicts.sort_by(|a, b| b.severity.cmp(&a.severity));
}

fn compare_due(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn pass_label(pass: SchedulingPass) -> &'static str {
    match pass {
        SchedulingPass::DeadlinePressure => "Deadline pressure",
        SchedulingPass::EnergyOptimization => "Energy optimization",
        SchedulingPass::GoalAlignment => "Goal alignment",
        SchedulingPass::UserPreference => "User preference",
        SchedulingPass::BasicFallback => "Basic fallback",
        SchedulingPass::ErrorFallback => "Error fallback",
        SchedulingPass::ExistingSchedule => "Existing schedule",
    }
}
