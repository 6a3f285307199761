use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::replanning::{
    AdaptationRecord, AdaptationStrategy, DisruptionAnalysis, DisruptionSeverity, EnergyImpact,
    RePlanningOptions, RePlanningResult, RePlanningTrigger, ReplanImpact, StrategyHint, TriggerType,
};
use crate::models::scheduling::SchedulingConstraints;
use crate::models::settings::EngineSettings;
use crate::models::time_block::{BlockStatus, TimeBlock};
use crate::services::adaptation_strategies::{self as strategies, StrategyInput, StrategyOutcome};
use crate::services::energy_adaptation;
use crate::services::feedback_service::ReplanningFeedback;
use crate::services::recovery::{self, RecoveryInput};
use crate::services::schedule_optimizer::SchedulingEngine;
use crate::services::schedule_utils;

const EMERGENCY_HOURS: f64 = 2.0;
const PRESSURED_HOURS: f64 = 4.0;

/// Classifies disruptions and repairs the day's schedule.
///
/// Holds the only mutable engine state: a bounded adaptation history and the
/// emergency-mode flag. Callers are expected to serialize re-planning per user.
pub struct ReplanningEngine {
    scheduler: Arc<dyn SchedulingEngine>,
    settings: EngineSettings,
    constraints: SchedulingConstraints,
    feedback: Option<Arc<dyn ReplanningFeedback>>,
    history: Mutex<VecDeque<AdaptationRecord>>,
    emergency_mode: AtomicBool,
}

impl ReplanningEngine {
    pub fn new(scheduler: Arc<dyn SchedulingEngine>, settings: EngineSettings) -> Self {
        let capacity = settings.history_capacity.max(1);
        Self {
            scheduler,
            settings,
            constraints: SchedulingConstraints::default(),
            feedback: None,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            emergency_mode: AtomicBool::new(false),
        }
    }

    /// Constraints used when recovery asks the scheduler for next-day slots.
    pub fn with_constraints(mut self, constraints: SchedulingConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn ReplanningFeedback>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn handle_trigger(
        &self,
        trigger: &RePlanningTrigger,
        options: &RePlanningOptions,
    ) -> RePlanningResult {
        self.handle_trigger_at(trigger, options, Utc::now())
    }

    pub fn handle_trigger_at(
        &self,
        trigger: &RePlanningTrigger,
        options: &RePlanningOptions,
        now: DateTime<Utc>,
    ) -> RePlanningResult {
        let (result, severity) = match self.try_handle_trigger(trigger, options, now) {
            Ok((result, analysis)) => (result, Some(analysis.severity)),
            Err(err) => (emergency_fallback(&err), None),
        };
        self.complete(Some(trigger.trigger_type), severity, result, now)
    }

    pub fn suggest_recovery(
        &self,
        missed: &[TimeBlock],
        remaining_day: &[TimeBlock],
    ) -> RePlanningResult {
        self.suggest_recovery_at(missed, remaining_day, Utc::now())
    }

    pub fn suggest_recovery_at(
        &self,
        missed: &[TimeBlock],
        remaining_day: &[TimeBlock],
        now: DateTime<Utc>,
    ) -> RePlanningResult {
        let result = self
            .recover(missed, remaining_day, now)
            .unwrap_or_else(|err| emergency_fallback(&err));
        self.complete(Some(TriggerType::MissedBlock), None, result, now)
    }

    pub fn adapt_to_energy_change(
        &self,
        current_energy: f64,
        schedule: &[TimeBlock],
    ) -> RePlanningResult {
        self.adapt_to_energy_change_at(current_energy, schedule, Utc::now())
    }

    pub fn adapt_to_energy_change_at(
        &self,
        current_energy: f64,
        schedule: &[TimeBlock],
        now: DateTime<Utc>,
    ) -> RePlanningResult {
        let result =
            energy_adaptation::adapt_to_energy_change(current_energy, schedule, now, &self.settings)
                .map(|outcome| outcome.into_result(Vec::new()))
                .unwrap_or_else(|err| emergency_fallback(&err));
        self.complete(Some(TriggerType::EnergyChange), None, result, now)
    }

    /// Most recent decisions, oldest first.
    pub fn adaptation_history(&self) -> Vec<AdaptationRecord> {
        match self.history.lock() {
            Ok(history) => history.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn is_emergency_mode(&self) -> bool {
        self.emergency_mode.load(Ordering::SeqCst)
    }

    pub fn reset_emergency_mode(&self) {
        if self.emergency_mode.swap(false, Ordering::SeqCst) {
            info!(target: "engine::replanning", "emergency mode cleared");
        }
    }

    /// Severity, remaining working time and disruption size for `trigger`.
    pub fn analyze_disruption(
        &self,
        trigger: &RePlanningTrigger,
        now: DateTime<Utc>,
    ) -> AppResult<DisruptionAnalysis> {
        validate_trigger(trigger)?;
        let context = &trigger.context;
        let severity = classify_severity(trigger);
        let remaining_minutes =
            schedule_utils::minutes_until_end_of_day(now, self.settings.end_of_day_hour)?;
        let disruption_minutes = context
            .overrun_duration
            .or(context.estimated_duration)
            .unwrap_or(0);

        let affected_block_ids = context
            .current_schedule
            .iter()
            .filter(|block| block.is_upcoming(now))
            .map(|block| block.id.clone())
            .collect();

        Ok(DisruptionAnalysis {
            severity,
            working_hours_remaining: remaining_minutes as f64 / 60.0,
            disruption_minutes,
            affected_block_ids,
        })
    }

    fn try_handle_trigger(
        &self,
        trigger: &RePlanningTrigger,
        options: &RePlanningOptions,
        now: DateTime<Utc>,
    ) -> AppResult<(RePlanningResult, DisruptionAnalysis)> {
        let analysis = self.analyze_disruption(trigger, now)?;
        debug!(
            target: "engine::replanning",
            trigger = %trigger.trigger_type,
            severity = %analysis.severity,
            hours_remaining = analysis.working_hours_remaining,
            disruption = analysis.disruption_minutes,
            affected = analysis.affected_block_ids.len(),
            "disruption analysed"
        );

        let context = &trigger.context;
        if trigger.trigger_type == TriggerType::MissedBlock {
            let missed = if context.missed_blocks.is_empty() {
                context
                    .current_schedule
                    .iter()
                    .filter(|block| block.status == BlockStatus::Planned && block.end_time <= now)
                    .cloned()
                    .collect()
            } else {
                context.missed_blocks.clone()
            };
            let missed_ids: HashSet<&str> = missed.iter().map(|block| block.id.as_str()).collect();
            let remaining: Vec<TimeBlock> = context
                .current_schedule
                .iter()
                .filter(|block| !missed_ids.contains(block.id.as_str()))
                .cloned()
                .collect();
            let result = self.recover(&missed, &remaining, now)?;
            return Ok((result, analysis));
        }

        let input = StrategyInput {
            schedule: &context.current_schedule,
            goals: &context.goals,
            tasks: &context.remaining_tasks,
            priority_goals: &options.priority_goals,
            disruption_minutes: analysis.disruption_minutes,
            remaining_minutes: (analysis.working_hours_remaining * 60.0).round() as i64,
            now,
            settings: &self.settings,
        };

        let strategy = self.select_strategy(options, &analysis, context.current_energy);
        let outcome = run_strategy(strategy, &input)?;
        let alternatives = [AdaptationStrategy::ScheduleShift, AdaptationStrategy::BlockCompression]
            .into_iter()
            .filter(|candidate| *candidate != outcome.strategy)
            .filter_map(|candidate| match run_strategy(candidate, &input) {
                Ok(alternative) => Some(alternative.to_alternative()),
                Err(err) => {
                    debug!(target: "engine::replanning", strategy = %candidate, error = %err, "alternative skipped");
                    None
                }
            })
            .collect();

        Ok((outcome.into_result(alternatives), analysis))
    }

    fn select_strategy(
        &self,
        options: &RePlanningOptions,
        analysis: &DisruptionAnalysis,
        current_energy: Option<f64>,
    ) -> AdaptationStrategy {
        let hint = options.strategy;
        let hours = analysis.working_hours_remaining;
        let energy_is_low =
            current_energy.is_some_and(|energy| energy < self.settings.low_energy_threshold);

        if hint == Some(StrategyHint::MinimalChange)
            || analysis.severity == DisruptionSeverity::Low
        {
            AdaptationStrategy::MicroAdjustment
        } else if hint == Some(StrategyHint::SaveGoal) {
            AdaptationStrategy::GoalReprioritization
        } else if (hint == Some(StrategyHint::SaveEnergy) && energy_is_low)
            || analysis.severity == DisruptionSeverity::Critical
            || hours < EMERGENCY_HOURS
        {
            AdaptationStrategy::EmergencySimplification
        } else if hint == Some(StrategyHint::SaveDay) {
            AdaptationStrategy::BlockCompression
        } else if analysis.severity == DisruptionSeverity::High || hours < PRESSURED_HOURS {
            AdaptationStrategy::GoalReprioritization
        } else if analysis.severity == DisruptionSeverity::Medium {
            AdaptationStrategy::ScheduleShift
        } else {
            AdaptationStrategy::BlockCompression
        }
    }

    fn recover(
        &self,
        missed: &[TimeBlock],
        remaining: &[TimeBlock],
        now: DateTime<Utc>,
    ) -> AppResult<RePlanningResult> {
        let input = RecoveryInput {
            missed,
            remaining,
            scheduler: self.scheduler.as_ref(),
            constraints: &self.constraints,
            now,
            settings: &self.settings,
        };
        let (best, others) = recovery::suggest_recovery(&input)?;
        let alternatives = others
            .iter()
            .map(|plan| {
                let mut alternative = plan.outcome.to_alternative();
                alternative.name = plan.option.as_str().to_string();
                alternative
            })
            .collect();
        Ok(best.outcome.into_result(alternatives))
    }

    fn complete(
        &self,
        trigger_type: Option<TriggerType>,
        severity: Option<DisruptionSeverity>,
        result: RePlanningResult,
        now: DateTime<Utc>,
    ) -> RePlanningResult {
        // Latched until reset_emergency_mode.
        if result.strategy == AdaptationStrategy::EmergencySimplification
            && !self.emergency_mode.swap(true, Ordering::SeqCst)
        {
            warn!(target: "engine::replanning", "emergency mode entered");
        }

        self.record(AdaptationRecord {
            recorded_at: now,
            trigger_type,
            severity,
            strategy: result.strategy,
            confidence: result.confidence,
            change_count: result.changes.len(),
        });

        if let Some(feedback) = self.feedback.as_ref() {
            feedback.on_replan(&result);
        }

        info!(
            target: "engine::replanning",
            trigger = trigger_type.map(|kind| kind.as_str()).unwrap_or("none"),
            strategy = %result.strategy,
            confidence = result.confidence,
            changes = result.changes.len(),
            emergency_mode = self.is_emergency_mode(),
            "re-planning completed"
        );
        result
    }

    fn record(&self, record: AdaptationRecord) {
        let capacity = self.settings.history_capacity.max(1);
        let mut history = match self.history.lock() {
            Ok(history) => history,
            Err(poisoned) => {
                warn!(target: "engine::replanning", "adaptation history lock poisoned; recovering");
                poisoned.into_inner()
            }
        };
        while history.len() >= capacity {
            history.pop_front();
        }
        history.push_back(record);
    }
}

pub fn classify_severity(trigger: &RePlanningTrigger) -> DisruptionSeverity {
    let context = &trigger.context;
    match trigger.trigger_type {
        TriggerType::SessionEnd => DisruptionSeverity::Low,
        TriggerType::MissedBlock => DisruptionSeverity::Medium,
        TriggerType::Overrun => match context.overrun_duration.unwrap_or(0) {
            minutes if minutes > 60 => DisruptionSeverity::High,
            minutes if minutes > 30 => DisruptionSeverity::Medium,
            _ => DisruptionSeverity::Low,
        },
        TriggerType::ExternalInterrupt => match context.estimated_duration.unwrap_or(0) {
            minutes if minutes > 120 => DisruptionSeverity::Critical,
            minutes if minutes > 60 => DisruptionSeverity::High,
            _ => DisruptionSeverity::Medium,
        },
        TriggerType::EnergyChange => {
            let drop = context.energy_drop.unwrap_or(0.0);
            if drop > 0.5 {
                DisruptionSeverity::High
            } else if drop > 0.3 {
                DisruptionSeverity::Medium
            } else {
                DisruptionSeverity::Low
            }
        }
    }
}

fn validate_trigger(trigger: &RePlanningTrigger) -> AppResult<()> {
    let context = &trigger.context;
    for (field, value) in [
        ("energyDrop", context.energy_drop),
        ("currentEnergy", context.current_energy),
    ] {
        if let Some(value) = value {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::validation_with_details(
                    format!("{field} must be within [0, 1]"),
                    json!({ "field": field, "value": value }),
                ));
            }
        }
    }
    for (field, value) in [
        ("overrunDuration", context.overrun_duration),
        ("estimatedDuration", context.estimated_duration),
    ] {
        if let Some(value) = value {
            if value < 0 {
                return Err(AppError::validation_with_details(
                    format!("{field} must not be negative"),
                    json!({ "field": field, "value": value }),
                ));
            }
        }
    }
    Ok(())
}

fn run_strategy(
    strategy: AdaptationStrategy,
    input: &StrategyInput<'_>,
) -> AppResult<StrategyOutcome> {
    match strategy {
        AdaptationStrategy::MicroAdjustment => strategies::micro_adjustment(input),
        AdaptationStrategy::GoalReprioritization => strategies::goal_reprioritization(input),
        AdaptationStrategy::EmergencySimplification => strategies::emergency_simplification(input),
        AdaptationStrategy::ScheduleShift => strategies::schedule_shift(input),
        AdaptationStrategy::BlockCompression => strategies::block_compression(input),
        other => Err(AppError::replanning(format!(
            "{other} is not a trigger-driven strategy"
        ))),
    }
}

/// Result returned whenever re-planning itself fails.
pub fn emergency_fallback(err: &AppError) -> RePlanningResult {
    warn!(target: "engine::replanning", error = %err, "re-planning failed; returning emergency fallback");
    RePlanningResult {
        confidence: 0.0,
        new_schedule: Vec::new(),
        changes: Vec::new(),
        alternatives: Vec::new(),
        reasoning: format!("Re-planning failed: {err}. Please review the schedule manually."),
        impact: ReplanImpact {
            energy_impact: EnergyImpact::Negative,
            ..ReplanImpact::neutral()
        },
        strategy: AdaptationStrategy::EmergencyFallback,
    }
}
