use std::sync::{Arc, Mutex};

use adaptive_planner::models::goal::{Goal, GoalPriority};
use adaptive_planner::models::replanning::{
    AdaptationStrategy, ChangeType, EnergyImpact, RePlanningOptions, RePlanningResult,
    RePlanningTrigger, StrategyHint, TriggerContext, TriggerType,
};
use adaptive_planner::models::settings::EngineSettings;
use adaptive_planner::models::time_block::{BlockType, TimeBlock};
use adaptive_planner::services::feedback_service::ReplanningFeedback;
use adaptive_planner::services::replanning_service::ReplanningEngine;
use adaptive_planner::services::schedule_optimizer::ScheduleOptimizer;
use chrono::{DateTime, Duration, TimeZone, Utc};

#[derive(Default)]
struct RecordingFeedback {
    strategies: Mutex<Vec<AdaptationStrategy>>,
}

impl ReplanningFeedback for RecordingFeedback {
    fn on_replan(&self, result: &RePlanningResult) {
        self.strategies
            .lock()
            .expect("feedback lock")
            .push(result.strategy);
    }
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0)
        .single()
        .expect("valid datetime")
}

fn block(title: &str, hour: u32, minutes: i64, block_type: BlockType) -> TimeBlock {
    TimeBlock::new(title, at(hour, 0), at(hour, 0) + Duration::minutes(minutes), block_type)
}

fn engine() -> ReplanningEngine {
    ReplanningEngine::new(
        Arc::new(ScheduleOptimizer::default()),
        EngineSettings::default(),
    )
}

fn day_plan() -> Vec<TimeBlock> {
    vec![
        block("Draft proposal", 10, 60, BlockType::Focus),
        block("Team sync", 11, 60, BlockType::Meeting),
        block("Code review", 13, 60, BlockType::Work),
        block("Inbox zero", 14, 60, BlockType::Admin),
    ]
}

#[test]
fn small_overrun_with_minimal_change_delays_one_block() {
    let schedule = day_plan();
    let result = engine().handle_trigger_at(
        &RePlanningTrigger::new(
            TriggerType::Overrun,
            TriggerContext {
                overrun_duration: Some(20),
                current_schedule: schedule.clone(),
                ..Default::default()
            },
        ),
        &RePlanningOptions::with_strategy(StrategyHint::MinimalChange),
        at(9, 30),
    );

    assert_eq!(result.strategy, AdaptationStrategy::MicroAdjustment);
    assert_eq!(result.changes.len(), 1);
    let change = &result.changes[0];
    assert_eq!(change.change_type, ChangeType::Moved);
    assert_eq!(change.original_block.id, schedule[0].id);
    let moved = change.new_block.as_ref().expect("moved block");
    let delay = moved.start_time - change.original_block.start_time;
    assert!(delay > Duration::zero() && delay <= Duration::minutes(15));
    assert_eq!(result.impact.energy_impact, EnergyImpact::Neutral);
    assert_eq!(result.new_schedule.len(), schedule.len());
}

#[test]
fn save_day_compresses_within_bounds() {
    let schedule = day_plan();
    let result = engine().handle_trigger_at(
        &RePlanningTrigger::new(
            TriggerType::ExternalInterrupt,
            TriggerContext {
                estimated_duration: Some(90),
                current_schedule: schedule.clone(),
                ..Default::default()
            },
        ),
        &RePlanningOptions::with_strategy(StrategyHint::SaveDay),
        at(9, 0),
    );

    assert_eq!(result.strategy, AdaptationStrategy::BlockCompression);
    assert_eq!(result.impact.energy_impact, EnergyImpact::Negative);
    assert!((0.5..=0.8).contains(&result.confidence));
    assert!(result
        .changes
        .iter()
        .any(|change| change.change_type == ChangeType::Shortened));
    for change in &result.changes {
        let original = change.original_block.duration_minutes();
        let updated = change
            .new_block
            .as_ref()
            .expect("compressed block")
            .duration_minutes();
        assert!(updated <= original);
        assert!(updated as f64 >= original as f64 * 0.75);
    }
    assert!(result
        .alternatives
        .iter()
        .any(|alternative| alternative.name == "schedule_shift"));
}

#[test]
fn save_goal_keeps_priority_work_on_the_same_day() {
    let mut schedule = day_plan();
    schedule[0].goal_ids = vec!["launch".to_string()];
    let goals = vec![Goal {
        id: "launch".to_string(),
        title: "Product launch".to_string(),
        priority: GoalPriority::Critical,
        time_allocation_target: 10.0,
        domain_id: "work".to_string(),
        user_id: "user-1".to_string(),
    }];

    let result = engine().handle_trigger_at(
        &RePlanningTrigger::new(
            TriggerType::ExternalInterrupt,
            TriggerContext {
                estimated_duration: Some(90),
                current_schedule: schedule.clone(),
                goals,
                ..Default::default()
            },
        ),
        &RePlanningOptions::with_strategy(StrategyHint::SaveGoal),
        at(9, 0),
    );

    assert_eq!(result.strategy, AdaptationStrategy::GoalReprioritization);
    assert_eq!(result.impact.energy_impact, EnergyImpact::Positive);
    let kept = result
        .new_schedule
        .iter()
        .find(|candidate| candidate.id == schedule[0].id)
        .expect("priority block kept");
    assert_eq!(kept.start_time.date_naive(), schedule[0].start_time.date_naive());
    assert!(!result
        .changes
        .iter()
        .any(|change| change.original_block.id == schedule[0].id
            && change.change_type == ChangeType::Postponed));
}

#[test]
fn energy_adaptation_and_history_are_recorded() {
    let feedback = Arc::new(RecordingFeedback::default());
    let engine = engine().with_feedback(feedback.clone());
    let schedule = vec![block("Architecture deep dive", 11, 90, BlockType::Deep)];

    let result = engine.adapt_to_energy_change_at(0.2, &schedule, at(10, 0));
    assert_eq!(result.strategy, AdaptationStrategy::EnergyAdaptation);
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.new_schedule[0].block_type, BlockType::Work);
    assert_eq!(result.new_schedule[0].start_time, schedule[0].start_time);

    let history = engine.adaptation_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].trigger_type, Some(TriggerType::EnergyChange));
    assert_eq!(history[0].change_count, 1);
    assert_eq!(
        *feedback.strategies.lock().expect("feedback lock"),
        vec![AdaptationStrategy::EnergyAdaptation]
    );
}

#[test]
fn out_of_range_energy_returns_emergency_fallback() {
    let result = engine().handle_trigger_at(
        &RePlanningTrigger::new(
            TriggerType::EnergyChange,
            TriggerContext {
                energy_drop: Some(-0.2),
                current_schedule: day_plan(),
                ..Default::default()
            },
        ),
        &RePlanningOptions::default(),
        at(9, 0),
    );

    assert_eq!(result.strategy, AdaptationStrategy::EmergencyFallback);
    assert_eq!(result.confidence, 0.0);
    assert!(result.new_schedule.is_empty());
    assert_eq!(result.impact.energy_impact, EnergyImpact::Negative);
    assert!(!result.reasoning.is_empty());
}

#[test]
fn triggers_deserialize_from_camel_case_json() {
    let raw = r#"{
        "type": "overrun",
        "context": { "overrunDuration": 40, "currentEnergy": 0.6 }
    }"#;
    let trigger: RePlanningTrigger = serde_json::from_str(raw).expect("trigger json");
    assert_eq!(trigger.trigger_type, TriggerType::Overrun);
    assert_eq!(trigger.context.overrun_duration, Some(40));

    let options: RePlanningOptions =
        serde_json::from_str(r#"{"strategy":"save_energy","priorityGoals":["g1"]}"#)
            .expect("options json");
    assert_eq!(options.strategy, Some(StrategyHint::SaveEnergy));
    assert_eq!(options.priority_goals, ["g1"]);
}
