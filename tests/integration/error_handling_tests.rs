// Degraded and failing paths across the optimizer, the re-planning engine and settings.

use std::sync::Arc;

use adaptive_planner::error::AppError;
use adaptive_planner::models::preferences::WorkingHours;
use adaptive_planner::models::replanning::{
    AdaptationStrategy, EnergyImpact, RePlanningOptions, RePlanningTrigger, TriggerContext,
    TriggerType,
};
use adaptive_planner::models::scheduling::{
    ConflictSeverity, ConflictType, SchedulingConstraints, SchedulingPass,
};
use adaptive_planner::models::settings::EngineSettings;
use adaptive_planner::models::task::{Task, TaskPriority};
use adaptive_planner::services::replanning_service::ReplanningEngine;
use adaptive_planner::services::schedule_optimizer::{ScheduleOptimizer, SchedulingEngine};
use adaptive_planner::services::schedule_utils;
use adaptive_planner::services::settings_service::{SettingsService, SettingsUpdateInput};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::tempdir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0)
        .single()
        .expect("valid datetime")
}

fn task(id: &str, minutes: i64) -> Task {
    Task {
        id: id.to_string(),
        title: format!("Task {id}"),
        description: String::new(),
        estimated_minutes: minutes,
        due_date: None,
        goal_id: None,
        project_id: None,
        priority: TaskPriority::Low,
        domain_id: String::new(),
        user_id: String::new(),
    }
}

fn closed_day() -> SchedulingConstraints {
    let mut constraints = SchedulingConstraints::default();
    constraints.user_preferences.working_hours = WorkingHours {
        start: "12:00".to_string(),
        end: "12:00".to_string(),
    };
    constraints
}

#[test]
fn inverted_working_hours_degrade_to_basic_fallback() {
    let mut constraints = SchedulingConstraints::default();
    constraints.user_preferences.working_hours = WorkingHours {
        start: "17:00".to_string(),
        end: "09:00".to_string(),
    };

    let result = ScheduleOptimizer::default().schedule_at(&[task("a", 45)], &constraints, now());

    assert_eq!(result.pass, SchedulingPass::BasicFallback);
    assert_eq!(result.schedule.len(), 1);
    assert!(result.alternatives.is_empty());
}

#[test]
fn broken_fallback_returns_error_schedule() {
    let optimizer = ScheduleOptimizer::new(EngineSettings {
        fallback_start: "late morning".to_string(),
        ..EngineSettings::default()
    });

    let result = optimizer.schedule_at(&[task("a", 30)], &closed_day(), now());

    assert_eq!(result.pass, SchedulingPass::ErrorFallback);
    assert!(result.schedule.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].severity, ConflictSeverity::Critical);
    assert_eq!(result.conflicts[0].conflict_type, ConflictType::SchedulingFailure);
    assert!(result.alternatives.is_empty());
}

#[test]
fn empty_task_list_is_not_an_error() {
    let result =
        ScheduleOptimizer::default().schedule_at(&[], &SchedulingConstraints::default(), now());

    assert!(result.schedule.is_empty());
    assert!(result.conflicts.is_empty());
    assert!((0.0..=1.0).contains(&result.confidence));
}

#[test]
fn available_slots_reject_invalid_working_hours() {
    let mut constraints = SchedulingConstraints::default();
    constraints.user_preferences.working_hours = WorkingHours {
        start: "nine".to_string(),
        end: "17:00".to_string(),
    };

    let err = ScheduleOptimizer::default()
        .find_available_slots_at(30, &constraints, now())
        .expect_err("invalid working hours");
    assert!(matches!(err, AppError::Validation { .. }));
    assert!(err.details().is_some());
}

#[test]
fn negative_durations_never_escape_the_engine() {
    let engine = ReplanningEngine::new(
        Arc::new(ScheduleOptimizer::default()),
        EngineSettings::default(),
    );
    let result = engine.handle_trigger_at(
        &RePlanningTrigger::new(
            TriggerType::Overrun,
            TriggerContext {
                overrun_duration: Some(-30),
                ..Default::default()
            },
        ),
        &RePlanningOptions::default(),
        now(),
    );

    assert_eq!(result.strategy, AdaptationStrategy::EmergencyFallback);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.impact.energy_impact, EnergyImpact::Negative);
    assert!(result.reasoning.contains("overrunDuration"));
    assert_eq!(engine.adaptation_history().len(), 1);
    assert_eq!(engine.adaptation_history()[0].severity, None);
}

#[test]
fn settings_reject_out_of_range_values() {
    let dir = tempdir().expect("temp dir");
    let service = SettingsService::load(dir.path().join("engine.json")).expect("settings service");

    let err = service
        .update(SettingsUpdateInput {
            end_of_day_hour: Some(25),
            ..Default::default()
        })
        .expect_err("hour out of range");
    assert!(matches!(err, AppError::Config { ref key, .. } if key == "endOfDayHour"));

    let err = service
        .update(SettingsUpdateInput {
            fallback_start: Some("25:99".to_string()),
            ..Default::default()
        })
        .expect_err("bad fallback start");
    assert!(matches!(err, AppError::Config { .. }));

    assert_eq!(service.get().expect("settings"), EngineSettings::default());
    assert!(!dir.path().join("engine.json").exists());
}

#[test]
fn corrupt_settings_file_is_a_serialization_error() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("engine.json");
    std::fs::write(&path, "{ not json").expect("write settings");

    let err = SettingsService::load(&path).err().expect("corrupt file");
    assert!(matches!(err, AppError::Serialization(_)));
}

#[test]
fn malformed_times_carry_details() {
    let err = schedule_utils::parse_hhmm("7pm").expect_err("not HH:MM");
    let details = err.details().expect("details");
    assert_eq!(details["value"], "7pm");
}
