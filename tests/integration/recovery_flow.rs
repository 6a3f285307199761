use std::sync::Arc;

use adaptive_planner::models::replanning::{AdaptationStrategy, ChangeType, EnergyImpact};
use adaptive_planner::models::settings::EngineSettings;
use adaptive_planner::models::time_block::{BlockType, TimeBlock};
use adaptive_planner::services::replanning_service::ReplanningEngine;
use adaptive_planner::services::schedule_optimizer::ScheduleOptimizer;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0)
        .single()
        .expect("valid datetime")
}

fn block(title: &str, start: DateTime<Utc>, minutes: i64, block_type: BlockType) -> TimeBlock {
    TimeBlock::new(title, start, start + Duration::minutes(minutes), block_type)
}

fn engine() -> ReplanningEngine {
    ReplanningEngine::new(
        Arc::new(ScheduleOptimizer::default()),
        EngineSettings::default(),
    )
}

#[test]
fn ten_minutes_left_cancels_every_missed_block() {
    let missed = vec![
        block("Write summary", at(14, 0), 60, BlockType::Focus),
        block("Expense report", at(16, 0), 30, BlockType::Admin),
    ];

    let result = engine().suggest_recovery_at(&missed, &[], at(17, 50));

    assert_eq!(result.strategy, AdaptationStrategy::MissedBlockRecovery);
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.impact.energy_impact, EnergyImpact::Positive);
    assert_eq!(result.changes.len(), missed.len());
    assert!(result
        .changes
        .iter()
        .all(|change| change.change_type == ChangeType::Cancelled && change.new_block.is_none()));
    assert!(result.new_schedule.is_empty());
}

#[test]
fn midday_recovery_simplifies_without_overlaps() {
    let missed = vec![block("Morning writing", at(9, 0), 60, BlockType::Focus)];
    let remaining = vec![
        block("Feature work", at(13, 0), 90, BlockType::Work),
        block("Admin sweep", at(15, 0), 60, BlockType::Admin),
    ];

    let result = engine().suggest_recovery_at(&missed, &remaining, at(11, 0));

    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.impact.energy_impact, EnergyImpact::Positive);
    assert!(result.new_schedule.iter().any(|candidate| candidate.title.starts_with("Catch-up")));
    for (idx, first) in result.new_schedule.iter().enumerate() {
        for second in &result.new_schedule[idx + 1..] {
            assert!(
                !first.overlaps(second.start_time, second.end_time),
                "'{}' overlaps '{}'",
                first.title,
                second.title
            );
        }
    }

    let names: Vec<&str> = result
        .alternatives
        .iter()
        .map(|alternative| alternative.name.as_str())
        .collect();
    assert!(names.contains(&"compression"));
    assert!(names.contains(&"postponement"));
    assert!(names.contains(&"interleaving"));
}

#[test]
fn postponement_alternative_moves_missed_work_into_tomorrows_hours() {
    let missed = vec![block("Research spike", at(9, 0), 60, BlockType::Deep)];
    let remaining = vec![block("Pairing", at(14, 0), 60, BlockType::Work)];

    let result = engine().suggest_recovery_at(&missed, &remaining, at(11, 0));

    let postponement = result
        .alternatives
        .iter()
        .find(|alternative| alternative.name == "postponement")
        .expect("postponement alternative");
    let tomorrow = NaiveDate::from_ymd_opt(2025, 3, 4).expect("valid date");
    let deferred = postponement
        .schedule
        .iter()
        .find(|candidate| candidate.id == missed[0].id)
        .expect("missed block deferred");
    assert_eq!(deferred.start_time.date_naive(), tomorrow);
    assert!(deferred.start_time.hour() >= 9);
    assert_eq!(deferred.duration_minutes(), 60);
    assert!((postponement.confidence - 0.8).abs() < 1e-9);
}

#[test]
fn recovery_is_recorded_in_history() {
    let engine = engine();
    let missed = vec![block("Standup notes", at(9, 0), 30, BlockType::Admin)];
    engine.suggest_recovery_at(&missed, &[], at(17, 45));

    let history = engine.adaptation_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].strategy, AdaptationStrategy::MissedBlockRecovery);
    assert_eq!(history[0].recorded_at, at(17, 45));
    assert!(!engine.is_emergency_mode());
}

#[test]
fn compression_and_interleaving_stay_within_their_bounds() {
    let missed = vec![block("Spec review", at(9, 0), 30, BlockType::Work)];
    let feature = block("Feature work", at(13, 0), 120, BlockType::Work);
    let admin = block("Admin sweep", at(16, 0), 60, BlockType::Admin);
    let remaining = vec![feature.clone(), admin.clone()];

    let result = engine().suggest_recovery_at(&missed, &remaining, at(11, 0));
    let alternative = |name: &str| {
        result
            .alternatives
            .iter()
            .find(|alternative| alternative.name == name)
            .unwrap_or_else(|| panic!("missing {name} alternative"))
    };

    // Recovers at most 80% of the 30 missed minutes even though more could be freed.
    let compression = alternative("compression");
    let catch_up = compression
        .schedule
        .iter()
        .find(|candidate| candidate.title.starts_with("Catch-up"))
        .expect("catch-up block");
    assert_eq!(catch_up.duration_minutes(), 24);
    let compressed = compression
        .schedule
        .iter()
        .find(|candidate| candidate.id == feature.id)
        .expect("feature block");
    assert_eq!(compressed.duration_minutes(), 96);

    let interleaving = alternative("interleaving");
    for original in &remaining {
        let adjusted = interleaving
            .schedule
            .iter()
            .find(|candidate| candidate.id == original.id)
            .expect("block kept");
        let extension = adjusted.duration_minutes() - original.duration_minutes();
        if original.duration_minutes() < 120 {
            assert!((0..=30).contains(&extension));
        } else {
            assert_eq!(extension, 0);
        }
    }
    let extended = interleaving
        .schedule
        .iter()
        .find(|candidate| candidate.id == admin.id)
        .expect("admin block");
    assert_eq!(extended.duration_minutes(), 90);
    assert_eq!(extended.start_time, admin.start_time);
}
