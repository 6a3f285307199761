use adaptive_planner::models::goal::{Goal, GoalPriority};
use adaptive_planner::models::preferences::WorkingHours;
use adaptive_planner::models::scheduling::{ConflictType, SchedulingConstraints, SchedulingPass};
use adaptive_planner::models::task::{Task, TaskPriority};
use adaptive_planner::models::time_block::{BlockType, TimeBlock};
use adaptive_planner::services::schedule_optimizer::{ScheduleOptimizer, SchedulingEngine};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0)
        .single()
        .expect("valid datetime")
}

fn task(id: &str, title: &str, minutes: i64) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        estimated_minutes: minutes,
        due_date: None,
        goal_id: None,
        project_id: None,
        priority: TaskPriority::Medium,
        domain_id: "work".to_string(),
        user_id: "user-1".to_string(),
    }
}

fn assert_no_overlaps(blocks: &[TimeBlock]) {
    for (idx, block) in blocks.iter().enumerate() {
        for other in &blocks[idx + 1..] {
            assert!(
                !block.overlaps(other.start_time, other.end_time),
                "'{}' overlaps '{}'",
                block.title,
                other.title
            );
        }
    }
}

#[test]
fn single_task_lands_inside_working_hours() {
    let optimizer = ScheduleOptimizer::default();
    let now = monday_morning();
    let result = optimizer.schedule_at(
        &[task("t1", "Write quarterly report", 60)],
        &SchedulingConstraints::default(),
        now,
    );

    assert_eq!(result.schedule.len(), 1);
    let block = &result.schedule[0];
    assert!(block.start_time >= now);
    assert!(block.start_time.hour() >= 9);
    assert!(block.end_time.hour() * 60 + block.end_time.minute() <= 17 * 60);
    assert_eq!(block.duration_minutes(), 60);
    assert_eq!(block.task_id.as_deref(), Some("t1"));
    assert!(result.confidence > 0.3);
    assert!(result.conflicts.is_empty());

    let names: Vec<&str> = result
        .alternatives
        .iter()
        .map(|alternative| alternative.name.as_str())
        .collect();
    assert_eq!(names, ["Conservative", "Aggressive", "Energy-Optimized"]);
}

#[test]
fn urgent_task_wins_the_only_remaining_slot() {
    let optimizer = ScheduleOptimizer::default();
    let now = monday_morning();

    let mut constraints = SchedulingConstraints::default();
    constraints.user_preferences.working_hours = WorkingHours {
        start: "09:00".to_string(),
        end: "10:00".to_string(),
    };
    // Every later day of the window is already booked.
    for day in 1..14 {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
            .single()
            .expect("valid datetime")
            + Duration::days(day);
        constraints.existing_blocks.push(TimeBlock::new(
            format!("Booked {day}"),
            start,
            start + Duration::hours(1),
            BlockType::Meeting,
        ));
    }

    let mut later = task("later", "Offsite logistics", 60);
    later.due_date = Some(now + Duration::days(10));
    let mut urgent = task("urgent", "Hotfix rollout", 60);
    urgent.due_date = Some(now + Duration::hours(12));

    let result = optimizer.schedule_at(&[later, urgent], &constraints, now);

    assert_eq!(result.schedule.len(), 1);
    assert_eq!(result.schedule[0].task_id.as_deref(), Some("urgent"));
    assert_eq!(result.schedule[0].start_time.hour(), 9);
    assert!(result.conflicts.iter().any(|conflict| {
        conflict.conflict_type == ConflictType::DeadlineRisk
            && conflict.task_id.as_deref() == Some("later")
            && !conflict.suggestions.is_empty()
    }));
}

#[test]
fn generated_blocks_never_overlap_each_other_or_existing_ones() {
    let optimizer = ScheduleOptimizer::default();
    let now = monday_morning();
    let mut constraints = SchedulingConstraints::default();
    let standup = now + Duration::hours(2);
    constraints.existing_blocks.push(TimeBlock::new(
        "Standup",
        standup,
        standup + Duration::minutes(30),
        BlockType::Meeting,
    ));

    let tasks: Vec<Task> = (0..6)
        .map(|idx| task(&format!("t{idx}"), &format!("Task {idx}"), 45 + idx * 15))
        .collect();
    let result = optimizer.schedule_at(&tasks, &constraints, now);

    assert_eq!(result.schedule.len(), tasks.len());
    assert_no_overlaps(&result.schedule);
    for block in &result.schedule {
        assert!(!block.overlaps(standup, standup + Duration::minutes(30)));
    }
    assert!((0.0..=1.0).contains(&result.confidence));
}

#[test]
fn zero_length_working_day_uses_basic_fallback() {
    let optimizer = ScheduleOptimizer::default();
    let now = monday_morning();
    let mut constraints = SchedulingConstraints::default();
    constraints.user_preferences.working_hours = WorkingHours {
        start: "09:00".to_string(),
        end: "09:00".to_string(),
    };

    let result = optimizer.schedule_at(
        &[task("a", "Email triage", 30), task("b", "Budget review", 30)],
        &constraints,
        now,
    );

    assert_eq!(result.pass, SchedulingPass::BasicFallback);
    assert_eq!(result.confidence, 0.3);
    assert_eq!(result.schedule.len(), 2);
    assert_eq!(result.schedule[0].start_time, now + Duration::hours(1));
    assert_eq!(
        result.schedule[1].start_time - result.schedule[0].end_time,
        Duration::minutes(15)
    );
}

#[test]
fn available_slots_leave_inputs_untouched() {
    let optimizer = ScheduleOptimizer::default();
    let now = monday_morning();
    let mut constraints = SchedulingConstraints::default();
    let busy = now + Duration::hours(1);
    constraints.existing_blocks.push(TimeBlock::new(
        "Busy",
        busy,
        busy + Duration::hours(2),
        BlockType::Meeting,
    ));
    constraints.goals.push(Goal {
        id: "g1".to_string(),
        title: "Ship the beta".to_string(),
        priority: GoalPriority::High,
        time_allocation_target: 6.0,
        domain_id: "work".to_string(),
        user_id: "user-1".to_string(),
    });
    let snapshot = constraints.clone();

    let slots = optimizer
        .find_available_slots_at(60, &constraints, now)
        .expect("slots");

    assert_eq!(constraints, snapshot);
    assert!(!slots.is_empty());
    assert!(slots.iter().all(|slot| slot.start.as_str() >= "09:00"));
    assert!(slots
        .iter()
        .all(|slot| !(slot.days == ["monday"] && slot.start.as_str() < "11:00")));
}

#[test]
fn existing_schedule_review_flags_overlaps() {
    let optimizer = ScheduleOptimizer::default();
    let now = monday_morning();
    let start = now + Duration::hours(2);
    let blocks = vec![
        TimeBlock::new("Design review", start, start + Duration::hours(1), BlockType::Meeting),
        TimeBlock::new(
            "Roadmap sync",
            start + Duration::minutes(30),
            start + Duration::minutes(90),
            BlockType::Meeting,
        ),
    ];

    let result = optimizer.optimize_existing_at(&blocks, &SchedulingConstraints::default(), now);

    assert_eq!(result.pass, SchedulingPass::ExistingSchedule);
    assert_eq!(result.schedule, blocks);
    assert!(result
        .conflicts
        .iter()
        .any(|conflict| conflict.conflict_type == ConflictType::Overlap));
}
