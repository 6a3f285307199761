use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::goal::Goal;
use crate::models::preferences::{BufferPreferences, Deadline, EnergyProfile, UserPreferences};
use crate::models::time_block::TimeBlock;

/// Candidate interval for a task. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
    pub days: Vec<String>,
}

/// Caller-supplied inputs for a scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConstraints {
    #[serde(default)]
    pub user_preferences: UserPreferences,
    #[serde(default)]
    pub energy_profile: EnergyProfile,
    #[serde(default)]
    pub buffer_preferences: BufferPreferences,
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
    #[serde(default)]
    pub existing_blocks: Vec<TimeBlock>,
    #[serde(default)]
    pub goals: Vec<Goal>,
}

/// Half-open minute-of-day range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteRange {
    pub start: u32,
    pub end: u32,
}

impl MinuteRange {
    pub fn contains(&self, start: u32, end: u32) -> bool {
        start >= self.start && end <= self.end
    }
}

/// Working day bounds plus the slot step derived from context-switching preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub start_minute: u32,
    pub end_minute: u32,
    pub step_minutes: u32,
}

impl WorkingWindow {
    pub fn length_minutes(&self) -> i64 {
        self.end_minute as i64 - self.start_minute as i64
    }
}

/// Normalized view of [`SchedulingConstraints`] the optimizer works from.
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    pub preferences: UserPreferences,
    pub energy_profile: EnergyProfile,
    pub buffer_preferences: BufferPreferences,
    pub deadlines: HashMap<String, DateTime<Utc>>,
    pub existing_blocks: Vec<TimeBlock>,
    pub goals: Vec<Goal>,
    pub working_window: WorkingWindow,
    pub high_energy_ranges: Vec<MinuteRange>,
    pub deep_work_ranges: Vec<MinuteRange>,
    pub now: DateTime<Utc>,
    pub planning_date: NaiveDate,
}

impl SchedulingContext {
    pub fn goal(&self, goal_id: &str) -> Option<&Goal> {
        self.goals.iter().find(|goal| goal.id == goal_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    DeadlineRisk,
    EnergyMismatch,
    Unscheduled,
    Overlap,
    SchedulingFailure,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::DeadlineRisk => "deadline_risk",
            ConflictType::EnergyMismatch => "energy_mismatch",
            ConflictType::Unscheduled => "unscheduled",
            ConflictType::Overlap => "overlap",
            ConflictType::SchedulingFailure => "scheduling_failure",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConflictSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::Low => "low",
            ConflictSeverity::Medium => "medium",
            ConflictSeverity::High => "high",
            ConflictSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub description: String,
    pub severity: ConflictSeverity,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPass {
    DeadlinePressure,
    EnergyOptimization,
    GoalAlignment,
    UserPreference,
    BasicFallback,
    ErrorFallback,
    ExistingSchedule,
}

impl SchedulingPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingPass::DeadlinePressure => "deadline_pressure",
            SchedulingPass::EnergyOptimization => "energy_optimization",
            SchedulingPass::GoalAlignment => "goal_alignment",
            SchedulingPass::UserPreference => "user_preference",
            SchedulingPass::BasicFallback => "basic_fallback",
            SchedulingPass::ErrorFallback => "error_fallback",
            SchedulingPass::ExistingSchedule => "existing_schedule",
        }
    }
}

impl fmt::Display for SchedulingPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeSchedule {
    pub name: String,
    pub description: String,
    pub schedule: Vec<TimeBlock>,
    pub tradeoffs: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingResult {
    pub schedule: Vec<TimeBlock>,
    pub conflicts: Vec<SchedulingConflict>,
    pub alternatives: Vec<AlternativeSchedule>,
    pub reasoning: String,
    pub confidence: f64,
    pub pass: SchedulingPass,
}
