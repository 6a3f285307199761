use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::goal::Goal;
use crate::models::scheduling::AlternativeSchedule;
use crate::models::task::Task;
use crate::models::time_block::TimeBlock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    SessionEnd,
    Overrun,
    MissedBlock,
    ExternalInterrupt,
    EnergyChange,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::SessionEnd => "session_end",
            TriggerType::Overrun => "overrun",
            TriggerType::MissedBlock => "missed_block",
            TriggerType::ExternalInterrupt => "external_interrupt",
            TriggerType::EnergyChange => "energy_change",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger-specific payload; only the fields relevant to the trigger type are read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TriggerContext {
    #[serde(default)]
    pub overrun_duration: Option<i64>,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub energy_drop: Option<f64>,
    #[serde(default)]
    pub current_energy: Option<f64>,
    #[serde(default)]
    pub current_schedule: Vec<TimeBlock>,
    #[serde(default)]
    pub remaining_tasks: Vec<Task>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub missed_blocks: Vec<TimeBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RePlanningTrigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub context: TriggerContext,
}

impl RePlanningTrigger {
    pub fn new(trigger_type: TriggerType, context: TriggerContext) -> Self {
        Self {
            trigger_type,
            context,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyHint {
    MinimalChange,
    SaveDay,
    SaveGoal,
    SaveEnergy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RePlanningOptions {
    #[serde(default)]
    pub strategy: Option<StrategyHint>,
    #[serde(default)]
    pub priority_goals: Vec<String>,
}

impl RePlanningOptions {
    pub fn with_strategy(strategy: StrategyHint) -> Self {
        Self {
            strategy: Some(strategy),
            priority_goals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DisruptionSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DisruptionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisruptionSeverity::Low => "low",
            DisruptionSeverity::Medium => "medium",
            DisruptionSeverity::High => "high",
            DisruptionSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for DisruptionSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a trigger against the current schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisruptionAnalysis {
    pub severity: DisruptionSeverity,
    pub working_hours_remaining: f64,
    pub disruption_minutes: i64,
    pub affected_block_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationStrategy {
    MicroAdjustment,
    GoalReprioritization,
    EmergencySimplification,
    ScheduleShift,
    BlockCompression,
    MissedBlockRecovery,
    EnergyAdaptation,
    EmergencyFallback,
}

impl AdaptationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdaptationStrategy::MicroAdjustment => "micro_adjustment",
            AdaptationStrategy::GoalReprioritization => "goal_reprioritization",
            AdaptationStrategy::EmergencySimplification => "emergency_simplification",
            AdaptationStrategy::ScheduleShift => "schedule_shift",
            AdaptationStrategy::BlockCompression => "block_compression",
            AdaptationStrategy::MissedBlockRecovery => "missed_block_recovery",
            AdaptationStrategy::EnergyAdaptation => "energy_adaptation",
            AdaptationStrategy::EmergencyFallback => "emergency_fallback",
        }
    }
}

impl fmt::Display for AdaptationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Moved,
    Shortened,
    Postponed,
    Cancelled,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Moved => "moved",
            ChangeType::Shortened => "shortened",
            ChangeType::Postponed => "postponed",
            ChangeType::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub original_block: TimeBlock,
    #[serde(default)]
    pub new_block: Option<TimeBlock>,
    pub reasoning: String,
}

impl ScheduleChange {
    /// Falls back to a generic reasoning so the change is never undocumented.
    pub fn new(
        change_type: ChangeType,
        original_block: TimeBlock,
        new_block: Option<TimeBlock>,
        reasoning: impl Into<String>,
    ) -> Self {
        let reasoning = reasoning.into();
        let reasoning = if reasoning.trim().is_empty() {
            format!("Block '{}' {}", original_block.title, change_type.as_str())
        } else {
            reasoning
        };
        Self {
            change_type,
            original_block,
            new_block,
            reasoning,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnergyImpact {
    Positive,
    Neutral,
    Negative,
}

impl EnergyImpact {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyImpact::Positive => "positive",
            EnergyImpact::Neutral => "neutral",
            EnergyImpact::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplanImpact {
    pub goals_affected: Vec<String>,
    pub deadlines_risk: Vec<String>,
    pub energy_impact: EnergyImpact,
}

impl ReplanImpact {
    pub fn neutral() -> Self {
        Self {
            goals_affected: Vec::new(),
            deadlines_risk: Vec::new(),
            energy_impact: EnergyImpact::Neutral,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RePlanningResult {
    pub confidence: f64,
    pub new_schedule: Vec<TimeBlock>,
    pub changes: Vec<ScheduleChange>,
    pub alternatives: Vec<AlternativeSchedule>,
    pub reasoning: String,
    pub impact: ReplanImpact,
    pub strategy: AdaptationStrategy,
}

/// One entry of the engine's bounded adaptation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationRecord {
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
    #[serde(default)]
    pub severity: Option<DisruptionSeverity>,
    pub strategy: AdaptationStrategy,
    pub confidence: f64,
    pub change_count: usize,
}
