use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub priority: GoalPriority,
    /// Target hours per week the user wants to invest in this goal.
    #[serde(default)]
    pub time_allocation_target: f64,
    #[serde(default)]
    pub domain_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl GoalPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPriority::Low => "low",
            GoalPriority::Medium => "medium",
            GoalPriority::High => "high",
            GoalPriority::Critical => "critical",
        }
    }

    pub fn is_high_or_above(&self) -> bool {
        matches!(self, GoalPriority::High | GoalPriority::Critical)
    }
}

impl fmt::Display for GoalPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for GoalPriority {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low" => Ok(GoalPriority::Low),
            "medium" => Ok(GoalPriority::Medium),
            "high" => Ok(GoalPriority::High),
            "critical" => Ok(GoalPriority::Critical),
            other => Err(format!("unsupported goal priority: {other}")),
        }
    }
}

/// Highest priority among the goals a block references, `Low` when none resolve.
pub fn highest_priority(goal_ids: &[String], goals: &[Goal]) -> GoalPriority {
    goal_ids
        .iter()
        .filter_map(|id| goals.iter().find(|goal| &goal.id == id))
        .map(|goal| goal.priority)
        .max()
        .unwrap_or(GoalPriority::Low)
}
