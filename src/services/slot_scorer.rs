use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::settings::ScoringWeights;
use crate::services::schedule_utils::clamp_unit;
use crate::services::task_classifier::EnergyRequirement;

const SECONDS_PER_DAY: f64 = 86_400.0;
const GOAL_LINKED_ALIGNMENT: f64 = 0.8;
const UNLINKED_ALIGNMENT: f64 = 0.4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotScore {
    pub energy_match: f64,
    pub deadline_urgency: f64,
    pub goal_alignment: f64,
    pub total: f64,
}

pub fn energy_match(energy_level: f64, requirement: EnergyRequirement) -> f64 {
    clamp_unit(1.0 - (clamp_unit(energy_level) - requirement.required_energy()).abs())
}

/// Step function over fractional days until due; overdue work counts as most urgent.
pub fn deadline_urgency(due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(due) = due_date else {
        return 0.0;
    };
    let days = (due - now).num_seconds() as f64 / SECONDS_PER_DAY;
    if days <= 1.0 {
        1.0
    } else if days <= 3.0 {
        0.8
    } else if days <= 7.0 {
        0.6
    } else if days <= 14.0 {
        0.4
    } else {
        0.2
    }
}

pub fn goal_alignment(has_goal: bool) -> f64 {
    if has_goal {
        GOAL_LINKED_ALIGNMENT
    } else {
        UNLINKED_ALIGNMENT
    }
}

pub fn score_slot(
    energy_level: f64,
    requirement: EnergyRequirement,
    due_date: Option<DateTime<Utc>>,
    has_goal: bool,
    now: DateTime<Utc>,
    weights: &ScoringWeights,
) -> SlotScore {
    let energy_match = energy_match(energy_level, requirement);
    let deadline_urgency = deadline_urgency(due_date, now);
    let goal_alignment = goal_alignment(has_goal);
    let total = weights.energy * energy_match
        + weights.deadline * deadline_urgency
        + weights.goal * goal_alignment;

    SlotScore {
        energy_match,
        deadline_urgency,
        goal_alignment,
        total,
    }
}
