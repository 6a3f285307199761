use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_ENERGY_LEVEL: f64 = 0.5;

/// Time-of-day range, both ends "HH:MM".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: "09:00".to_string(),
            end: "17:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContextSwitching {
    pub minimum_block_duration: i64,
}

impl Default for ContextSwitching {
    fn default() -> Self {
        Self {
            minimum_block_duration: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeepWorkPreferences {
    #[serde(default)]
    pub preferred_times: Vec<TimeRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnergyManagement {
    #[serde(default)]
    pub high_energy_times: Vec<TimeRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub context_switching: ContextSwitching,
    #[serde(default)]
    pub deep_work_preferences: DeepWorkPreferences,
    #[serde(default)]
    pub energy_management: EnergyManagement,
}

/// Expected alertness per hour of day, keyed "0".."23".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnergyProfile {
    #[serde(default)]
    pub hourly_profile: BTreeMap<String, f64>,
}

impl EnergyProfile {
    pub fn from_levels(levels: impl IntoIterator<Item = (u32, f64)>) -> Self {
        Self {
            hourly_profile: levels
                .into_iter()
                .map(|(hour, level)| (hour.to_string(), level))
                .collect(),
        }
    }

    pub fn energy_at(&self, hour: u32) -> f64 {
        self.hourly_profile
            .get(&hour.to_string())
            .copied()
            .filter(|level| level.is_finite())
            .map(|level| level.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_ENERGY_LEVEL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BufferPreferences {
    #[serde(default)]
    pub between_blocks_minutes: i64,
    #[serde(default)]
    pub before_meetings_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    pub task_id: String,
    pub due_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_profile_defaults_missing_hours() {
        let profile = EnergyProfile::from_levels([(9, 0.9), (14, 1.7)]);
        assert_eq!(profile.energy_at(9), 0.9);
        assert_eq!(profile.energy_at(14), 1.0);
        assert_eq!(profile.energy_at(3), 0.5);
    }

    #[test]
    fn preferences_deserialize_with_defaults() {
        let prefs: UserPreferences =
            serde_json::from_str(r#"{"workingHours":{"start":"08:30","end":"16:00"}}"#)
                .expect("preferences json");
        assert_eq!(prefs.working_hours.start, "08:30");
        assert_eq!(prefs.context_switching.minimum_block_duration, 15);
        assert!(prefs.deep_work_preferences.preferred_times.is_empty());
    }
}
