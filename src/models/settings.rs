use serde::{Deserialize, Serialize};

/// Relative weights of the slot-scoring terms.
///
/// Only `energy`, `deadline` and `goal` enter the score today; the remaining
/// weights are carried so stored configurations stay stable when the scorer
/// grows those terms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    pub energy: f64,
    pub deadline: f64,
    pub goal: f64,
    pub context_switch: f64,
    pub preference: f64,
    pub buffer: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            energy: 0.25,
            deadline: 0.30,
            goal: 0.20,
            context_switch: 0.10,
            preference: 0.10,
            buffer: 0.05,
        }
    }
}

/// Constants of the pass-quality formula
/// `base - conflict_penalty * conflicts + energy_weight * alignment + coverage_weight * coverage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityWeights {
    pub base: f64,
    pub conflict_penalty: f64,
    pub energy_weight: f64,
    pub coverage_weight: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            conflict_penalty: 0.1,
            energy_weight: 0.3,
            coverage_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub scoring_weights: ScoringWeights,
    pub quality: QualityWeights,
    pub scheduling_window_days: i64,
    pub slot_search_days: i64,
    pub minimum_slot_step_minutes: u32,
    pub fallback_start: String,
    pub fallback_buffer_minutes: i64,
    pub fallback_confidence: f64,
    pub end_of_day_hour: u32,
    pub history_capacity: usize,
    pub micro_adjustment_max_minutes: i64,
    pub max_compression_ratio: f64,
    pub min_compressible_minutes: i64,
    pub max_extension_minutes: i64,
    pub max_extendable_minutes: i64,
    pub simplify_factor: f64,
    pub simplify_floor_minutes: i64,
    pub recovery_compression_target: f64,
    pub min_recovery_minutes: i64,
    pub energy_drift_threshold: f64,
    pub energy_mismatch_threshold: f64,
    pub low_energy_threshold: f64,
    pub conservative_duration_factor: f64,
    pub conservative_buffer_minutes: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scoring_weights: ScoringWeights::default(),
            quality: QualityWeights::default(),
            scheduling_window_days: 14,
            slot_search_days: 7,
            minimum_slot_step_minutes: 15,
            fallback_start: "09:00".to_string(),
            fallback_buffer_minutes: 15,
            fallback_confidence: 0.3,
            end_of_day_hour: 18,
            history_capacity: 50,
            micro_adjustment_max_minutes: 15,
            max_compression_ratio: 0.25,
            min_compressible_minutes: 30,
            max_extension_minutes: 30,
            max_extendable_minutes: 120,
            simplify_factor: 0.6,
            simplify_floor_minutes: 30,
            recovery_compression_target: 0.8,
            min_recovery_minutes: 30,
            energy_drift_threshold: 0.3,
            energy_mismatch_threshold: 0.4,
            low_energy_threshold: 0.3,
            conservative_duration_factor: 1.25,
            conservative_buffer_minutes: 15,
        }
    }
}
