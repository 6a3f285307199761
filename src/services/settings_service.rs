use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::settings::{EngineSettings, QualityWeights, ScoringWeights};
use crate::services::schedule_utils;

const KEY_SCORING_WEIGHTS: &str = "scoringWeights";
const KEY_QUALITY: &str = "quality";
const KEY_END_OF_DAY: &str = "endOfDayHour";
const KEY_FALLBACK_START: &str = "fallbackStart";
const KEY_HISTORY_CAPACITY: &str = "historyCapacity";
const KEY_WINDOW_DAYS: &str = "schedulingWindowDays";
const KEY_SEARCH_DAYS: &str = "slotSearchDays";
const KEY_COMPRESSION_RATIO: &str = "maxCompressionRatio";
const KEY_SIMPLIFY_FACTOR: &str = "simplifyFactor";
const KEY_ENERGY_DRIFT: &str = "energyDriftThreshold";
const KEY_ENERGY_MISMATCH: &str = "energyMismatchThreshold";

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdateInput {
    pub scoring_weights: Option<ScoringWeights>,
    pub quality: Option<QualityWeights>,
    pub scheduling_window_days: Option<i64>,
    pub slot_search_days: Option<i64>,
    pub fallback_start: Option<String>,
    pub end_of_day_hour: Option<u32>,
    pub history_capacity: Option<usize>,
    pub max_compression_ratio: Option<f64>,
    pub simplify_factor: Option<f64>,
    pub energy_drift_threshold: Option<f64>,
    pub energy_mismatch_threshold: Option<f64>,
}

/// Cached engine settings, optionally backed by a JSON file.
pub struct SettingsService {
    path: Option<PathBuf>,
    cache: RwLock<Option<EngineSettings>>,
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::in_memory(EngineSettings::default())
    }
}

impl SettingsService {
    pub fn in_memory(settings: EngineSettings) -> Self {
        Self {
            path: None,
            cache: RwLock::new(Some(settings)),
        }
    }

    /// Binds to `path`; a missing file reads as defaults until the first save.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let service = Self {
            path: Some(path.as_ref().to_path_buf()),
            cache: RwLock::new(None),
        };
        service.get()?;
        Ok(service)
    }

    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        let settings: EngineSettings = serde_json::from_str(raw)?;
        validate(&settings)?;
        Ok(Self::in_memory(settings))
    }

    pub fn get(&self) -> AppResult<EngineSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.read_from_disk()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<EngineSettings> {
        let mut current = self.get()?;

        if let Some(weights) = input.scoring_weights {
            current.scoring_weights = weights;
        }
        if let Some(quality) = input.quality {
            current.quality = quality;
        }
        if let Some(days) = input.scheduling_window_days {
            current.scheduling_window_days = days;
        }
        if let Some(days) = input.slot_search_days {
            current.slot_search_days = days;
        }
        if let Some(start) = input.fallback_start {
            current.fallback_start = start.trim().to_string();
        }
        if let Some(hour) = input.end_of_day_hour {
            current.end_of_day_hour = hour;
        }
        if let Some(capacity) = input.history_capacity {
            current.history_capacity = capacity;
        }
        if let Some(ratio) = input.max_compression_ratio {
            current.max_compression_ratio = ratio;
        }
        if let Some(factor) = input.simplify_factor {
            current.simplify_factor = factor;
        }
        if let Some(threshold) = input.energy_drift_threshold {
            current.energy_drift_threshold = threshold;
        }
        if let Some(threshold) = input.energy_mismatch_threshold {
            current.energy_mismatch_threshold = threshold;
        }

        validate(&current)?;
        self.save(&current)?;

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(current.clone());
        }
        info!(target: "engine::settings", "engine settings updated");
        Ok(current)
    }

    /// Writes `settings` to the backing file, if any.
    pub fn save(&self, settings: &EngineSettings) -> AppResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(settings)?;
        fs::write(path, raw)?;
        debug!(target: "engine::settings", path = %path.display(), "settings written");
        Ok(())
    }

    fn read_from_disk(&self) -> AppResult<EngineSettings> {
        let Some(path) = self.path.as_ref() else {
            return Ok(EngineSettings::default());
        };
        if !path.exists() {
            warn!(target: "engine::settings", path = %path.display(), "settings file missing; using defaults");
            return Ok(EngineSettings::default());
        }
        let raw = fs::read_to_string(path)?;
        let settings: EngineSettings = serde_json::from_str(&raw)?;
        validate(&settings)?;
        Ok(settings)
    }
}

pub fn validate(settings: &EngineSettings) -> AppResult<()> {
    let weights = &settings.scoring_weights;
    for (name, value) in [
        ("energy", weights.energy),
        ("deadline", weights.deadline),
        ("goal", weights.goal),
        ("contextSwitch", weights.context_switch),
        ("preference", weights.preference),
        ("buffer", weights.buffer),
    ] {
        ensure_unit(KEY_SCORING_WEIGHTS, name, value)?;
    }

    let quality = &settings.quality;
    for (name, value) in [
        ("base", quality.base),
        ("conflictPenalty", quality.conflict_penalty),
        ("energyWeight", quality.energy_weight),
        ("coverageWeight", quality.coverage_weight),
    ] {
        ensure_unit(KEY_QUALITY, name, value)?;
    }

    if settings.end_of_day_hour > 24 {
        return Err(AppError::config(KEY_END_OF_DAY, "hour must be between 0 and 24"));
    }
    schedule_utils::parse_hhmm(&settings.fallback_start)
        .map_err(|_| AppError::config(KEY_FALLBACK_START, "expected HH:MM"))?;
    if settings.history_capacity == 0 {
        return Err(AppError::config(KEY_HISTORY_CAPACITY, "must keep at least one record"));
    }
    if settings.scheduling_window_days < 1 {
        return Err(AppError::config(KEY_WINDOW_DAYS, "must cover at least one day"));
    }
    if settings.slot_search_days < 1 {
        return Err(AppError::config(KEY_SEARCH_DAYS, "must cover at least one day"));
    }
    ensure_unit(KEY_COMPRESSION_RATIO, "value", settings.max_compression_ratio)?;
    ensure_unit(KEY_SIMPLIFY_FACTOR, "value", settings.simplify_factor)?;
    ensure_unit(KEY_ENERGY_DRIFT, "value", settings.energy_drift_threshold)?;
    ensure_unit(KEY_ENERGY_MISMATCH, "value", settings.energy_mismatch_threshold)?;
    Ok(())
}

fn ensure_unit(key: &str, field: &str, value: f64) -> AppResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AppError::config(
            key,
            format!("{field} must be within [0, 1], got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_returned_when_no_file_exists() -> AppResult<()> {
        let temp_dir = TempDir::new()?;
        let service = SettingsService::load(temp_dir.path().join("engine.json"))?;
        assert_eq!(service.get()?, EngineSettings::default());
        Ok(())
    }

    #[test]
    fn update_persists_to_disk() -> AppResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config").join("engine.json");
        let service = SettingsService::load(&path)?;

        let updated = service.update(SettingsUpdateInput {
            end_of_day_hour: Some(20),
            fallback_start: Some(" 08:30 ".to_string()),
            ..Default::default()
        })?;
        assert_eq!(updated.end_of_day_hour, 20);
        assert_eq!(updated.fallback_start, "08:30");

        let reloaded = SettingsService::load(&path)?;
        assert_eq!(reloaded.get()?.end_of_day_hour, 20);
        Ok(())
    }

    #[test]
    fn invalid_updates_are_rejected_and_not_cached() -> AppResult<()> {
        let service = SettingsService::default();
        let err = service
            .update(SettingsUpdateInput {
                max_compression_ratio: Some(1.5),
                ..Default::default()
            })
            .expect_err("ratio above one");
        assert!(matches!(err, AppError::Config { .. }));
        assert_eq!(service.get()?.max_compression_ratio, 0.25);
        Ok(())
    }

    #[test]
    fn partial_json_fills_in_defaults() -> AppResult<()> {
        let raw = r#"{"endOfDayHour":19,"scoringWeights":{"energy":0.4}}"#;
        let service = SettingsService::from_json_str(raw)?;
        let settings = service.get()?;
        assert_eq!(settings.end_of_day_hour, 19);
        assert_eq!(settings.scoring_weights.energy, 0.4);
        assert_eq!(settings.scoring_weights.deadline, 0.30);
        assert_eq!(settings.history_capacity, 50);
        Ok(())
    }
}
