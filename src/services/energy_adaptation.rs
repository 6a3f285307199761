use chrono::{DateTime, Timelike, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::replanning::{AdaptationStrategy, ChangeType, EnergyImpact};
use crate::models::settings::EngineSettings;
use crate::models::time_block::{BlockType, TimeBlock};
use crate::services::adaptation_strategies::{ScheduleEdit, StrategyOutcome};

const STEADY_CONFIDENCE: f64 = 0.9;
const ADAPTED_CONFIDENCE: f64 = 0.75;

/// Typical alertness by hour of day.
const DIURNAL_CURVE: [f64; 24] = [
    0.2, 0.2, 0.2, 0.2, 0.2, 0.2, // 0-5
    0.4, 0.5, 0.6, 0.8, 0.9, 0.85, // 6-11
    0.6, 0.5, 0.55, 0.65, 0.7, 0.6, // 12-17
    0.5, 0.45, 0.4, 0.35, 0.3, 0.25, // 18-23
];

pub fn expected_energy(hour: u32) -> f64 {
    DIURNAL_CURVE
        .get(hour as usize)
        .copied()
        .unwrap_or(DIURNAL_CURVE[0])
}

/// Energy level a block of this type runs best at.
pub fn optimal_energy(block_type: BlockType) -> f64 {
    match block_type {
        BlockType::Deep => 0.8,
        BlockType::Focus => 0.7,
        BlockType::Meeting => 0.6,
        BlockType::Work => 0.5,
        BlockType::Shallow => 0.4,
        BlockType::Admin => 0.3,
        BlockType::Travel => 0.3,
        BlockType::Break | BlockType::Buffer => 0.2,
    }
}

/// Lighter variant when energy is short, more demanding one when it is plentiful.
pub fn substitute_type(block_type: BlockType, energy_is_low: bool) -> Option<BlockType> {
    if block_type.is_fixed() {
        return None;
    }
    match (block_type, energy_is_low) {
        (BlockType::Deep | BlockType::Focus, true) => Some(BlockType::Work),
        (BlockType::Work | BlockType::Shallow, true) => Some(BlockType::Admin),
        (BlockType::Admin | BlockType::Shallow | BlockType::Work, false) => Some(BlockType::Focus),
        _ => None,
    }
}

pub fn adapt_to_energy_change(
    current_energy: f64,
    schedule: &[TimeBlock],
    now: DateTime<Utc>,
    settings: &EngineSettings,
) -> AppResult<StrategyOutcome> {
    if !(0.0..=1.0).contains(&current_energy) {
        return Err(AppError::validation_with_details(
            "current energy must be within [0, 1]",
            json!({ "currentEnergy": current_energy }),
        ));
    }

    let expected = expected_energy(now.hour());
    let drift = current_energy - expected;
    let mut edit = ScheduleEdit::new(schedule);

    if drift.abs() <= settings.energy_drift_threshold {
        debug!(target: "engine::replanning", current_energy, expected, "energy within expected range");
        return Ok(edit.finish(
            AdaptationStrategy::EnergyAdaptation,
            STEADY_CONFIDENCE,
            EnergyImpact::Neutral,
            format!(
                "Energy {current_energy:.2} is close to the expected {expected:.2}; schedule unchanged"
            ),
        ));
    }

    let mut upcoming: Vec<&TimeBlock> = schedule
        .iter()
        .filter(|block| block.is_upcoming(now))
        .collect();
    upcoming.sort_by_key(|block| block.start_time);

    for block in upcoming {
        let optimal = optimal_energy(block.block_type);
        if (current_energy - optimal).abs() <= settings.energy_mismatch_threshold {
            continue;
        }
        let energy_is_low = current_energy < optimal;
        let Some(replacement) = substitute_type(block.block_type, energy_is_low) else {
            continue;
        };
        let mut adapted = block.clone();
        adapted.block_type = replacement;
        edit.record(
            ChangeType::Moved,
            block,
            Some(adapted),
            format!(
                "Switched '{}' from {} to {} to match energy {current_energy:.2}",
                block.title, block.block_type, replacement
            ),
        );
    }

    let changed = edit.changes.len();
    info!(
        target: "engine::replanning",
        current_energy,
        expected,
        drift,
        changed,
        "schedule adapted to energy change"
    );

    let direction = if drift < 0.0 { "below" } else { "above" };
    Ok(edit.finish(
        AdaptationStrategy::EnergyAdaptation,
        if changed > 0 {
            ADAPTED_CONFIDENCE
        } else {
            STEADY_CONFIDENCE
        },
        if changed > 0 {
            EnergyImpact::Positive
        } else {
            EnergyImpact::Neutral
        },
        format!(
            "Energy {current_energy:.2} is {direction} the expected {expected:.2}; adjusted {changed} blocks"
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0)
            .single()
            .expect("valid datetime")
    }

    fn block(title: &str, hour: u32, block_type: BlockType) -> TimeBlock {
        TimeBlock::new(title, at(hour), at(hour) + Duration::minutes(60), block_type)
    }

    #[test]
    fn small_drift_is_a_no_op() -> AppResult<()> {
        let schedule = vec![block("Deep dive", 11, BlockType::Deep)];
        let outcome = adapt_to_energy_change(0.8, &schedule, at(10), &EngineSettings::default())?;
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.new_schedule, schedule);
        Ok(())
    }

    #[test]
    fn energy_crash_downgrades_demanding_blocks_only() -> AppResult<()> {
        let schedule = vec![
            block("Architecture", 11, BlockType::Deep),
            block("Client call", 12, BlockType::Meeting),
            block("Filing", 13, BlockType::Admin),
        ];
        let outcome = adapt_to_energy_change(0.2, &schedule, at(10), &EngineSettings::default())?;

        assert_eq!(outcome.changes.len(), 1);
        let change = &outcome.changes[0];
        assert_eq!(change.change_type, ChangeType::Moved);
        let adapted = change.new_block.as_ref().expect("adapted block");
        assert_eq!(adapted.block_type, BlockType::Work);
        assert_eq!(adapted.start_time, change.original_block.start_time);
        assert_eq!(adapted.end_time, change.original_block.end_time);
        Ok(())
    }

    #[test]
    fn out_of_range_energy_is_rejected() {
        assert!(adapt_to_energy_change(1.4, &[], at(10), &EngineSettings::default()).is_err());
    }
}
