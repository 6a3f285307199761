use tracing::{debug, warn};

use crate::models::scheduling::{AlternativeSchedule, SchedulingContext, SchedulingPass};
use crate::models::task::Task;
use crate::models::time_block::TimeBlock;
use crate::services::schedule_optimizer::{PlacementOptions, ScheduleOptimizer};

const CONSERVATIVE_CONFIDENCE: f64 = 0.8;
const AGGRESSIVE_CONFIDENCE: f64 = 0.6;
const ENERGY_OPTIMIZED_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlternativeKind {
    Conservative,
    Aggressive,
    EnergyOptimized,
}

impl AlternativeKind {
    pub const ALL: [AlternativeKind; 3] = [
        AlternativeKind::Conservative,
        AlternativeKind::Aggressive,
        AlternativeKind::EnergyOptimized,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AlternativeKind::Conservative => "Conservative",
            AlternativeKind::Aggressive => "Aggressive",
            AlternativeKind::EnergyOptimized => "Energy-Optimized",
        }
    }

    fn confidence(&self) -> f64 {
        match self {
            AlternativeKind::Conservative => CONSERVATIVE_CONFIDENCE,
            AlternativeKind::Aggressive => AGGRESSIVE_CONFIDENCE,
            AlternativeKind::EnergyOptimized => ENERGY_OPTIMIZED_CONFIDENCE,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            AlternativeKind::Conservative => {
                "Inflated estimates with padding around every block"
            }
            AlternativeKind::Aggressive => "Earliest-fit packing at fine granularity, no buffers",
            AlternativeKind::EnergyOptimized => "Tasks matched to the hours that suit their energy",
        }
    }

    fn tradeoffs(&self) -> Vec<String> {
        let items: &[&str] = match self {
            AlternativeKind::Conservative => &[
                "More slack for overruns",
                "Fewer tasks fit into each day",
            ],
            AlternativeKind::Aggressive => &[
                "Finishes work sooner",
                "No room to absorb overruns",
            ],
            AlternativeKind::EnergyOptimized => &[
                "Demanding work lands in peak hours",
                "Deadlines may be served later",
            ],
        };
        items.iter().map(|item| item.to_string()).collect()
    }
}

/// Conservative, aggressive and energy-optimized variants of the same task set.
pub fn generate_alternatives(
    optimizer: &ScheduleOptimizer,
    tasks: &[Task],
    context: &SchedulingContext,
) -> Vec<AlternativeSchedule> {
    AlternativeKind::ALL
        .iter()
        .map(|kind| build_alternative(optimizer, *kind, tasks, context))
        .collect()
}

fn build_alternative(
    optimizer: &ScheduleOptimizer,
    kind: AlternativeKind,
    tasks: &[Task],
    context: &SchedulingContext,
) -> AlternativeSchedule {
    let settings = optimizer.settings();
    let (pass, options) = match kind {
        AlternativeKind::Conservative => (
            SchedulingPass::DeadlinePressure,
            PlacementOptions {
                duration_factor: settings.conservative_duration_factor,
                padding_minutes: context
                    .buffer_preferences
                    .between_blocks_minutes
                    .max(context.buffer_preferences.before_meetings_minutes)
                    .max(settings.conservative_buffer_minutes),
                ..PlacementOptions::default()
            },
        ),
        AlternativeKind::Aggressive => (
            SchedulingPass::DeadlinePressure,
            PlacementOptions {
                step_minutes: Some(settings.minimum_slot_step_minutes),
                earliest_fit: true,
                ..PlacementOptions::default()
            },
        ),
        AlternativeKind::EnergyOptimized => {
            (SchedulingPass::EnergyOptimization, PlacementOptions::default())
        }
    };

    let mut tradeoffs = kind.tradeoffs();
    let schedule = match optimizer.run_pass(pass, tasks, context, options) {
        Ok(Some(outcome)) => {
            let unplaced = tasks.len().saturating_sub(
                tasks
                    .iter()
                    .filter(|task| {
                        outcome
                            .result
                            .schedule
                            .iter()
                            .any(|block| covers_task(block, task))
                    })
                    .count(),
            );
            if unplaced > 0 {
                tradeoffs.push(format!("{unplaced} tasks left unscheduled"));
            }
            outcome.result.schedule
        }
        Ok(None) => {
            tradeoffs.push("No task fits under these rules".to_string());
            Vec::new()
        }
        Err(err) => {
            warn!(target: "engine::optimizer", alternative = kind.label(), error = %err, "alternative failed");
            tradeoffs.push("Could not be computed for this input".to_string());
            Vec::new()
        }
    };

    debug!(
        target: "engine::optimizer",
        alternative = kind.label(),
        blocks = schedule.len(),
        "alternative built"
    );

    AlternativeSchedule {
        name: kind.label().to_string(),
        description: kind.description().to_string(),
        schedule,
        tradeoffs,
        confidence: kind.confidence(),
    }
}

fn covers_task(block: &TimeBlock, task: &Task) -> bool {
    block.task_id.as_deref() == Some(task.id.as_str())
        || (block.task_id.is_none()
            && block.description.split("; ").any(|title| title == task.title))
}
