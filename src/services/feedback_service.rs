use tracing::info;

use crate::models::replanning::RePlanningResult;

/// Observer notified after every re-planning decision.
pub trait ReplanningFeedback: Send + Sync {
    fn on_replan(&self, result: &RePlanningResult);
}

/// Emits each decision as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl ReplanningFeedback for TracingFeedback {
    fn on_replan(&self, result: &RePlanningResult) {
        info!(
            target: "engine::feedback",
            strategy = %result.strategy,
            confidence = result.confidence,
            changes = result.changes.len(),
            energy_impact = result.impact.energy_impact.as_str(),
            goals_affected = result.impact.goals_affected.len(),
            deadlines_at_risk = result.impact.deadlines_risk.len(),
            "re-planning decision"
        );
    }
}
