pub mod adaptation_strategies;
pub mod alternatives;
pub mod availability;
pub mod context_builder;
pub mod energy_adaptation;
pub mod feedback_service;
pub mod recovery;
pub mod replanning_service;
pub mod schedule_optimizer;
pub mod schedule_utils;
pub mod settings_service;
pub mod slot_generator;
pub mod slot_scorer;
pub mod task_classifier;
