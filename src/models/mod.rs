pub mod goal;
pub mod preferences;
pub mod replanning;
pub mod scheduling;
pub mod settings;
pub mod task;
pub mod time_block;
