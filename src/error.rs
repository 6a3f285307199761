use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("scheduling failed: {message}")]
    Scheduling { message: String },

    #[error("re-planning failed: {message}")]
    Replanning { message: String },

    #[error("invalid configuration for '{key}': {message}")]
    Config { key: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "engine::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "engine::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn scheduling(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "engine::optimizer", %message, "scheduling error");
        AppError::Scheduling { message }
    }

    pub fn replanning(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "engine::replanning", %message, "re-planning error");
        AppError::Replanning { message }
    }

    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        let key = key.into();
        let message = message.into();
        warn!(target: "engine::settings", %key, %message, "invalid configuration");
        AppError::Config { key, message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "engine::other", %message, "other error");
        AppError::Other(message)
    }

    pub fn details(&self) -> Option<&JsonValue> {
        match self {
            AppError::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
