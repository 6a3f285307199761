use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl BlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStatus::Planned => "planned",
            BlockStatus::InProgress => "in_progress",
            BlockStatus::Completed => "completed",
            BlockStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    #[default]
    Work,
    Break,
    Focus,
    Deep,
    Shallow,
    Meeting,
    Admin,
    Buffer,
    Travel,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Work => "work",
            BlockType::Break => "break",
            BlockType::Focus => "focus",
            BlockType::Deep => "deep",
            BlockType::Shallow => "shallow",
            BlockType::Meeting => "meeting",
            BlockType::Admin => "admin",
            BlockType::Buffer => "buffer",
            BlockType::Travel => "travel",
        }
    }

    /// Types bound to other people or places; energy adaptation leaves them alone.
    pub fn is_fixed(&self) -> bool {
        matches!(
            self,
            BlockType::Meeting | BlockType::Break | BlockType::Buffer | BlockType::Travel
        )
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BlockType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "work" => Ok(BlockType::Work),
            "break" => Ok(BlockType::Break),
            "focus" => Ok(BlockType::Focus),
            "deep" => Ok(BlockType::Deep),
            "shallow" => Ok(BlockType::Shallow),
            "meeting" => Ok(BlockType::Meeting),
            "admin" => Ok(BlockType::Admin),
            "buffer" => Ok(BlockType::Buffer),
            "travel" => Ok(BlockType::Travel),
            other => Err(format!("unsupported block type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: BlockStatus,
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    #[serde(default)]
    pub goal_ids: Vec<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub domain_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub actual_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_end_time: Option<DateTime<Utc>>,
}

impl TimeBlock {
    /// Fresh planned block with a generated id.
    pub fn new(
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        block_type: BlockType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            start_time,
            end_time,
            status: BlockStatus::Planned,
            block_type,
            goal_ids: Vec::new(),
            task_id: None,
            project_id: None,
            domain_id: String::new(),
            user_id: String::new(),
            actual_start_time: None,
            actual_end_time: None,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// Planned or running; completed and cancelled blocks no longer hold time.
    pub fn is_active(&self) -> bool {
        matches!(self.status, BlockStatus::Planned | BlockStatus::InProgress)
    }

    /// Active block that has not started yet at `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.start_time >= now
    }

    /// Copy of the block moved to `start_time`, keeping its duration.
    pub fn moved_to(&self, start_time: DateTime<Utc>) -> Self {
        let duration = self.end_time - self.start_time;
        Self {
            start_time,
            end_time: start_time + duration,
            ..self.clone()
        }
    }

    /// Copy of the block starting at `start_time` and lasting `minutes`.
    pub fn resized(&self, start_time: DateTime<Utc>, minutes: i64) -> Self {
        Self {
            start_time,
            end_time: start_time + Duration::minutes(minutes),
            ..self.clone()
        }
    }
}
