use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The only `block_reason` value the core itself recognizes. Everything
/// else stored in that column is opaque to the scheduler.
pub const BLOCK_REASON_AWAITING_JUDGE: &str = "awaiting_judge";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The role an agent plays in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Worker,
    Judge,
    Tester,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planner => "planner",
            Self::Worker => "worker",
            Self::Judge => "judge",
            Self::Tester => "tester",
        };
        f.write_str(s)
    }
}

impl FromStr for AgentRole {
    type Err = AgentRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planner" => Ok(Self::Planner),
            "worker" => Ok(Self::Worker),
            "judge" => Ok(Self::Judge),
            "tester" => Ok(Self::Tester),
            other => Err(AgentRoleParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AgentRole`] string.
#[derive(Debug, Clone)]
pub struct AgentRoleParseError(pub String);

impl fmt::Display for AgentRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid agent role: {:?}", self.0)
    }
}

impl std::error::Error for AgentRoleParseError {}

// ---------------------------------------------------------------------------

/// Liveness/assignment state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Offline,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}

impl FromStr for AgentStatus {
    type Err = AgentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            other => Err(AgentStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AgentStatus`] string.
#[derive(Debug, Clone)]
pub struct AgentStatusParseError(pub String);

impl fmt::Display for AgentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid agent status: {:?}", self.0)
    }
}

impl std::error::Error for AgentStatusParseError {}

// ---------------------------------------------------------------------------

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Blocked,
    Done,
    Failed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "blocked" => Ok(Self::Blocked),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Terminal/in-flight status of a single run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for RunStatus {
    type Err = RunStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(RunStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RunStatus`] string.
#[derive(Debug, Clone)]
pub struct RunStatusParseError(pub String);

impl fmt::Display for RunStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid run status: {:?}", self.0)
    }
}

impl std::error::Error for RunStatusParseError {}

// ---------------------------------------------------------------------------

/// Kind of externally-visible output a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Pr,
    Commit,
    CiResult,
    Branch,
    BaseRepoDiff,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pr => "pr",
            Self::Commit => "commit",
            Self::CiResult => "ci_result",
            Self::Branch => "branch",
            Self::BaseRepoDiff => "base_repo_diff",
        };
        f.write_str(s)
    }
}

impl FromStr for ArtifactType {
    type Err = ArtifactTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pr" => Ok(Self::Pr),
            "commit" => Ok(Self::Commit),
            "ci_result" => Ok(Self::CiResult),
            "branch" => Ok(Self::Branch),
            "base_repo_diff" => Ok(Self::BaseRepoDiff),
            other => Err(ArtifactTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ArtifactType`] string.
#[derive(Debug, Clone)]
pub struct ArtifactTypeParseError(pub String);

impl fmt::Display for ArtifactTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid artifact type: {:?}", self.0)
    }
}

impl std::error::Error for ArtifactTypeParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A fleet participant: planner, worker, judge, or tester.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: String,
    pub role: AgentRole,
    pub status: AgentStatus,
    pub current_task_id: Option<Uuid>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A unit of autonomous code work.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub goal: String,
    pub kind: String,
    pub status: TaskStatus,
    pub block_reason: Option<String>,
    pub priority: i32,
    pub risk_level: String,
    pub allowed_paths: Vec<String>,
    pub commands: Vec<String>,
    pub timebox_minutes: i32,
    pub retry_count: i32,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// An edge in the task dependency DAG: `task_id` depends on `depends_on`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskDependency {
    pub task_id: Uuid,
    pub depends_on: Uuid,
}

/// One execution attempt of a task by one agent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Run {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cost_tokens: Option<i64>,
    pub log_path: Option<String>,
    pub error_message: Option<String>,
    pub error_meta: Option<serde_json::Value>,
}

/// A short-lived, time-bounded exclusive claim on a task by one agent.
///
/// `task_id` is UNIQUE at the schema level; that constraint is the
/// atomic-claim primitive: at most one lease can exist for a task at a
/// time, and the insert that creates it is the claim itself.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lease {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// An externally visible output of a run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Artifact {
    pub id: Uuid,
    pub run_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    #[sqlx(rename = "ref")]
    #[serde(rename = "ref")]
    pub ref_: Option<String>,
    pub url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_role_display_roundtrip() {
        let variants = [
            AgentRole::Planner,
            AgentRole::Worker,
            AgentRole::Judge,
            AgentRole::Tester,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: AgentRole = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn agent_role_invalid() {
        assert!("bogus".parse::<AgentRole>().is_err());
    }

    #[test]
    fn agent_status_display_roundtrip() {
        let variants = [AgentStatus::Idle, AgentStatus::Busy, AgentStatus::Offline];
        for v in &variants {
            let s = v.to_string();
            let parsed: AgentStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn agent_status_invalid() {
        assert!("napping".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn task_status_display_roundtrip() {
        let variants = [
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Blocked,
            TaskStatus::Done,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: TaskStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn task_status_invalid() {
        assert!("nope".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn run_status_display_roundtrip() {
        let variants = [
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: RunStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn run_status_invalid() {
        assert!("pending".parse::<RunStatus>().is_err());
    }

    #[test]
    fn artifact_type_display_roundtrip() {
        let variants = [
            ArtifactType::Pr,
            ArtifactType::Commit,
            ArtifactType::CiResult,
            ArtifactType::Branch,
            ArtifactType::BaseRepoDiff,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: ArtifactType = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn artifact_type_invalid() {
        assert!("zip".parse::<ArtifactType>().is_err());
    }
}
