use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Lifecycle state of a task.
///
/// The string form (serde and [`std::str::FromStr`]) is the upper-case name,
/// e.g. `"EXECUTOR_ERROR"`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Queued,
    Initializing,
    Running,
    Complete,
    SystemError,
    ExecutorError,
    Canceling,
    Canceled,
}

impl State {
    /// `QUEUED`, `INITIALIZING` or `RUNNING`.
    pub fn is_executing(self) -> bool {
        matches!(self, State::Queued | State::Initializing | State::Running)
    }

    /// Terminal states. `CANCELING` is neither executing nor finished.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            State::Complete | State::SystemError | State::ExecutorError | State::Canceled
        )
    }
}

/// Timestamps reported for one executor within one attempt slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutorLog {
    pub executor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Everything one cluster has reported about its attempt at a task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskLog {
    pub cluster_id: String,
    /// Attempt slots; each slot is the executor sequence of one (re)run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<Vec<ExecutorLog>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Index-addressed lines. An empty string in a report means "unchanged".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_logs: Vec<String>,
}

/// The mutable, versioned projection of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: String,
    pub state: State,
    /// Empty until a cluster claims the task.
    pub cluster_id: String,
    pub logs: Vec<TaskLog>,
    pub creation_time: DateTime<Utc>,
    /// Optimistic-concurrency token; bumped by every accepted write.
    pub status_resource_version: i64,
}

impl TaskStatus {
    /// Status of a freshly submitted task.
    pub fn queued(id: impl Into<String>, creation_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            state: State::Queued,
            cluster_id: String::new(),
            logs: Vec::new(),
            creation_time,
            status_resource_version: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    #[default]
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Input {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub file_type: FileType,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub file_type: FileType,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GpuResource {
    pub count: f64,
    #[serde(rename = "type", default)]
    pub gpu_type: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_cores: i32,
    pub ram_gb: f64,
    pub disk_gb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk_gb: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuResource>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Executor {
    pub image: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub workdir: String,
    #[serde(default)]
    pub stdin: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalBucketAuthInfo {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub ak: String,
    #[serde(default)]
    pub sk: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketsAuthInfo {
    #[serde(default)]
    pub read_only: Vec<String>,
    #[serde(default)]
    pub read_write: Vec<String>,
    #[serde(default)]
    pub external: Vec<ExternalBucketAuthInfo>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BioosInfoMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aai_passport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_tos: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets_auth_info: Option<BucketsAuthInfo>,
}

/// Account / submission linkage of a task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BioosInfo {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub submission_id: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<BioosInfoMeta>,
}

/// A submitted task: immutable payload plus its status projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub status: TaskStatus,
    pub name: String,
    pub description: String,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub resources: Option<Resources>,
    pub executors: Vec<Executor>,
    pub volumes: Vec<String>,
    pub tags: HashMap<String, String>,
    pub bioos_info: Option<BioosInfo>,
    pub priority_value: i64,
}

/// The client-supplied part of a [`Task`].
///
/// The service owns the ID, creation time and initial state, so they are not
/// part of a submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub resources: Option<Resources>,
    pub executors: Vec<Executor>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub bioos_info: Option<BioosInfo>,
    #[serde(default)]
    pub priority_value: i64,
}

impl Task {
    /// Attach a queued status to a submission.
    pub fn from_submission(
        id: impl Into<String>,
        creation_time: DateTime<Utc>,
        submission: TaskSubmission,
    ) -> Self {
        let TaskSubmission {
            name,
            description,
            inputs,
            outputs,
            resources,
            executors,
            volumes,
            tags,
            bioos_info,
            priority_value,
        } = submission;
        Self {
            status: TaskStatus::queued(id, creation_time),
            name,
            description,
            inputs,
            outputs,
            resources,
            executors,
            volumes,
            tags,
            bioos_info,
            priority_value,
        }
    }

    pub fn id(&self) -> &str {
        &self.status.id
    }
}
