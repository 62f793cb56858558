use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tes_core::task::{BioosInfo, Executor, FileType, GpuResource, Input, Output, Resources};
use tes_core::{
    ListFilter, ListQuery, State, StatusUpdate, TaskLog, TaskPage, TaskStatus, TaskSubmission,
};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::error::ServerError;

// ── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(nested)]
    pub inputs: Vec<InputRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub outputs: Vec<OutputRequest>,
    #[serde(default)]
    #[validate(nested)]
    pub resources: Option<ResourcesRequest>,
    #[validate(length(min = 1, message = "at least one executor is required"), nested)]
    pub executors: Vec<ExecutorRequest>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub bioos_info: Option<BioosInfo>,
    #[serde(default)]
    pub priority_value: i64,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "input_has_source"))]
pub struct InputRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "absolute_path"))]
    pub path: String,
    #[serde(rename = "type", default)]
    #[schema(value_type = String, example = "FILE")]
    pub file_type: FileType,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct OutputRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "absolute_path"))]
    pub path: String,
    #[serde(rename = "type", default)]
    #[schema(value_type = String, example = "FILE")]
    pub file_type: FileType,
    #[validate(length(min = 1, message = "output url is required"))]
    pub url: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ResourcesRequest {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub cpu_cores: i32,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub ram_gb: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub disk_gb: f64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub boot_disk_gb: Option<i32>,
    #[serde(default)]
    #[validate(nested)]
    pub gpu: Option<GpuRequest>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GpuRequest {
    #[validate(range(exclusive_min = 0.0, message = "gpu count must be positive"))]
    pub count: f64,
    #[serde(rename = "type", default)]
    pub gpu_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct ExecutorRequest {
    #[validate(length(min = 1, message = "executor image is required"))]
    pub image: String,
    #[validate(length(min = 1, message = "executor command is required"))]
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

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateTaskResponse {
    pub id: String,
}

fn absolute_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') {
        return Ok(());
    }
    Err(ValidationError::new("absolute_path").with_message("path must be absolute".into()))
}

fn input_has_source(input: &InputRequest) -> Result<(), ValidationError> {
    if input.url.is_empty() && input.content.is_empty() {
        return Err(ValidationError::new("input_source")
            .with_message("input needs either url or content".into()));
    }
    Ok(())
}

impl From<CreateTaskRequest> for TaskSubmission {
    fn from(req: CreateTaskRequest) -> Self {
        TaskSubmission {
            name: req.name,
            description: req.description,
            inputs: req.inputs.into_iter().map(Into::into).collect(),
            outputs: req.outputs.into_iter().map(Into::into).collect(),
            resources: req.resources.map(Into::into),
            executors: req.executors.into_iter().map(Into::into).collect(),
            volumes: req.volumes,
            tags: req.tags,
            bioos_info: req.bioos_info,
            priority_value: req.priority_value,
        }
    }
}

impl From<InputRequest> for Input {
    fn from(req: InputRequest) -> Self {
        Input {
            name: req.name,
            description: req.description,
            path: req.path,
            file_type: req.file_type,
            url: req.url,
            content: req.content,
        }
    }
}

impl From<OutputRequest> for Output {
    fn from(req: OutputRequest) -> Self {
        Output {
            name: req.name,
            description: req.description,
            path: req.path,
            file_type: req.file_type,
            url: req.url,
        }
    }
}

impl From<ResourcesRequest> for Resources {
    fn from(req: ResourcesRequest) -> Self {
        Resources {
            cpu_cores: req.cpu_cores,
            ram_gb: req.ram_gb,
            disk_gb: req.disk_gb,
            boot_disk_gb: req.boot_disk_gb,
            gpu: req.gpu.map(|gpu| GpuResource {
                count: gpu.count,
                gpu_type: gpu.gpu_type,
            }),
        }
    }
}

impl From<ExecutorRequest> for Executor {
    fn from(req: ExecutorRequest) -> Self {
        Executor {
            image: req.image,
            command: req.command,
            workdir: req.workdir,
            stdin: req.stdin,
            stdout: req.stdout,
            stderr: req.stderr,
            env: req.env,
        }
    }
}

// ── Update ───────────────────────────────────────────────────────────────────

/// A cluster's status report. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    #[schema(example = "RUNNING")]
    pub state: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub logs: Vec<TaskLog>,
}

impl TryFrom<UpdateTaskRequest> for StatusUpdate {
    type Error = ServerError;

    fn try_from(req: UpdateTaskRequest) -> Result<Self, Self::Error> {
        let state = req
            .state
            .as_deref()
            .map(parse_state)
            .transpose()?;
        Ok(StatusUpdate {
            state,
            cluster_id: req.cluster_id,
            logs: req.logs,
        })
    }
}

// ── List ─────────────────────────────────────────────────────────────────────

fn parse_state(s: &str) -> Result<State, ServerError> {
    State::from_str(s).map_err(|_| ServerError::BadRequest(format!("unknown state {s}")))
}

/// Query parameters for listing task statuses.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListTasksQuery {
    /// Defaults to 256, at most 2048.
    #[serde(default)]
    pub page_size: u32,
    /// `next_page_token` of the previous page.
    pub page_token: Option<String>,
    pub name_prefix: Option<String>,
    /// Comma-separated state names, e.g. `QUEUED,RUNNING`.
    pub state: Option<String>,
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub without_cluster: bool,
}

impl TryFrom<ListTasksQuery> for ListQuery {
    type Error = ServerError;

    fn try_from(q: ListTasksQuery) -> Result<Self, Self::Error> {
        let states = q
            .state
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_state)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListQuery {
            page_size: q.page_size,
            page_token: q.page_token,
            filter: ListFilter {
                name_prefix: q.name_prefix.unwrap_or_default(),
                states,
                cluster_id: q.cluster_id.filter(|c| !c.is_empty()),
                without_cluster: q.without_cluster,
            },
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskStatusResponse>,
    /// Absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl From<TaskPage> for ListTasksResponse {
    fn from(page: TaskPage) -> Self {
        ListTasksResponse {
            tasks: page.tasks.into_iter().map(Into::into).collect(),
            next_page_token: page.next_page_token,
        }
    }
}

// ── Views ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskStatusResponse {
    pub id: String,
    #[schema(example = "QUEUED")]
    pub state: String,
    pub cluster_id: String,
    #[schema(value_type = Vec<Object>)]
    pub logs: Vec<TaskLog>,
    pub creation_time: DateTime<Utc>,
    pub status_resource_version: i64,
}

impl From<TaskStatus> for TaskStatusResponse {
    fn from(status: TaskStatus) -> Self {
        TaskStatusResponse {
            id: status.id,
            state: status.state.to_string(),
            cluster_id: status.cluster_id,
            logs: status.logs,
            creation_time: status.creation_time,
            status_resource_version: status.status_resource_version,
        }
    }
}
