pub mod id;
pub mod logs;
pub mod state;
pub mod types;

pub use id::gen_task_id;
pub use logs::{merge_task_logs, validate_task_log};
pub use types::{
    BioosInfo, BioosInfoMeta, BucketsAuthInfo, Executor, ExecutorLog, ExternalBucketAuthInfo,
    FileType, GpuResource, Input, Output, Resources, State, Task, TaskLog, TaskStatus,
    TaskSubmission,
};
