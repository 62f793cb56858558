//! Create-time payload normalization.
//!
//! [`Normalizer`] is invoked once per submission, after the ID is assigned
//! and before the task is persisted. [`ResourceNormalizer`] checks that every
//! input/output path lives under the executor base path, fills in default
//! resource requests and clamps disk / boot disk / GPU requests.

use tracing::warn;

use crate::error::{Result, TaskError};
use crate::task::{Resources, Task};

pub trait Normalizer: Send + Sync + 'static {
    /// Validate and rewrite `task` in place. Any error aborts the submission.
    fn normalize(&self, task: &mut Task) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskGbOptions {
    pub enable: bool,
    pub min: f64,
    pub max: f64,
    /// Round the result up to a whole number of GB.
    pub is_integer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootDiskGbOptions {
    pub enable: bool,
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpuOptions {
    pub enable: bool,
    pub is_integer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// Absolute, slash-terminated prefix every input/output path must share.
    pub executor_base_path: String,
    pub disk_gb: DiskGbOptions,
    pub boot_disk_gb: BootDiskGbOptions,
    pub gpu: GpuOptions,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            executor_base_path: "/cromwell-executions/".to_owned(),
            disk_gb: DiskGbOptions {
                enable: true,
                min: 20.0,
                max: 8192.0,
                is_integer: true,
            },
            boot_disk_gb: BootDiskGbOptions {
                enable: true,
                min: 40,
                max: 100,
            },
            gpu: GpuOptions {
                enable: true,
                is_integer: true,
            },
        }
    }
}

impl NormalizeOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.executor_base_path.starts_with('/') {
            return Err(TaskError::invalid(format!(
                "executor base path {} should be an absolute path",
                self.executor_base_path
            )));
        }
        if !self.executor_base_path.ends_with('/') {
            return Err(TaskError::invalid(format!(
                "executor base path {} should end with a slash",
                self.executor_base_path
            )));
        }
        if self.disk_gb.enable {
            check_bounds("diskGB", self.disk_gb.min, self.disk_gb.max)?;
        }
        if self.boot_disk_gb.enable {
            check_bounds(
                "bootDiskGB",
                f64::from(self.boot_disk_gb.min),
                f64::from(self.boot_disk_gb.max),
            )?;
        }
        Ok(())
    }
}

fn check_bounds(what: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() {
        return Err(TaskError::invalid(format!(
            "normalize {what} bounds should be finite numbers"
        )));
    }
    if min > max {
        return Err(TaskError::invalid(format!(
            "normalize {what} min should not exceed max"
        )));
    }
    if min < 0.0 || max < 0.0 {
        return Err(TaskError::invalid(format!(
            "normalize {what} bounds should not be negative"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ResourceNormalizer {
    opts: NormalizeOptions,
}

impl ResourceNormalizer {
    pub fn new(opts: NormalizeOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.opts
    }
}

impl Normalizer for ResourceNormalizer {
    fn normalize(&self, task: &mut Task) -> Result<()> {
        check_paths(task, &self.opts.executor_base_path)?;
        let id = task.status.id.clone();
        let resources = task.resources.get_or_insert_with(Resources::default);
        set_default_resources(&id, resources);
        normalize_disk_gb(&id, resources, &self.opts.disk_gb);
        normalize_boot_disk_gb(&id, resources, &self.opts.boot_disk_gb);
        normalize_gpu(&id, resources, &self.opts.gpu);
        Ok(())
    }
}

fn check_paths(task: &Task, base: &str) -> Result<()> {
    if let Some(input) = task.inputs.iter().find(|i| !i.path.starts_with(base)) {
        return Err(TaskError::invalid(format!(
            "input.path {} should be under {base}",
            input.path
        )));
    }
    if let Some(output) = task.outputs.iter().find(|o| !o.path.starts_with(base)) {
        return Err(TaskError::invalid(format!(
            "output.path {} should be under {base}",
            output.path
        )));
    }
    Ok(())
}

fn set_default_resources(id: &str, resources: &mut Resources) {
    if resources.cpu_cores == 0 {
        resources.cpu_cores = 1;
        warn!(task_id = %id, cpu = resources.cpu_cores, "set cpu default");
    }
    if resources.ram_gb == 0.0 {
        resources.ram_gb = 1.0;
        warn!(task_id = %id, ram_gb = resources.ram_gb, "set ram default");
    }
    if resources.disk_gb == 0.0 {
        resources.disk_gb = 1.0;
        warn!(task_id = %id, disk_gb = resources.disk_gb, "set disk default");
    }
    if let Some(gpu) = resources.gpu.as_mut() {
        if gpu.count == 0.0 {
            gpu.count = 1.0;
            warn!(task_id = %id, gpu_count = gpu.count, "set gpu count default");
        }
    }
}

fn normalize_disk_gb(id: &str, resources: &mut Resources, opts: &DiskGbOptions) {
    if !opts.enable {
        return;
    }
    let mut disk_gb = bounded(resources.disk_gb, opts.min, opts.max);
    if opts.is_integer {
        disk_gb = disk_gb.ceil();
    }
    if disk_gb != resources.disk_gb {
        warn!(task_id = %id, origin = resources.disk_gb, new = disk_gb, "normalize diskGB");
    }
    resources.disk_gb = disk_gb;
}

fn normalize_boot_disk_gb(id: &str, resources: &mut Resources, opts: &BootDiskGbOptions) {
    if !opts.enable {
        return;
    }
    let Some(boot_disk_gb) = resources.boot_disk_gb else {
        return;
    };
    let clamped = bounded(boot_disk_gb, opts.min, opts.max);
    if clamped != boot_disk_gb {
        warn!(task_id = %id, origin = boot_disk_gb, new = clamped, "normalize bootDiskGB");
    }
    resources.boot_disk_gb = Some(clamped);
}

/// Raise to `min`, then lower to `max`; inverted or NaN bounds never panic.
fn bounded<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

fn normalize_gpu(id: &str, resources: &mut Resources, opts: &GpuOptions) {
    if !opts.enable || !opts.is_integer {
        return;
    }
    let Some(gpu) = resources.gpu.as_mut() else {
        return;
    };
    if gpu.count == 0.0 {
        return;
    }
    let count = gpu.count.ceil();
    if count != gpu.count {
        warn!(task_id = %id, origin = gpu.count, new = count, "normalize gpu count");
    }
    gpu.count = count;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tracing_test::traced_test;

    use super::*;
    use crate::error::ErrorKind;
    use crate::task::{GpuResource, Input, Output, TaskSubmission};

    fn task_with(submission: TaskSubmission) -> Task {
        Task::from_submission("task-00000001", Utc::now(), submission)
    }

    fn base_only() -> ResourceNormalizer {
        ResourceNormalizer::new(NormalizeOptions {
            executor_base_path: "/base/".to_owned(),
            disk_gb: DiskGbOptions {
                enable: false,
                min: 0.0,
                max: 0.0,
                is_integer: false,
            },
            boot_disk_gb: BootDiskGbOptions {
                enable: false,
                min: 0,
                max: 0,
            },
            gpu: GpuOptions {
                enable: false,
                is_integer: false,
            },
        })
    }

    fn clamping() -> ResourceNormalizer {
        ResourceNormalizer::new(NormalizeOptions {
            executor_base_path: "/base/".to_owned(),
            ..NormalizeOptions::default()
        })
    }

    fn resources(cpu: i32, ram: f64, disk: f64) -> Option<Resources> {
        Some(Resources {
            cpu_cores: cpu,
            ram_gb: ram,
            disk_gb: disk,
            ..Resources::default()
        })
    }

    #[test]
    fn paths_must_share_the_base() {
        let cases = [
            ("/basetxt.txt", "/base/txt.txt", true),
            ("/base/abc/txt.txt", "base/txt.txt", true),
            ("/base/abc/txt.txt", "/base/txt.txt", false),
        ];
        for (input, output, expect_err) in cases {
            let mut task = task_with(TaskSubmission {
                inputs: vec![Input {
                    path: input.to_owned(),
                    ..Input::default()
                }],
                outputs: vec![Output {
                    path: output.to_owned(),
                    ..Output::default()
                }],
                ..TaskSubmission::default()
            });
            let result = base_only().normalize(&mut task);
            assert_eq!(result.is_err(), expect_err, "{input} / {output}");
            if let Err(e) = result {
                assert_eq!(e.kind(), ErrorKind::InvalidInput);
            }
        }
    }

    #[traced_test]
    #[test]
    fn missing_resources_get_defaults() {
        let mut task = task_with(TaskSubmission::default());
        base_only().normalize(&mut task).unwrap();
        assert_eq!(task.resources, resources(1, 1.0, 1.0));
        assert!(logs_contain("set cpu default"));
    }

    #[test]
    fn gpu_without_count_defaults_to_one() {
        let mut task = task_with(TaskSubmission {
            resources: Some(Resources {
                gpu: Some(GpuResource {
                    count: 0.0,
                    gpu_type: "Type2".to_owned(),
                }),
                ..Resources::default()
            }),
            ..TaskSubmission::default()
        });
        base_only().normalize(&mut task).unwrap();
        let gpu = task.resources.unwrap().gpu.unwrap();
        assert_eq!(gpu.count, 1.0);
        assert_eq!(gpu.gpu_type, "Type2");
    }

    #[test]
    fn explicit_resources_are_kept() {
        let mut task = task_with(TaskSubmission {
            resources: resources(3, 4.0, 10.0),
            ..TaskSubmission::default()
        });
        base_only().normalize(&mut task).unwrap();
        assert_eq!(task.resources, resources(3, 4.0, 10.0));
    }

    #[test]
    fn unvalidated_bounds_do_not_panic() {
        let mut opts = NormalizeOptions::default();
        opts.disk_gb.min = f64::NAN;
        opts.boot_disk_gb.min = 100;
        opts.boot_disk_gb.max = 10;
        let mut task = task_with(TaskSubmission {
            resources: Some(Resources {
                boot_disk_gb: Some(50),
                ..resources(1, 2.0, 30.4).unwrap()
            }),
            ..TaskSubmission::default()
        });
        ResourceNormalizer::new(opts).normalize(&mut task).unwrap();
        let resources = task.resources.unwrap();
        assert_eq!(resources.disk_gb, 31.0);
        assert_eq!(resources.boot_disk_gb, Some(100));
    }

    #[test]
    fn disk_is_clamped_and_rounded_up() {
        let cases = [(30.0, 30.0), (10.0, 20.0), (10000.0, 8192.0), (30.4, 31.0)];
        for (origin, expected) in cases {
            let mut task = task_with(TaskSubmission {
                resources: resources(1, 2.0, origin),
                ..TaskSubmission::default()
            });
            clamping().normalize(&mut task).unwrap();
            assert_eq!(task.resources.unwrap().disk_gb, expected, "{origin}");
        }
    }

    #[test]
    fn boot_disk_is_clamped_only_when_requested() {
        let cases = [(None, None), (Some(20), Some(40)), (Some(60), Some(60)), (Some(500), Some(100))];
        for (origin, expected) in cases {
            let mut task = task_with(TaskSubmission {
                resources: Some(Resources {
                    boot_disk_gb: origin,
                    ..resources(1, 2.0, 30.0).unwrap()
                }),
                ..TaskSubmission::default()
            });
            clamping().normalize(&mut task).unwrap();
            assert_eq!(task.resources.unwrap().boot_disk_gb, expected, "{origin:?}");
        }
    }

    #[test]
    fn gpu_count_is_rounded_up() {
        let mut task = task_with(TaskSubmission {
            resources: Some(Resources {
                gpu: Some(GpuResource {
                    count: 0.5,
                    gpu_type: "Type1".to_owned(),
                }),
                ..resources(1, 2.0, 30.0).unwrap()
            }),
            ..TaskSubmission::default()
        });
        clamping().normalize(&mut task).unwrap();
        assert_eq!(task.resources.unwrap().gpu.unwrap().count, 1.0);
    }

    #[test]
    fn options_validation() {
        assert!(NormalizeOptions::default().validate().is_ok());

        let relative = NormalizeOptions {
            executor_base_path: "base/".to_owned(),
            ..NormalizeOptions::default()
        };
        assert!(relative.validate().is_err());

        let no_slash = NormalizeOptions {
            executor_base_path: "/base".to_owned(),
            ..NormalizeOptions::default()
        };
        assert!(no_slash.validate().is_err());

        let mut inverted = NormalizeOptions::default();
        inverted.disk_gb.min = 100.0;
        inverted.disk_gb.max = 10.0;
        assert!(inverted.validate().is_err());

        let mut negative = NormalizeOptions::default();
        negative.boot_disk_gb.min = -1;
        assert!(negative.validate().is_err());

        let mut nan = NormalizeOptions::default();
        nan.disk_gb.min = "NaN".parse().unwrap();
        assert_eq!(nan.validate().unwrap_err().kind(), ErrorKind::InvalidInput);

        let mut infinite = NormalizeOptions::default();
        infinite.disk_gb.max = f64::INFINITY;
        assert!(infinite.validate().is_err());

        // Disabled clamps are not checked.
        let mut disabled = NormalizeOptions::default();
        disabled.disk_gb.enable = false;
        disabled.disk_gb.min = 100.0;
        disabled.disk_gb.max = 10.0;
        assert!(disabled.validate().is_ok());
    }
}
