//! Reconciliation of log fragments reported by independent clusters.
//!
//! Reports arrive incrementally, out of order and possibly more than once.
//! Merging is field-wise union: a reported value overwrites a stored one only
//! when it is present, so replaying an old report never erases progress.
//!
//! All functions here take their inputs by reference and build a new value;
//! the stored status is only replaced once the merged result validates.

use chrono::{DateTime, Utc};

use crate::error::{Result, TaskError};
use crate::task::types::{ExecutorLog, TaskLog, TaskStatus};

impl TaskStatus {
    /// Merge `reported` into the status logs and re-validate every resulting
    /// [`TaskLog`]. On error `self` is dropped and nothing is returned, so a
    /// partially merged record can never reach the store.
    pub fn update_logs(mut self, reported: &[TaskLog]) -> Result<Self> {
        let merged = merge_task_logs(&self.logs, reported);
        for log in &merged {
            validate_task_log(log, self.creation_time)?;
        }
        self.logs = merged;
        Ok(self)
    }
}

/// Cluster-level merge, keyed by `cluster_id`.
pub fn merge_task_logs(old: &[TaskLog], reported: &[TaskLog]) -> Vec<TaskLog> {
    let mut merged = old.to_vec();
    for new in reported {
        match merged.iter_mut().find(|log| log.cluster_id == new.cluster_id) {
            Some(existing) => *existing = merge_task_log(existing, new),
            None => merged.push(new.clone()),
        }
    }
    merged
}

fn merge_task_log(old: &TaskLog, new: &TaskLog) -> TaskLog {
    TaskLog {
        cluster_id: old.cluster_id.clone(),
        logs: merge_attempts(&old.logs, &new.logs),
        start_time: new.start_time.or(old.start_time),
        end_time: new.end_time.or(old.end_time),
        system_logs: merge_system_logs(&old.system_logs, &new.system_logs),
    }
}

/// Slot-wise merge; slots only present in `new` are appended.
fn merge_attempts(old: &[Vec<ExecutorLog>], new: &[Vec<ExecutorLog>]) -> Vec<Vec<ExecutorLog>> {
    let mut merged: Vec<Vec<ExecutorLog>> = old
        .iter()
        .enumerate()
        .map(|(index, slot)| match new.get(index) {
            Some(reported) => merge_executor_logs(slot, reported),
            None => slot.clone(),
        })
        .collect();
    if new.len() > old.len() {
        merged.extend_from_slice(&new[old.len()..]);
    }
    merged
}

fn merge_executor_logs(old: &[ExecutorLog], new: &[ExecutorLog]) -> Vec<ExecutorLog> {
    let mut merged = old.to_vec();
    for log in new {
        match merged.iter_mut().find(|e| e.executor_id == log.executor_id) {
            Some(existing) => {
                existing.start_time = log.start_time.or(existing.start_time);
                existing.end_time = log.end_time.or(existing.end_time);
            }
            None => merged.push(log.clone()),
        }
    }
    merged
}

/// Positional merge. An empty reported line means "unchanged", which also
/// means a line can never be cleared once written.
fn merge_system_logs(old: &[String], new: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = old
        .iter()
        .zip(new.iter().map(Some).chain(std::iter::repeat(None)))
        .map(|(current, reported)| match reported {
            Some(line) if !line.is_empty() => line.clone(),
            _ => current.clone(),
        })
        .collect();
    if new.len() > old.len() {
        merged.extend_from_slice(&new[old.len()..]);
    }
    merged
}

/// Check the temporal invariants of one cluster's log against the task's
/// creation time.
pub fn validate_task_log(log: &TaskLog, creation_time: DateTime<Utc>) -> Result<()> {
    validate_time(log.start_time, log.end_time)?;
    if let Some(start) = log.start_time {
        if start < creation_time {
            return Err(TaskError::invalid("task start_time before task creation_time"));
        }
    }
    for executor in log.logs.iter().flatten() {
        validate_executor_log(executor, log.start_time, log.end_time)?;
    }
    Ok(())
}

fn validate_executor_log(
    log: &ExecutorLog,
    task_start: Option<DateTime<Utc>>,
    task_end: Option<DateTime<Utc>>,
) -> Result<()> {
    validate_time(log.start_time, log.end_time)?;
    if let Some(start) = log.start_time {
        match task_start {
            None => {
                return Err(TaskError::invalid(
                    "empty task start_time with non-empty executor start_time",
                ));
            }
            Some(task_start) if start < task_start => {
                return Err(TaskError::invalid("executor start_time before task start_time"));
            }
            Some(_) => {}
        }
    }
    if let Some(task_end) = task_end {
        match log.end_time {
            None => {
                return Err(TaskError::invalid(
                    "empty executor end_time with non-empty task end_time",
                ));
            }
            Some(end) if end > task_end => {
                return Err(TaskError::invalid("executor end_time after task end_time"));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn validate_time(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (_, None) => Ok(()),
        (None, Some(_)) => Err(TaskError::invalid("empty start_time with non-empty end_time")),
        (Some(start), Some(end)) if start > end => {
            Err(TaskError::invalid("start_time after end_time"))
        }
        _ => Ok(()),
    }
}
