use crate::error::{Result, TaskError};
use crate::task::{State, TaskStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 256;
pub const MAX_PAGE_SIZE: u32 = 2048;

/// Conjunction of optional predicates; an empty filter matches every task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub name_prefix: String,
    /// Match any of these states. Empty means any state.
    pub states: Vec<State>,
    pub cluster_id: Option<String>,
    /// Only tasks no cluster has claimed yet.
    pub without_cluster: bool,
}

impl ListFilter {
    pub fn matches(&self, status: &TaskStatus, name: &str) -> bool {
        name.starts_with(&self.name_prefix)
            && (self.states.is_empty() || self.states.contains(&status.state))
            && self
                .cluster_id
                .as_ref()
                .is_none_or(|cluster_id| &status.cluster_id == cluster_id)
            && (!self.without_cluster || status.cluster_id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// `0` selects [`DEFAULT_PAGE_SIZE`].
    pub page_size: u32,
    /// ID of the last task of the previous page.
    pub page_token: Option<String>,
    pub filter: ListFilter,
}

impl ListQuery {
    /// Apply defaults and reject contradictory or oversized queries.
    pub fn normalized(mut self) -> Result<Self> {
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(TaskError::invalid(format!(
                "page_size should not exceed {MAX_PAGE_SIZE}"
            )));
        }
        if self.filter.cluster_id.is_some() && self.filter.without_cluster {
            return Err(TaskError::invalid(
                "cluster_id and without_cluster are mutually exclusive",
            ));
        }
        if self.page_token.as_deref() == Some("") {
            self.page_token = None;
        }
        Ok(self)
    }
}

/// One page of status projections, ordered by task ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPage {
    pub tasks: Vec<TaskStatus>,
    /// Pass back as [`ListQuery::page_token`]; `None` on the last page.
    pub next_page_token: Option<String>,
}

impl TaskPage {
    /// Build a page from up to `page_size + 1` ordered rows; the extra row
    /// only signals that another page exists.
    pub(crate) fn from_overfetch(mut tasks: Vec<TaskStatus>, page_size: u32) -> Self {
        let page_size = page_size as usize;
        let next_page_token = if tasks.len() > page_size {
            tasks.truncate(page_size);
            tasks.last().map(|t| t.id.clone())
        } else {
            None
        };
        Self {
            tasks,
            next_page_token,
        }
    }
}
