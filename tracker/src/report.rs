//! Report-facing summaries and a JSON report listener.
//!
//! The persistence format of the full report is out of scope; these types
//! capture the summary the core hands to report writers at finalization.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::context::{ExecutionContext, FailureCorridor, MethodContext, MethodType, Status};
use crate::events::EventListener;
use crate::format::log_time;

/// Summary of one method execution.
#[derive(Debug, Clone, Serialize)]
pub struct MethodSummary {
    pub run_index: usize,
    pub name: String,
    pub class_name: Option<String>,
    pub method_type: MethodType,
    pub status: Status,
    pub retry_number: u32,
    pub thread_name: String,
    pub failure_corridor: FailureCorridor,
    pub parameter_values: Vec<String>,
    pub session_keys: Vec<String>,
    pub infos: Vec<String>,
    pub priority_message: Option<String>,
}

impl MethodSummary {
    pub fn from_context(method: &Arc<MethodContext>) -> Self {
        Self {
            run_index: method.run_index(),
            name: method.name().to_string(),
            class_name: method.class_context().map(|c| c.name().to_string()),
            method_type: method.method_type(),
            status: method.status(),
            retry_number: method.retry_number(),
            thread_name: method.thread_name().to_string(),
            failure_corridor: method.failure_corridor(),
            parameter_values: method.parameter_values(),
            session_keys: method
                .read_session_contexts()
                .iter()
                .map(|s| s.session_key())
                .collect(),
            infos: method.read_infos(),
            priority_message: method.priority_message(),
        }
    }
}

/// Summary of a finalized suite run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub suite: String,
    pub run_id: String,
    pub started_at: String,
    pub status_counts: BTreeMap<Status, usize>,
    pub methods: Vec<MethodSummary>,
}

impl ExecutionSummary {
    pub fn from_context(execution: &Arc<ExecutionContext>) -> Self {
        Self {
            suite: execution.name().to_string(),
            run_id: execution.run_id().to_string(),
            started_at: log_time(execution.started_at()),
            status_counts: execution.status_counts(),
            methods: execution
                .read_method_contexts()
                .iter()
                .map(MethodSummary::from_context)
                .collect(),
        }
    }
}

/// Listener that writes the execution summary as JSON when the suite
/// finalizes.
pub struct JsonReportListener {
    path: PathBuf,
}

impl JsonReportListener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventListener for JsonReportListener {
    fn on_finalize_execution(&self, execution: &Arc<ExecutionContext>) -> Result<()> {
        let summary = ExecutionSummary::from_context(execution);
        let mut json = serde_json::to_string_pretty(&summary).context("serialize summary")?;
        json.push('\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&self.path, json).with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}
