//! Progress events and run reporting shared between the sync engine and
//! the dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stage of a synchronization run.
///
/// Runs move `Connecting -> Listing -> Filtering -> CheckingExistence ->
/// Submitting -> Finished`. `Failed` is reachable from `Connecting` only;
/// every later stage degrades instead of aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Connecting,
    Listing,
    Filtering,
    CheckingExistence,
    Submitting,
    Finished,
    Failed,
}

impl RunStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Finished | RunStage::Failed)
    }
}

/// Per-title result of the batch submission stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Created { symbol: String, year: i32 },
    Failed { reason: String },
}

/// Summary of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal stage: `Finished`, or `Failed` when the media server was
    /// unreachable.
    pub stage: RunStage,
    pub movies_found: usize,
    pub candidates: usize,
    pub already_present: usize,
    /// Title -> outcome for every attempted creation.
    pub submissions: BTreeMap<String, SubmissionOutcome>,
    /// Terminal human-readable line. Exactly one per run.
    pub summary: String,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            stage: RunStage::Connecting,
            movies_found: 0,
            candidates: 0,
            already_present: 0,
            submissions: BTreeMap::new(),
            summary: String::new(),
        }
    }

    pub fn created_count(&self) -> usize {
        self.submissions
            .values()
            .filter(|o| matches!(o, SubmissionOutcome::Created { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.submissions
            .values()
            .filter(|o| matches!(o, SubmissionOutcome::Failed { .. }))
            .count()
    }
}

/// Progress event pushed to dashboard clients while a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    RunStarted {
        run_id: Uuid,
    },
    StageChanged {
        run_id: Uuid,
        stage: RunStage,
    },
    Progress {
        run_id: Uuid,
        message: String,
    },
    MovieAdded {
        run_id: Uuid,
        title: String,
        symbol: String,
        year: i32,
    },
    RunFinished {
        run_id: Uuid,
        report: RunReport,
    },
}

impl SyncEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            SyncEvent::RunStarted { run_id }
            | SyncEvent::StageChanged { run_id, .. }
            | SyncEvent::Progress { run_id, .. }
            | SyncEvent::MovieAdded { run_id, .. }
            | SyncEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}
