//! Run orchestration: fetch -> map -> existence check -> submit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{Datelike, Local, Utc};
use cinelink_model::{RatedMovie, RunReport, RunStage, SubmissionOutcome, SyncEvent};
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::event_bus::SyncEventBus;
use crate::notion::RemoteIndex;
use crate::rating::rating_symbol;
use crate::source::MediaSource;

/// Sequences one sync run at a time and reports progress on the event bus.
///
/// A connection failure aborts the run before any existence check or
/// submission; every later stage catches its own failures so partial
/// progress is never lost.
pub struct SyncEngine {
    source: Arc<dyn MediaSource>,
    index: Arc<dyn RemoteIndex>,
    bus: Arc<SyncEventBus>,
    history: RwLock<Vec<RunReport>>,
    history_capacity: usize,
    running: AtomicBool,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine").finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn MediaSource>,
        index: Arc<dyn RemoteIndex>,
        bus: Arc<SyncEventBus>,
        history_capacity: usize,
    ) -> Self {
        Self {
            source,
            index,
            bus,
            history: RwLock::new(Vec::new()),
            history_capacity: history_capacity.max(1),
            running: AtomicBool::new(false),
        }
    }

    pub fn bus(&self) -> &Arc<SyncEventBus> {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a run as a background task. Exactly one run may be in flight
    /// per process; an overlapping trigger gets `RunInProgress`.
    pub fn try_start(self: &Arc<Self>) -> Result<Uuid> {
        let run_id = self.begin()?;
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.drive(run_id).await;
        });
        Ok(run_id)
    }

    /// Run inline and hand back the report. Same guard as [`try_start`].
    ///
    /// [`try_start`]: SyncEngine::try_start
    pub async fn run_blocking(self: &Arc<Self>) -> Result<RunReport> {
        let run_id = self.begin()?;
        Ok(self.drive(run_id).await)
    }

    /// Completed run reports, newest first.
    pub async fn recent_runs(&self, limit: usize) -> Vec<RunReport> {
        let history = self.history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    fn begin(&self) -> Result<Uuid> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::RunInProgress);
        }
        Ok(Uuid::new_v4())
    }

    async fn drive(&self, run_id: Uuid) -> RunReport {
        // Clear the guard even if the run task unwinds, so a panicked run
        // cannot leave the engine stuck in `RunInProgress`.
        let _guard = RunningGuard(&self.running);
        let report = self.execute(run_id).await;

        let mut history = self.history.write().await;
        if history.len() == self.history_capacity {
            history.remove(0);
        }
        history.push(report.clone());
        drop(history);

        report
    }

    async fn execute(&self, run_id: Uuid) -> RunReport {
        let mut report = RunReport::new(run_id);
        info!(%run_id, "starting sync run");
        self.bus.publish(SyncEvent::RunStarted { run_id });

        self.enter_stage(run_id, &mut report, RunStage::Connecting);
        if let Err(e) = self.source.connect().await {
            error!(%run_id, error = %e, "failed to connect to media server");
            return self.finish(run_id, report, RunStage::Failed, format!("Run failed: {e}"));
        }

        self.enter_stage(run_id, &mut report, RunStage::Listing);
        let movies = match self.source.list_rated_movies().await {
            Ok(movies) => movies,
            Err(e) => {
                error!(%run_id, error = %e, "failed to list rated movies; continuing with none");
                self.progress(run_id, format!("Failed to list movies: {e}"));
                Vec::new()
            }
        };
        report.movies_found = movies.len();
        self.progress(
            run_id,
            format!("Found {} rated movies in the library", movies.len()),
        );

        self.enter_stage(run_id, &mut report, RunStage::Filtering);
        for movie in &movies {
            self.progress(
                run_id,
                format!(
                    "Processing: {} | rating {} -> {}",
                    movie.title,
                    movie.rating,
                    rating_symbol(movie.rating)
                ),
            );
        }
        report.candidates = movies.len();

        self.enter_stage(run_id, &mut report, RunStage::CheckingExistence);
        let existing = self.index.existing_titles(&movies).await;
        report.already_present = movies
            .iter()
            .filter(|m| existing.contains(&m.title))
            .count();

        self.enter_stage(run_id, &mut report, RunStage::Submitting);
        report.submissions = self.submit_new(run_id, &movies, &existing).await;

        let summary = format!(
            "Sync finished: {} added, {} failed, {} already present",
            report.created_count(),
            report.failed_count(),
            report.already_present
        );
        self.finish(run_id, report, RunStage::Finished, summary)
    }

    /// Submit every candidate not already present, concurrently, collecting
    /// a per-title outcome. An empty set issues no network calls. Sibling
    /// failures never abort each other.
    async fn submit_new(
        &self,
        run_id: Uuid,
        candidates: &[RatedMovie],
        existing: &BTreeSet<String>,
    ) -> BTreeMap<String, SubmissionOutcome> {
        let to_submit: Vec<&RatedMovie> = candidates
            .iter()
            .filter(|m| !existing.contains(&m.title))
            .collect();

        if to_submit.is_empty() {
            info!(%run_id, "no new movies to add");
            self.progress(run_id, "No new movies to add".to_string());
            return Default::default();
        }

        self.progress(
            run_id,
            format!("Adding {} new movies to Notion", to_submit.len()),
        );

        let year = Local::now().year();
        let submissions = join_all(to_submit.into_iter().map(|movie| async move {
            let outcome = match self.index.create_movie(movie, year).await {
                Ok(()) => SubmissionOutcome::Created {
                    symbol: rating_symbol(movie.rating).to_string(),
                    year,
                },
                Err(e) => {
                    warn!(%run_id, title = %movie.title, error = %e, "submission failed");
                    SubmissionOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            (movie.title.clone(), outcome)
        }))
        .await;

        let mut outcomes = BTreeMap::new();
        for (title, outcome) in submissions {
            if let SubmissionOutcome::Created { symbol, year } = &outcome {
                self.bus.publish(SyncEvent::MovieAdded {
                    run_id,
                    title: title.clone(),
                    symbol: symbol.clone(),
                    year: *year,
                });
            }
            outcomes.insert(title, outcome);
        }
        outcomes
    }

    fn enter_stage(&self, run_id: Uuid, report: &mut RunReport, stage: RunStage) {
        report.stage = stage;
        info!(%run_id, ?stage, "entering stage");
        self.bus.publish(SyncEvent::StageChanged { run_id, stage });
    }

    fn progress(&self, run_id: Uuid, message: String) {
        info!(%run_id, "{message}");
        self.bus.publish(SyncEvent::Progress { run_id, message });
    }

    /// Terminal bookkeeping. Exactly one `RunFinished` frame per run,
    /// emitted last.
    fn finish(
        &self,
        run_id: Uuid,
        mut report: RunReport,
        stage: RunStage,
        summary: String,
    ) -> RunReport {
        report.stage = stage;
        report.finished_at = Some(Utc::now());
        report.summary = summary;
        info!(%run_id, ?stage, "{}", report.summary);
        self.bus.publish(SyncEvent::StageChanged { run_id, stage });
        self.bus.publish(SyncEvent::RunFinished {
            run_id,
            report: report.clone(),
        });
        report
    }
}

/// Releases the single-run guard when the driving future is dropped,
/// whether it finished or unwound.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockSource {
        movies: Vec<RatedMovie>,
        fail_connect: bool,
        panic_connect: bool,
        fail_list: bool,
        hold_connect: Option<Arc<Notify>>,
        list_calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaSource for MockSource {
        async fn connect(&self) -> Result<()> {
            if let Some(gate) = &self.hold_connect {
                gate.notified().await;
            }
            if self.panic_connect {
                panic!("connect blew up");
            }
            if self.fail_connect {
                return Err(SyncError::Connection("refused".into()));
            }
            Ok(())
        }

        async fn list_rated_movies(&self) -> Result<Vec<RatedMovie>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_list {
                return Err(SyncError::Parse("bad payload".into()));
            }
            Ok(self.movies.clone())
        }
    }

    #[derive(Default)]
    struct MockIndex {
        existing: BTreeSet<String>,
        fail_titles: BTreeSet<String>,
        query_calls: AtomicUsize,
        create_calls: Mutex<Vec<(String, i32)>>,
    }

    #[async_trait]
    impl RemoteIndex for MockIndex {
        async fn existing_titles(&self, candidates: &[RatedMovie]) -> BTreeSet<String> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            candidates
                .iter()
                .filter(|m| self.existing.contains(&m.title))
                .map(|m| m.title.clone())
                .collect()
        }

        async fn create_movie(&self, movie: &RatedMovie, year: i32) -> Result<()> {
            self.create_calls
                .lock()
                .unwrap()
                .push((movie.title.clone(), year));
            if self.fail_titles.contains(&movie.title) {
                return Err(SyncError::Submission {
                    title: movie.title.clone(),
                    reason: "status 500".into(),
                });
            }
            Ok(())
        }
    }

    fn engine_with(source: MockSource, index: MockIndex) -> (Arc<SyncEngine>, Arc<MockIndex>) {
        let index = Arc::new(index);
        let engine = Arc::new(SyncEngine::new(
            Arc::new(source),
            index.clone(),
            Arc::new(SyncEventBus::new(32, 32)),
            8,
        ));
        (engine, index)
    }

    #[tokio::test]
    async fn submits_only_titles_not_already_present() {
        let source = MockSource {
            movies: vec![RatedMovie::new("Dune", 9), RatedMovie::new("Arrival", 7)],
            ..Default::default()
        };
        let index = MockIndex {
            existing: BTreeSet::from(["Arrival".to_string()]),
            ..Default::default()
        };
        let (engine, index) = engine_with(source, index);

        let report = engine.run_blocking().await.unwrap();

        let creates = index.create_calls.lock().unwrap().clone();
        assert_eq!(creates, vec![("Dune".to_string(), Local::now().year())]);
        assert_eq!(report.stage, RunStage::Finished);
        assert_eq!(report.already_present, 1);
        assert_eq!(
            report.submissions.get("Dune"),
            Some(&SubmissionOutcome::Created {
                symbol: rating_symbol(9).to_string(),
                year: Local::now().year(),
            })
        );
        assert!(!report.submissions.contains_key("Arrival"));
    }

    #[tokio::test]
    async fn empty_difference_issues_no_creation_calls() {
        let source = MockSource {
            movies: vec![RatedMovie::new("Arrival", 7)],
            ..Default::default()
        };
        let index = MockIndex {
            existing: BTreeSet::from(["Arrival".to_string()]),
            ..Default::default()
        };
        let (engine, index) = engine_with(source, index);

        let report = engine.run_blocking().await.unwrap();

        assert!(index.create_calls.lock().unwrap().is_empty());
        assert!(report.submissions.is_empty());
        assert_eq!(report.stage, RunStage::Finished);
    }

    #[tokio::test]
    async fn connection_failure_short_circuits_the_run() {
        let source = MockSource {
            fail_connect: true,
            ..Default::default()
        };
        let (engine, index) = engine_with(source, MockIndex::default());

        let report = engine.run_blocking().await.unwrap();

        assert_eq!(report.stage, RunStage::Failed);
        assert_eq!(index.query_calls.load(Ordering::SeqCst), 0);
        assert!(index.create_calls.lock().unwrap().is_empty());
        assert!(report.summary.starts_with("Run failed"));
    }

    #[tokio::test]
    async fn listing_failure_degrades_to_an_empty_run() {
        let source = MockSource {
            fail_list: true,
            ..Default::default()
        };
        let (engine, index) = engine_with(source, MockIndex::default());

        let report = engine.run_blocking().await.unwrap();

        assert_eq!(report.stage, RunStage::Finished);
        assert_eq!(report.movies_found, 0);
        assert!(index.create_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sibling_submissions_survive_one_failure() {
        let source = MockSource {
            movies: vec![RatedMovie::new("Dune", 9), RatedMovie::new("Heat", 8)],
            ..Default::default()
        };
        let index = MockIndex {
            fail_titles: BTreeSet::from(["Heat".to_string()]),
            ..Default::default()
        };
        let (engine, _) = engine_with(source, index);

        let report = engine.run_blocking().await.unwrap();

        assert_eq!(report.stage, RunStage::Finished);
        assert_eq!(report.created_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(matches!(
            report.submissions.get("Heat"),
            Some(SubmissionOutcome::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn overlapping_triggers_are_rejected() {
        let gate = Arc::new(Notify::new());
        let source = MockSource {
            hold_connect: Some(gate.clone()),
            ..Default::default()
        };
        let (engine, _) = engine_with(source, MockIndex::default());

        engine.try_start().unwrap();
        tokio::task::yield_now().await;
        assert!(matches!(
            engine.try_start(),
            Err(SyncError::RunInProgress)
        ));

        gate.notify_one();
        while engine.is_running() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(engine.try_start().is_ok());
        gate.notify_one();
        while engine.is_running() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn existence_checks_are_idempotent_against_an_unchanged_index() {
        let movies = vec![
            RatedMovie::new("Dune", 9),
            RatedMovie::new("Arrival", 7),
            RatedMovie::new("Heat", 8),
        ];
        let index = MockIndex {
            existing: BTreeSet::from(["Arrival".to_string(), "Heat".to_string()]),
            ..Default::default()
        };

        let first = index.existing_titles(&movies).await;
        let second = index.existing_titles(&movies).await;

        assert_eq!(first, second);
        assert_eq!(
            first,
            BTreeSet::from(["Arrival".to_string(), "Heat".to_string()])
        );
        assert_eq!(index.query_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_panicked_run_releases_the_single_run_guard() {
        let source = MockSource {
            panic_connect: true,
            ..Default::default()
        };
        let (engine, _) = engine_with(source, MockIndex::default());

        engine.try_start().unwrap();
        while engine.is_running() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert!(engine.try_start().is_ok());
    }

    #[tokio::test]
    async fn every_run_emits_exactly_one_terminal_frame_last() {
        let source = MockSource {
            movies: vec![RatedMovie::new("Dune", 9)],
            ..Default::default()
        };
        let (engine, _) = engine_with(source, MockIndex::default());

        let mut rx = engine.bus().subscribe();
        let report = engine.run_blocking().await.unwrap();

        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(frame.event);
        }

        assert!(matches!(events.first(), Some(SyncEvent::RunStarted { .. })));
        let terminal: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SyncEvent::RunFinished { .. }))
            .collect();
        assert_eq!(terminal.len(), 1);
        assert!(matches!(events.last(), Some(SyncEvent::RunFinished { .. })));
        assert_eq!(report.run_id, events.last().unwrap().run_id());
    }

    #[tokio::test]
    async fn completed_reports_land_in_history_newest_first() {
        let source = MockSource {
            movies: vec![RatedMovie::new("Dune", 9)],
            ..Default::default()
        };
        let (engine, _) = engine_with(source, MockIndex::default());

        let first = engine.run_blocking().await.unwrap();
        let second = engine.run_blocking().await.unwrap();

        let runs = engine.recent_runs(8).await;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, second.run_id);
        assert_eq!(runs[1].run_id, first.run_id);
    }
}
