//! Dashboard handlers: summary view, schedule management, run triggering,
//! and the live progress stream.

use std::time::Duration;

use axum::{
    Form, Json,
    extract::State,
    response::{
        Redirect,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::{DateTime, Utc};
use cinelink_model::{RunReport, ScheduleSlot, SyncEvent};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// How many prior additions the summary shows below the most recent one.
const PREVIOUS_MOVIES_SHOWN: usize = 8;
const RECENT_RUNS_SHOWN: usize = 8;
const LOG_TAIL_LINES: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct MovieSummary {
    pub title: String,
    pub symbol: String,
    pub year: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub scheduled_time: Option<String>,
    pub running: bool,
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_movie: Option<MovieSummary>,
    pub previous_movies: Vec<MovieSummary>,
    pub recent_runs: Vec<RunReport>,
    pub log_tail: String,
}

#[derive(Debug, Deserialize)]
pub struct SetScheduleForm {
    pub time: String,
}

/// `GET /`: everything the dashboard renders, derived from structured
/// run history rather than log parsing.
pub async fn dashboard_summary(State(state): State<AppState>) -> Json<DashboardSummary> {
    let bus = state.engine.bus();

    let mut additions = bus
        .recent_additions(PREVIOUS_MOVIES_SHOWN + 1)
        .into_iter()
        .filter_map(|frame| match frame.event {
            SyncEvent::MovieAdded {
                title,
                symbol,
                year,
                ..
            } => Some(MovieSummary {
                title,
                symbol,
                year,
                added_at: frame.emitted_at,
            }),
            _ => None,
        });

    let last_movie = additions.next();
    let previous_movies = additions.collect();

    Json(DashboardSummary {
        scheduled_time: state.scheduler.current().map(|slot| slot.to_string()),
        running: state.engine.is_running(),
        last_run_time: bus.last_finished_at(),
        last_movie,
        previous_movies,
        recent_runs: state.engine.recent_runs(RECENT_RUNS_SHOWN).await,
        log_tail: read_log_tail(&state).await,
    })
}

/// `POST /set-schedule`: replace the single schedule slot and go back to
/// the dashboard.
pub async fn set_schedule(
    State(state): State<AppState>,
    Form(form): Form<SetScheduleForm>,
) -> AppResult<Redirect> {
    let slot: ScheduleSlot = form
        .time
        .parse()
        .map_err(|e: cinelink_model::ScheduleSlotError| AppError::bad_request(e.to_string()))?;

    state.scheduler.set(slot);
    info!(%slot, "automation time set");
    Ok(Redirect::to("/"))
}

/// `GET /run-script-stream`: trigger one sync run in the background and
/// redirect. An in-flight run yields 409.
pub async fn trigger_run(State(state): State<AppState>) -> AppResult<Redirect> {
    let run_id = state.engine.try_start()?;
    info!(%run_id, "manual sync run triggered");
    Ok(Redirect::to("/"))
}

/// `GET /events`: live progress frames as server-sent events.
pub async fn sync_events_sse(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, anyhow::Error>>> {
    let receiver = state.engine.bus().subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|frame| async move {
        match frame {
            Ok(frame) => Some(
                Event::default()
                    .event("sync")
                    .json_data(&frame)
                    .map_err(Into::into),
            ),
            // A lagged dashboard client just misses frames; the summary
            // endpoint backfills.
            Err(BroadcastStreamRecvError::Lagged(_)) => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}

/// `GET /runs`: recent run reports, newest first.
pub async fn recent_runs(State(state): State<AppState>) -> Json<Vec<RunReport>> {
    Json(state.engine.recent_runs(RECENT_RUNS_SHOWN).await)
}

/// `GET /logs`: the raw append-only log, verbatim.
pub async fn raw_logs(State(state): State<AppState>) -> String {
    tokio::fs::read_to_string(state.config.log_file())
        .await
        .unwrap_or_default()
}

async fn read_log_tail(state: &AppState) -> String {
    let contents = tokio::fs::read_to_string(state.config.log_file())
        .await
        .unwrap_or_default();
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].join("\n")
}
