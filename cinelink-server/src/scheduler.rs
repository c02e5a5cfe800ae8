//! Single-slot daily scheduler.
//!
//! Setting a schedule replaces the previous one outright (remove-then-add):
//! the old task is aborted before the new one is installed, so at most one
//! schedule is ever active.

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime};
use cinelink_model::ScheduleSlot;
use cinelink_core::SyncEngine;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    active: Mutex<Option<ActiveSchedule>>,
}

#[derive(Debug)]
struct ActiveSchedule {
    slot: ScheduleSlot,
    task: JoinHandle<()>,
}

impl Drop for ActiveSchedule {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            active: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<ScheduleSlot> {
        self.active
            .lock()
            .expect("scheduler mutex poisoned")
            .as_ref()
            .map(|active| active.slot)
    }

    /// Install `slot` as the one active schedule, replacing any previous
    /// one.
    pub fn set(&self, slot: ScheduleSlot) {
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move {
            loop {
                let wait = delay_until_next(Local::now().naive_local(), slot);
                tokio::time::sleep(wait).await;
                match engine.try_start() {
                    Ok(run_id) => info!(%run_id, %slot, "scheduled sync run started"),
                    Err(e) => warn!(%slot, error = %e, "scheduled sync run skipped"),
                }
            }
        });

        let mut guard = self.active.lock().expect("scheduler mutex poisoned");
        // Dropping the previous entry aborts its task.
        *guard = Some(ActiveSchedule { slot, task });
        info!(%slot, "schedule set");
    }
}

/// Time until the next local occurrence of `slot`. A slot equal to the
/// current minute schedules for tomorrow, matching cron semantics.
pub(crate) fn delay_until_next(now: NaiveDateTime, slot: ScheduleSlot) -> std::time::Duration {
    let today = now
        .date()
        .and_hms_opt(u32::from(slot.hour()), u32::from(slot.minute()), 0)
        .expect("slot validated on construction");
    let target = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (target - now).to_std().unwrap_or_default()
}
