//! Broadcast channel carrying run progress to dashboard clients, with a
//! bounded history the summary view reads instead of scraping logs.

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use cinelink_model::SyncEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEventFrame {
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    pub event: SyncEvent,
}

#[derive(Debug)]
pub struct SyncEventBus {
    tx: broadcast::Sender<SyncEventFrame>,
    history: Mutex<VecDeque<SyncEventFrame>>,
    history_capacity: usize,
    sequence: AtomicU64,
}

impl SyncEventBus {
    pub fn new(history_capacity: usize, broadcast_capacity: usize) -> Self {
        let history_capacity = history_capacity.max(1);
        let broadcast_capacity = broadcast_capacity.max(1);
        let (tx, _rx) = broadcast::channel(broadcast_capacity);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEventFrame> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, event: SyncEvent) -> SyncEventFrame {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = SyncEventFrame {
            sequence,
            emitted_at: Utc::now(),
            event,
        };

        if Self::should_record_history(&frame.event) {
            let mut guard = self
                .history
                .lock()
                .expect("sync event history mutex poisoned");
            if guard.len() == self.history_capacity {
                guard.pop_front();
            }
            guard.push_back(frame.clone());
        }

        let _ = self.tx.send(frame.clone());
        frame
    }

    /// Recorded frames, oldest first.
    pub fn history(&self) -> Vec<SyncEventFrame> {
        let guard = self
            .history
            .lock()
            .expect("sync event history mutex poisoned");
        guard.iter().cloned().collect()
    }

    /// The `MovieAdded` frames, newest first.
    pub fn recent_additions(&self, limit: usize) -> Vec<SyncEventFrame> {
        let guard = self
            .history
            .lock()
            .expect("sync event history mutex poisoned");
        guard
            .iter()
            .rev()
            .filter(|frame| matches!(frame.event, SyncEvent::MovieAdded { .. }))
            .take(limit)
            .cloned()
            .collect()
    }

    /// When the most recent run finished, if any run has finished yet.
    pub fn last_finished_at(&self) -> Option<DateTime<Utc>> {
        let guard = self
            .history
            .lock()
            .expect("sync event history mutex poisoned");
        guard
            .iter()
            .rev()
            .find(|frame| matches!(frame.event, SyncEvent::RunFinished { .. }))
            .map(|frame| frame.emitted_at)
    }

    fn should_record_history(event: &SyncEvent) -> bool {
        matches!(
            event,
            SyncEvent::MovieAdded { .. } | SyncEvent::RunFinished { .. }
        )
    }
}
