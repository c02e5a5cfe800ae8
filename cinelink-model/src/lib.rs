//! Shared data model definitions for the CineLink crates.

pub mod events;
pub mod movie;
pub mod schedule;

pub use events::{RunReport, RunStage, SubmissionOutcome, SyncEvent};
pub use movie::RatedMovie;
pub use schedule::{ScheduleSlot, ScheduleSlotError};
