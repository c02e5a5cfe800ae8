//! CineLink pipeline: read rated movies from a Plex server, map ratings to
//! display symbols, skip titles already recorded in Notion, and submit the
//! rest as a staged run with live progress events.

pub mod engine;
pub mod error;
pub mod event_bus;
pub mod notion;
pub mod plex;
pub mod rating;
pub mod source;

pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use event_bus::{SyncEventBus, SyncEventFrame};
pub use notion::{NotionClient, RemoteIndex};
pub use plex::PlexClient;
pub use rating::rating_symbol;
pub use source::MediaSource;
