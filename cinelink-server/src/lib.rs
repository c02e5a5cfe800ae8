//! Dashboard server for CineLink: HTTP surface, single-slot scheduler,
//! configuration, and app state wiring.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use routes::create_router;
pub use scheduler::Scheduler;
pub use state::AppState;
