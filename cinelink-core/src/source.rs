use async_trait::async_trait;
use cinelink_model::RatedMovie;

use crate::error::Result;

/// Seam between the sync engine and the media library it reads from.
///
/// Any compatible media-library API can stand behind this; the shipped
/// implementation is [`crate::plex::PlexClient`]. Tests substitute mocks.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Probe the server. A failure here is fatal to the run.
    async fn connect(&self) -> Result<()>;

    /// List every item carrying a user rating, in whatever order the
    /// library returns them. Items without a rating are filtered out.
    async fn list_rated_movies(&self) -> Result<Vec<RatedMovie>>;
}
