use serde::{Deserialize, Serialize};

/// A movie carrying a user-assigned rating, as read from the media library.
///
/// Held in memory only for the duration of a sync run; the remote database
/// is the sole durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedMovie {
    pub title: String,
    /// User rating on a 1-10 scale. The media server reports half-star
    /// ratings as fractional values; clients round on ingest.
    pub rating: u8,
}

impl RatedMovie {
    pub fn new(title: impl Into<String>, rating: u8) -> Self {
        Self {
            title: title.into(),
            rating,
        }
    }
}
