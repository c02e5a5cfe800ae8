//! Plex media server client.
//!
//! Plex answers its library endpoints with XML; the parsing here works on
//! plain strings so it can be exercised without a live server.

use std::time::Duration;

use async_trait::async_trait;
use cinelink_model::RatedMovie;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::source::MediaSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PlexClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl PlexClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SyncError::Network)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn fetch(&self, path: &str) -> Result<String> {
        let url = format!(
            "{}{}?X-Plex-Token={}",
            self.base_url, path, self.token
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))?
            .error_for_status()
            .map_err(|e| SyncError::Connection(e.to_string()))?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl MediaSource for PlexClient {
    async fn connect(&self) -> Result<()> {
        info!(url = %self.base_url, "connecting to Plex server");
        self.fetch("/identity").await?;
        Ok(())
    }

    async fn list_rated_movies(&self) -> Result<Vec<RatedMovie>> {
        let sections = movie_section_keys(&self.fetch("/library/sections").await?)?;
        debug!(count = sections.len(), "discovered movie sections");

        let mut movies = Vec::new();
        for key in sections {
            let path = format!("/library/sections/{key}/all");
            let listing = self.fetch(&path).await?;
            movies.extend(rated_movies(&listing)?);
        }
        info!(count = movies.len(), "retrieved rated movies from Plex");
        Ok(movies)
    }
}

/// Section keys of every movie-typed library in a `/library/sections`
/// response.
pub(crate) fn movie_section_keys(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut keys = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().as_ref() == b"Directory" =>
            {
                let mut is_movie_section = false;
                let mut key = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"type" => is_movie_section = attr.value.as_ref() == b"movie",
                        b"key" => {
                            key = Some(
                                attr.unescape_value()
                                    .map_err(|e| SyncError::Parse(e.to_string()))?
                                    .into_owned(),
                            )
                        }
                        _ => {}
                    }
                }
                if is_movie_section
                    && let Some(key) = key
                {
                    keys.push(key);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SyncError::Parse(e.to_string())),
            _ => {}
        }
    }
    Ok(keys)
}

/// Rated movies in a section listing. Items with no `userRating`
/// attribute are dropped; fractional ratings round to the nearest star.
pub(crate) fn rated_movies(xml: &str) -> Result<Vec<RatedMovie>> {
    let mut reader = Reader::from_str(xml);
    let mut movies = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().as_ref() == b"Video" =>
            {
                let mut title = None;
                let mut rating = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"title" => {
                            title = Some(
                                attr.unescape_value()
                                    .map_err(|e| SyncError::Parse(e.to_string()))?
                                    .into_owned(),
                            )
                        }
                        b"userRating" => {
                            rating = attr
                                .unescape_value()
                                .map_err(|e| SyncError::Parse(e.to_string()))?
                                .parse::<f32>()
                                .ok();
                        }
                        _ => {}
                    }
                }
                if let (Some(title), Some(rating)) = (title, rating) {
                    let rounded = rating.round() as u8;
                    if rounded > 0 {
                        movies.push(RatedMovie::new(title, rounded));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SyncError::Parse(e.to_string())),
            _ => {}
        }
    }
    Ok(movies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTIONS: &str = r#"<MediaContainer size="3">
        <Directory type="movie" key="1" title="Movies"/>
        <Directory type="show" key="2" title="TV Shows"/>
        <Directory type="movie" key="7" title="Documentaries"/>
    </MediaContainer>"#;

    const LISTING: &str = r#"<MediaContainer size="4">
        <Video title="Dune" userRating="9.0" ratingKey="101"/>
        <Video title="Arrival" userRating="7.5" ratingKey="102"/>
        <Video title="Unwatched" ratingKey="103"/>
        <Video title="Zero" userRating="0.0" ratingKey="104"/>
    </MediaContainer>"#;

    #[test]
    fn discovers_only_movie_sections() {
        let keys = movie_section_keys(SECTIONS).unwrap();
        assert_eq!(keys, vec!["1", "7"]);
    }

    #[test]
    fn keeps_only_rated_items_and_rounds() {
        let movies = rated_movies(LISTING).unwrap();
        assert_eq!(
            movies,
            vec![RatedMovie::new("Dune", 9), RatedMovie::new("Arrival", 8)]
        );
    }

    #[test]
    fn unescapes_titles() {
        let xml = r#"<MediaContainer>
            <Video title="Crouching Tiger &amp; Hidden Dragon" userRating="8.0"/>
        </MediaContainer>"#;
        let movies = rated_movies(xml).unwrap();
        assert_eq!(movies[0].title, "Crouching Tiger & Hidden Dragon");
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = rated_movies("<MediaContainer><Video").unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }
}
