//! Notion remote-database client: existence queries and page creation.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use cinelink_model::RatedMovie;
use futures::future::join_all;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::rating::rating_symbol;

/// API version pin; creation and query payload shapes are tied to it.
const NOTION_VERSION: &str = "2022-06-28";
const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Property names in the target database.
const TITLE_PROP: &str = "Name";
const ALT_TITLE_PROP: &str = "Eng Name";
const RATING_PROP: &str = "Rating";
const YEARS_PROP: &str = "Years watched";

/// Titles are terminated with a semicolon in the database, so substring
/// queries for "Alien" do not also match "Aliens".
const TITLE_TERMINATOR: char = ';';

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Seam between the sync engine and the remote record database.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    /// Which candidate titles already have a remote record. One query per
    /// candidate, fanned out concurrently; completion order is irrelevant.
    async fn existing_titles(&self, candidates: &[RatedMovie]) -> BTreeSet<String>;

    /// Create the remote record for one movie. Creation is additive only;
    /// existing records are never updated.
    async fn create_movie(&self, movie: &RatedMovie, year: i32) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct NotionClient {
    client: reqwest::Client,
    database_id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<Value>,
}

impl NotionClient {
    pub fn new(api_key: &str, database_id: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| SyncError::Config("NOTION_API_KEY is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SyncError::Network)?;
        Ok(Self {
            client,
            database_id: database_id.into(),
        })
    }

    /// One existence query against the database.
    async fn query_title(&self, title: &str) -> Result<bool> {
        debug!(title, "checking whether title exists in Notion");
        let url = format!("{NOTION_API_BASE}/databases/{}/query", self.database_id);
        let response = self
            .client
            .post(&url)
            .json(&existence_query(title))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Query {
                title: title.to_string(),
                reason: format!("status {status}"),
            });
        }
        let body: QueryResponse = response.json().await.map_err(|e| SyncError::Query {
            title: title.to_string(),
            reason: e.to_string(),
        })?;
        Ok(!body.results.is_empty())
    }

    /// Query failures degrade to "not present": the run goes on and a
    /// duplicate attempt surfaces in the submission outcomes instead of
    /// blocking the batch.
    async fn title_exists(&self, title: &str) -> bool {
        match self.query_title(title).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(title, error = %e, "existence query failed; assuming absent");
                false
            }
        }
    }
}

#[async_trait]
impl RemoteIndex for NotionClient {
    async fn existing_titles(&self, candidates: &[RatedMovie]) -> BTreeSet<String> {
        let checks = candidates.iter().map(|movie| async {
            let exists = self.title_exists(&movie.title).await;
            (movie.title.clone(), exists)
        });

        join_all(checks)
            .await
            .into_iter()
            .filter_map(|(title, exists)| exists.then_some(title))
            .collect()
    }

    async fn create_movie(&self, movie: &RatedMovie, year: i32) -> Result<()> {
        let url = format!("{NOTION_API_BASE}/pages");
        let payload = creation_payload(&self.database_id, movie, year);
        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if status.is_success() {
            info!(
                title = %movie.title,
                symbol = rating_symbol(movie.rating),
                year,
                "movie added to Notion"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SyncError::Submission {
                title: movie.title.clone(),
                reason: format!("status {status}: {body}"),
            })
        }
    }
}

/// Database-query filter: substring match against either title field.
pub(crate) fn existence_query(title: &str) -> Value {
    json!({
        "filter": {
            "or": [
                { "property": TITLE_PROP, "rich_text": { "contains": title } },
                { "property": ALT_TITLE_PROP, "rich_text": { "contains": title } }
            ]
        }
    })
}

/// Page-creation payload: terminated title, mapped rating symbol, and the
/// watch year tagged into the multi-select field.
pub(crate) fn creation_payload(database_id: &str, movie: &RatedMovie, year: i32) -> Value {
    json!({
        "parent": { "database_id": database_id },
        "properties": {
            TITLE_PROP: {
                "title": [
                    { "text": { "content": format!("{}{}", movie.title, TITLE_TERMINATOR) } }
                ]
            },
            RATING_PROP: {
                "select": { "name": rating_symbol(movie.rating) }
            },
            YEARS_PROP: {
                "multi_select": [ { "name": year.to_string() } ]
            }
        }
    })
}
