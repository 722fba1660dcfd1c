pub mod error;
pub mod types;

pub use error::{AirtableError, Result};
pub use types::{
    KeywordFields, LeaderboardFields, LeaderboardRow, Record, ResultFields, TrackedUserFields,
};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{CreateRecord, CreateRequest, ListResponse};
use url::Url;

const BASE_URL: &str = "https://api.airtable.com/v0";

/// Write endpoint maximum records per request.
pub const CREATE_CHUNK_SIZE: usize = 10;

/// Pause between consecutive page or chunk requests.
const REQUEST_PACING: Duration = Duration::from_millis(500);

pub struct AirtableClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl AirtableClient {
    pub fn new(api_key: String, base_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: api_key,
            base_url: format!("{}/{}", BASE_URL, base_id),
        }
    }

    /// Table names contain spaces; push them as a path segment so they are
    /// percent-encoded.
    fn table_url(&self, table: &str) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| AirtableError::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| AirtableError::Parse("base url cannot carry a table path".to_string()))?
            .push(table);
        Ok(url)
    }

    /// Fetch every record in `table`, following continuation offsets until
    /// the listing is exhausted.
    pub async fn list_all<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<Record<T>>> {
        let url = self.table_url(table)?;
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            if offset.is_some() {
                tokio::time::sleep(REQUEST_PACING).await;
            }

            let mut req = self.client.get(url.clone()).bearer_auth(&self.token);
            if let Some(ref token) = offset {
                req = req.query(&[("offset", token)]);
            }
            let resp = req.send().await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(AirtableError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let page: ListResponse<T> = resp.json().await?;
            records.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        tracing::debug!(table, count = records.len(), "Listed table records");
        Ok(records)
    }

    /// Create one row per entry in `rows`, in request chunks of
    /// [`CREATE_CHUNK_SIZE`]. Returns the number of rows created.
    pub async fn create_all<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<usize> {
        let url = self.table_url(table)?;
        let mut created = 0;

        for chunk in rows.chunks(CREATE_CHUNK_SIZE) {
            let body = CreateRequest {
                records: chunk.iter().map(|fields| CreateRecord { fields }).collect(),
            };
            let resp = self
                .client
                .post(url.clone())
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(AirtableError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            created += chunk.len();
            tokio::time::sleep(REQUEST_PACING).await;
        }

        tracing::debug!(table, created, "Created table records");
        Ok(created)
    }
}
