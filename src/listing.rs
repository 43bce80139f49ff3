// Client for the remote room listing (rwfc.net /api/groups)

use std::time::Duration;

use thiserror::Error;
use tracing::instrument;

use crate::models::{PollOutcome, Room};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct ListingClient {
    http: reqwest::Client,
    url: String,
}

impl ListingClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// One bounded-time fetch. `Ok(None)` means the service answered with a `null` body.
    #[instrument(skip(self), fields(client = "listing", operation = "fetch_rooms", url = %self.url))]
    pub async fn fetch_rooms(&self) -> Result<Option<Vec<Room>>, UpstreamError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice::<Option<Vec<Room>>>(&body)?)
    }

    /// Fetch folded into a poll outcome; never fails.
    pub async fn poll(&self) -> PollOutcome {
        match self.fetch_rooms().await {
            Ok(Some(rooms)) => PollOutcome::Rooms(rooms),
            Ok(None) => PollOutcome::NoData,
            Err(e) => {
                tracing::warn!(error = %e, operation = "fetch_rooms", "Failed to retrieve groups");
                PollOutcome::Failed(e.to_string())
            }
        }
    }
}
