use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

use shared::{domain::SessionKey, error::ApiError, protocol::GameSession};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no session found for key {0}")]
    NotFound(SessionKey),
    #[error("session request failed: {0}")]
    Http(String),
    #[error("server rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to decode session payload: {0}")]
    Decode(String),
}

/// Pull side of the session boundary: one query, one mutation.
#[async_trait]
pub trait SessionDataSource: Send + Sync {
    async fn fetch_session(&self, key: &SessionKey) -> Result<GameSession, QueryError>;
    async fn reset_session(&self, key: &SessionKey) -> Result<(), QueryError>;
}

/// Data source backed by the game server's HTTP endpoints.
pub struct HttpDataSource {
    http: Client,
    base_url: String,
}

impl HttpDataSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionDataSource for HttpDataSource {
    async fn fetch_session(&self, key: &SessionKey) -> Result<GameSession, QueryError> {
        let resp = self
            .http
            .get(format!("{}/sessions/{}", self.base_url, key))
            .send()
            .await
            .map_err(|err| QueryError::Http(err.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(QueryError::NotFound(key.clone()));
        }
        let resp = reject_failure(resp).await?;
        resp.json::<GameSession>()
            .await
            .map_err(|err| QueryError::Decode(err.to_string()))
    }

    async fn reset_session(&self, key: &SessionKey) -> Result<(), QueryError> {
        let resp = self
            .http
            .post(format!("{}/sessions/{}/reset", self.base_url, key))
            .send()
            .await
            .map_err(|err| QueryError::Http(err.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(QueryError::NotFound(key.clone()));
        }
        reject_failure(resp).await?;
        Ok(())
    }
}

async fn reject_failure(resp: Response) -> Result<Response, QueryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ApiError>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(QueryError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
