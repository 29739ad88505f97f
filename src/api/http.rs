//! [`GameApi`] over the server's JSON HTTP endpoints.

use std::time::Duration;

use log::{debug, error, warn};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::{ApiError, GameApi};
use crate::common::NOT_FOUND_MESSAGE;
use crate::config::ClientConfig;
use crate::domain::{Game, GameId, GameSummary, MoveResult};

#[derive(Serialize)]
struct MoveRequest {
    column: usize,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        if base.cannot_be_a_base() {
            return Err(anyhow::anyhow!("API URL {} cannot be used as a base", base));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(config.api_base_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL with `segments` appended to its path.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let response = request.send().await.map_err(|e| {
            error!("[HttpApi] Request failed: {}", e);
            ApiError::Transport(e.to_string())
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!("[HttpApi] Failed to read response body: {}", e);
            ApiError::Transport(e.to_string())
        })?;
        debug!("[HttpApi] {} ({} bytes)", status, body.len());
        Ok((status, body.to_vec()))
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("[HttpApi] Malformed payload: {}", e);
        ApiError::Malformed(e.to_string())
    })
}

/// The `error` string of a JSON body, if it has one.
fn error_field(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body).ok()?.error
}

fn status_error(status: StatusCode, body: &[u8]) -> ApiError {
    let message = error_field(body);
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound(message.unwrap_or_else(|| NOT_FOUND_MESSAGE.to_string()));
    }
    match message {
        Some(message) if status.is_client_error() => ApiError::Rejected(message),
        _ => ApiError::Transport(format!("Unexpected status {}", status)),
    }
}

#[async_trait::async_trait]
impl GameApi for HttpApi {
    async fn get_game(&self, id: GameId) -> Result<Game, ApiError> {
        let url = self.endpoint(&["games", &id.to_string()]);
        debug!("[HttpApi] GET {}", url);
        let (status, body) = self.execute(self.client.get(url)).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        decode(&body)
    }

    async fn create_game(&self) -> Result<Game, ApiError> {
        let url = self.endpoint(&["games"]);
        debug!("[HttpApi] POST {}", url);
        let (status, body) = self.execute(self.client.post(url)).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        decode(&body)
    }

    async fn make_move(&self, id: GameId, column: usize) -> Result<MoveResult, ApiError> {
        let url = self.endpoint(&["games", &id.to_string(), "move"]);
        debug!("[HttpApi] POST {} column={}", url, column);
        let request = self.client.post(url).json(&MoveRequest { column });
        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        match decode::<MoveResult>(&body) {
            Ok(result) => Ok(result),
            // a rejection with an unreadable snapshot is still a rejection
            Err(e) => match error_field(&body) {
                Some(message) => Err(ApiError::Rejected(message)),
                None => Err(e),
            },
        }
    }

    async fn list_games(&self) -> Result<Vec<GameSummary>, ApiError> {
        let url = self.endpoint(&["games"]);
        debug!("[HttpApi] GET {}", url);
        let (status, body) = self.execute(self.client.get(url)).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        decode(&body)
    }
}
