//! HTTP access to the simulation service.

use crate::model::{ErrorBody, InitResponse, RunConfig, UpdateResponse};
use anyhow::{Context, Result};
use std::future::Future;

/// Failures at the HTTP seam.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The service answered with a non-OK status. `message` is shown verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The two operations the simulation service exposes.
pub trait SimApi: Send + Sync + 'static {
    /// `POST /init` with the form field `num_people`.
    fn init(
        &self,
        num_people: u32,
    ) -> impl Future<Output = Result<InitResponse, ApiError>> + Send;

    /// `GET /update`.
    fn update(&self) -> impl Future<Output = Result<UpdateResponse, ApiError>> + Send;
}

pub struct HttpSimClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSimClient {
    pub fn new(cfg: &RunConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pick the message for a non-OK response: the body's `error` field when present,
/// otherwise the status line.
fn rejection_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Server returned {status}"))
}

impl SimApi for HttpSimClient {
    async fn init(&self, num_people: u32) -> Result<InitResponse, ApiError> {
        let resp = self
            .http
            .post(self.url("/init"))
            .form(&[("num_people", num_people.to_string())])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: rejection_message(status, &body),
            });
        }
        // The acknowledgement is informational only.
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }

    async fn update(&self) -> Result<UpdateResponse, ApiError> {
        let resp = self.http.get(self.url("/update")).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: rejection_message(status, &body),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
