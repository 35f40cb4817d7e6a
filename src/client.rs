//! Client side of the download flow.
//!
//! Mirrors what a user-facing page does: validate the input, post one
//! request, sit out the gate countdown, then hand over the navigation path.
//! Transport and clock sit behind traits so the whole flow runs in tests
//! without sockets or real timers.

use thiserror::Error;
use tokio::time::{Duration, sleep};

use crate::api::{DEFAULT_FORMAT, DownloadRequest, DownloadResponse};
use crate::gate::{self, GateFlow};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Please paste a valid URL.")]
    EmptyUrl,
    /// Server-reported failure; the message is surfaced verbatim.
    #[error("{0}")]
    Server(String),
    #[error("{0}")]
    Network(#[from] reqwest::Error),
}

/// What the flow surfaces to whatever renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Status(String),
    Countdown(u8),
    ConfirmReady,
}

#[allow(async_fn_in_trait)]
pub trait DownloadApi {
    async fn request_download(&self, request: &DownloadRequest)
    -> Result<DownloadResponse, FlowError>;
}

#[allow(async_fn_in_trait)]
pub trait Ticker {
    async fn tick(&mut self);
}

/// Real countdown clock: one tick per second.
pub struct SecondTicker;

impl Ticker for SecondTicker {
    async fn tick(&mut self) {
        sleep(Duration::from_secs(1)).await;
    }
}

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// No request timeout here: the server holds the POST open for the whole
    /// fetch, which can legitimately take minutes.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Redeem a confirmed gate path (`/download/...`) for the file response.
    pub async fn fetch_download(&self, path: &str) -> Result<reqwest::Response, FlowError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FlowError::Server(format!(
                "download failed with status {}",
                response.status()
            )));
        }

        Ok(response)
    }
}

impl DownloadApi for HttpApi {
    async fn request_download(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadResponse, FlowError> {
        let response = self
            .client
            .post(format!("{}/api/download", self.base_url))
            .json(request)
            .send()
            .await?;

        let ok_status = response.status().is_success();
        let body: DownloadResponse = response
            .json()
            .await
            .map_err(|_| FlowError::Server("Server error".to_string()))?;

        if !ok_status || !body.ok {
            return Err(FlowError::Server(
                body.error.unwrap_or_else(|| "Server error".to_string()),
            ));
        }

        Ok(body)
    }
}

/// File name to save a redeemed download under: the decoded final path
/// segment, reduced to its basename so a hostile token can never name a
/// location outside the chosen output directory.
pub fn saved_file_name(path: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    std::path::Path::new(&decoded)
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .unwrap_or_else(|| "download.bin".to_string())
}

/// Run the whole flow for one submission and return the navigation path.
///
/// Emits the same surface a page would show: a status line per phase, one
/// countdown value per second from 5 down to 0, and a ready marker when the
/// confirm action unlocks. Every failure leaves the flow idle again, so the
/// caller is free to retry.
pub async fn run_flow<A: DownloadApi, T: Ticker>(
    api: &A,
    ticker: &mut T,
    url: &str,
    format: &str,
    mut on_event: impl FnMut(FlowEvent),
) -> Result<String, FlowError> {
    let url = url.trim();
    if url.is_empty() {
        on_event(FlowEvent::Status("Please paste a valid URL.".to_string()));
        return Err(FlowError::EmptyUrl);
    }

    let format = {
        let trimmed = format.trim();
        if trimmed.is_empty() {
            DEFAULT_FORMAT
        } else {
            trimmed
        }
    };

    let mut flow = GateFlow::new();
    flow.submit();
    on_event(FlowEvent::Status("Fetching links...".to_string()));

    let request = DownloadRequest {
        url: url.to_string(),
        format: format.to_string(),
    };

    let token = match api.request_download(&request).await {
        Ok(DownloadResponse {
            token: Some(token), ..
        }) => token,
        Ok(_) => {
            // ok:true without a token is as unusable as an outright failure
            flow.response_failed();
            on_event(FlowEvent::Status("Failed: Server error".to_string()));
            return Err(FlowError::Server("Server error".to_string()));
        }
        Err(error) => {
            flow.response_failed();
            on_event(FlowEvent::Status(format!("Failed: {error}")));
            return Err(error);
        }
    };

    flow.response_ok(token);
    while let Some(remaining) = flow.remaining() {
        on_event(FlowEvent::Countdown(remaining));
        if flow.can_confirm() {
            break;
        }
        ticker.tick().await;
        flow.tick();
    }

    on_event(FlowEvent::ConfirmReady);
    on_event(FlowEvent::Status("Starting download...".to_string()));

    let Some(token) = flow.confirm() else {
        return Err(FlowError::Server("Server error".to_string()));
    };
    let path = gate::download_path(&token);
    flow.finish();

    Ok(path)
}
