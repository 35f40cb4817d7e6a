//! Router, shared state and request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequest, Path, Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

use crate::api::{DEFAULT_FORMAT, DownloadRequest, DownloadResponse};
use crate::error::ApiError;
use crate::fetch;
use crate::history::{self, UrlRecord};

/// Records returned by the admin listing.
pub const ADMIN_RECENT: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub history: Arc<Mutex<Vec<UrlRecord>>>,
    pub history_path: PathBuf,
    pub tmp_dir: PathBuf,
    pub admin_password: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/download", post(api_download))
        .route("/download/{token}", get(direct_download))
        .route("/api/admin/urls", post(admin_urls))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Lenient JSON extractor: an unreadable or incomplete body deserializes as
/// the default value, so handler validation decides the response shape
/// instead of the framework's plain-text rejection.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = Json::<T>::from_request(request, state)
            .await
            .map(|Json(value)| value)
            .unwrap_or_default();
        Ok(Self(value))
    }
}

/// Fetches the media and answers with a token the client redeems at
/// `/download/{token}` once its gate elapses.
pub async fn api_download(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<DownloadRequest>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let url = payload.url.trim();
    let format = {
        let format = payload.format.trim().to_ascii_lowercase();
        if format.is_empty() {
            DEFAULT_FORMAT.to_string()
        } else {
            format
        }
    };

    if url.is_empty() || !is_http_url(url) {
        return Err(ApiError::bad_request("Invalid URL"));
    }

    record_url(&state, url).await;

    let id = fetch::job_id();
    let template = fetch::output_template(&state.tmp_dir, &id);
    let args = fetch::build_args(&format, &template, url);
    info!("running yt-dlp: {}", args.join(" "));

    let output = fetch::run_yt_dlp(args).await?;

    let Some(found) = fetch::find_output(&state.tmp_dir, &id).await? else {
        warn!(
            "download failed. stdout: {} stderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(ApiError::internal(
            "Failed to download. Try a different link.",
        ));
    };

    let token = found
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| ApiError::internal("Failed to download. Try a different link."))?;

    Ok(Json(DownloadResponse::success(token)))
}

/// Streams a finished file by token. The token is reduced to its final path
/// component so it can only name files inside the temp dir, and the file is
/// unlinked before streaming: the open handle keeps the data alive for this
/// response and a replayed token gets a 404.
pub async fn direct_download(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let safe_name = std::path::Path::new(&token)
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| ApiError::not_found("File not found or expired"))?;
    let path = state.tmp_dir.join(&safe_name);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found or expired"))?;
    if !metadata.is_file() {
        return Err(ApiError::not_found("File not found or expired"));
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found or expired"))?;
    if let Err(error) = tokio::fs::remove_file(&path).await {
        warn!("could not unlink served file {:?}: {error}", path);
    }

    let mime = mime_guess::from_path(&safe_name).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref())
            .map_err(|_| ApiError::internal("could not build response headers"))?,
    );
    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .map_err(|_| ApiError::internal("could not build response headers"))?,
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&safe_name))
            .map_err(|_| ApiError::internal("could not build response headers"))?,
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub password: String,
}

/// Recent requested URLs, guarded by the configured admin password. The
/// endpoint plays dead when no password is configured.
pub async fn admin_urls(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AdminRequest>,
) -> Result<Json<Vec<UrlRecord>>, ApiError> {
    let Some(expected) = state.admin_password.as_deref() else {
        return Err(ApiError::not_found("Not found"));
    };
    if payload.password != expected {
        return Err(ApiError::forbidden("Wrong password"));
    }

    let records = state
        .history
        .lock()
        .await
        .iter()
        .take(ADMIN_RECENT)
        .cloned()
        .collect();
    Ok(Json(records))
}

/// Best-effort: a persistence hiccup is logged and must not block the fetch.
async fn record_url(state: &AppState, url: &str) {
    let snapshot = {
        let mut records = state.history.lock().await;
        history::push(&mut records, url);
        records.clone()
    };
    if let Err(error) = history::persist(&state.history_path, &snapshot).await {
        warn!("could not record url: {}", error.message);
    }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitize_ascii_filename(filename),
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric()
                || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
            {
                character
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}
