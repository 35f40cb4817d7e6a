//! yt-dlp invocation and temp-file bookkeeping.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub const YTDLP_TIMEOUT: Duration = Duration::from_secs(12 * 60);

/// Temp files older than this were fetched but never claimed by a token.
pub const STALE_FILE_AGE: Duration = Duration::from_secs(2 * 60 * 60);

/// Short random id tying one request to its output files.
pub fn job_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(10);
    id
}

pub fn output_template(tmp_dir: &Path, id: &str) -> String {
    format!("{}/video-{id}.%(ext)s", tmp_dir.to_string_lossy())
}

/// Argument list for one fetch. `mp3` extracts audio; everything else prefers
/// an mp4 container with a best-quality fallback chain.
pub fn build_args(format: &str, output_template: &str, url: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "--no-playlist",
        "--geo-bypass",
        "-N",
        "4",
        // android player client sidesteps SABR streaming on many videos
        "--extractor-args",
        "youtube:player_client=android",
        "-o",
        output_template,
    ]
    .into_iter()
    .map(String::from)
    .collect();

    if format == "mp3" {
        args.extend(
            ["-x", "--audio-format", "mp3", "-S", "abr,asr,ext:m4a"]
                .into_iter()
                .map(String::from),
        );
    } else {
        args.extend(
            [
                "-f",
                "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b",
                "-S",
                "res,ext:mp4:m4a",
            ]
            .into_iter()
            .map(String::from),
        );
    }

    args.push(url.to_string());
    args
}

pub async fn run_yt_dlp(args: Vec<String>) -> Result<std::process::Output, ApiError> {
    let command_future = Command::new("yt-dlp").args(&args).output();
    let output = timeout(YTDLP_TIMEOUT, command_future)
        .await
        .map_err(|_| ApiError::timeout("Download timed out"))?
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                ApiError::internal("yt-dlp is not installed on the server")
            } else {
                ApiError::internal(format!("Server process error: {error}"))
            }
        })?;

    Ok(output)
}

/// Completed output for a job, skipping in-progress `.part` files.
pub async fn find_output(tmp_dir: &Path, id: &str) -> Result<Option<PathBuf>, ApiError> {
    let prefix = format!("video-{id}");
    let mut entries = tokio::fs::read_dir(tmp_dir)
        .await
        .map_err(|error| ApiError::internal(format!("could not read temp dir: {error}")))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|error| ApiError::internal(format!("could not scan temp dir: {error}")))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && !name.ends_with(".part") {
            return Ok(Some(entry.path()));
        }
    }

    Ok(None)
}

/// Startup sweep of abandoned temp files.
pub async fn sweep_stale(tmp_dir: &Path, older_than: Duration) {
    let mut entries = match tokio::fs::read_dir(tmp_dir).await {
        Ok(entries) => entries,
        Err(error) => {
            if error.kind() != ErrorKind::NotFound {
                warn!("could not open temp dir for sweep: {error}");
            }
            return;
        }
    };

    let now = SystemTime::now();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(error) => {
                warn!("could not scan temp dir for sweep: {error}");
                break;
            }
        };

        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or(Duration::ZERO);
        if age < older_than {
            continue;
        }

        if let Err(error) = tokio::fs::remove_file(&path).await
            && error.kind() != ErrorKind::NotFound
        {
            warn!("could not remove stale temp file {:?}: {error}", path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_short_and_unique() {
        let a = job_id();
        let b = job_id();
        assert_eq!(a.len(), 10);
        assert_ne!(a, b);
    }

    #[test]
    fn mp4_args_prefer_the_mp4_container() {
        let args = build_args("mp4", "/tmp/video-x.%(ext)s", "https://x.test/v");
        assert_eq!(args.last().map(String::as_str), Some("https://x.test/v"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(
            args.contains(&"bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b".to_string()),
            "mp4 selector missing: {args:?}"
        );
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn mp3_args_extract_audio() {
        let args = build_args("mp3", "/tmp/video-x.%(ext)s", "https://x.test/v");
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"mp3".to_string()));
        assert!(args.contains(&"abr,asr,ext:m4a".to_string()));
    }

    #[test]
    fn unknown_formats_fall_back_to_the_video_selector() {
        let args = build_args("webm", "/tmp/video-x.%(ext)s", "https://x.test/v");
        assert!(args.contains(&"res,ext:mp4:m4a".to_string()));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[tokio::test]
    async fn find_output_skips_part_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("video-abc123.mp4.part"), b"partial").expect("write");
        assert_eq!(find_output(dir.path(), "abc123").await.expect("scan"), None);

        std::fs::write(dir.path().join("video-abc123.mp4"), b"done").expect("write");
        let found = find_output(dir.path(), "abc123").await.expect("scan");
        assert_eq!(found, Some(dir.path().join("video-abc123.mp4")));
    }

    #[tokio::test]
    async fn find_output_ignores_other_jobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("video-other0.mp4"), b"x").expect("write");
        assert_eq!(find_output(dir.path(), "abc123").await.expect("scan"), None);
    }

    #[tokio::test]
    async fn sweep_keeps_fresh_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fresh = dir.path().join("video-fresh0.mp4");
        std::fs::write(&fresh, b"x").expect("write");
        sweep_stale(dir.path(), STALE_FILE_AGE).await;
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn sweep_removes_old_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let old = dir.path().join("video-old000.mp4");
        std::fs::write(&old, b"x").expect("write");
        sweep_stale(dir.path(), Duration::ZERO).await;
        assert!(!old.exists());
    }
}
