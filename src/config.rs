//! Environment-driven server configuration.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub admin_password: Option<String>,
    pub tmp_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

        Self {
            bind_addr: bind_addr(std::env::var("HOST").ok(), std::env::var("PORT").ok()),
            admin_password: std::env::var("ADMIN_PASSWORD")
                .ok()
                .and_then(|value| non_empty(&value).map(ToString::to_string)),
            tmp_dir: root.join("tmp"),
            data_dir: root.join("data"),
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("urls.json")
    }
}

pub fn bind_addr(host: Option<String>, port: Option<String>) -> String {
    let host = host
        .as_deref()
        .and_then(non_empty)
        .unwrap_or("127.0.0.1")
        .to_string();
    let port = port
        .as_deref()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(8787);

    format!("{host}:{port}")
}

pub fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
