use std::path::PathBuf;

use blockreel_comfyui::client::derive_ws_url;
use blockreel_comfyui::renderer::DEFAULT_CHECKPOINT;
use blockreel_comfyui::ComfyUIConfig;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root directory of the job store.
    pub output_dir: PathBuf,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
    pub ffmpeg_path: String,
    pub comfyui_url: String,
    pub comfyui_ws_url: String,
    /// Checkpoint loaded by the txt2img workflow.
    pub sd_model: String,
    pub comfyui_connect_attempts: u32,
    /// Renders allowed in flight across all jobs.
    pub max_concurrent_renders: usize,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                                       |
    /// |----------------------------|-----------------------------------------------|
    /// | `HOST`                     | `0.0.0.0`                                     |
    /// | `PORT`                     | `8000`                                        |
    /// | `CORS_ORIGINS`             | `http://localhost:3000,http://127.0.0.1:3000` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                                          |
    /// | `OUTPUT_DIR`               | `./outputs`                                   |
    /// | `STATIC_DIR`               | `./static`                                    |
    /// | `FFMPEG_PATH`              | `ffmpeg`                                      |
    /// | `COMFYUI_URL`              | `http://127.0.0.1:8188`                       |
    /// | `COMFYUI_WS_URL`           | derived from `COMFYUI_URL`                    |
    /// | `SD_MODEL`                 | `v1-5-pruned-emaonly.safetensors`             |
    /// | `COMFYUI_CONNECT_ATTEMPTS` | `3`                                           |
    /// | `MAX_CONCURRENT_RENDERS`   | `1`                                           |
    /// | `LOG_FORMAT`               | `text`                                        |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");

        let port: u16 = env_or("PORT", "8000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_origins(&env_or(
            "CORS_ORIGINS",
            "http://localhost:3000,http://127.0.0.1:3000",
        ));

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let comfyui_url = env_or("COMFYUI_URL", "http://127.0.0.1:8188");
        let comfyui_ws_url =
            std::env::var("COMFYUI_WS_URL").unwrap_or_else(|_| derive_ws_url(&comfyui_url));

        let comfyui_connect_attempts: u32 = env_or("COMFYUI_CONNECT_ATTEMPTS", "3")
            .parse()
            .expect("COMFYUI_CONNECT_ATTEMPTS must be a valid u32");

        let max_concurrent_renders: usize = env_or("MAX_CONCURRENT_RENDERS", "1")
            .parse()
            .expect("MAX_CONCURRENT_RENDERS must be a valid usize");

        let log_format = parse_log_format(&env_or("LOG_FORMAT", "text"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "./outputs")),
            static_dir: PathBuf::from(env_or("STATIC_DIR", "./static")),
            ffmpeg_path: env_or("FFMPEG_PATH", "ffmpeg"),
            comfyui_url,
            comfyui_ws_url,
            sd_model: env_or("SD_MODEL", DEFAULT_CHECKPOINT),
            comfyui_connect_attempts,
            max_concurrent_renders,
            log_format,
        }
    }

    /// Connection settings for the ComfyUI renderer.
    pub fn comfyui(&self) -> ComfyUIConfig {
        ComfyUIConfig {
            api_url: self.comfyui_url.clone(),
            ws_url: self.comfyui_ws_url.clone(),
            checkpoint: self.sd_model.clone(),
            connect_attempts: self.comfyui_connect_attempts,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_log_format(raw: &str) -> LogFormat {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => LogFormat::Json,
        "text" | "" => LogFormat::Text,
        other => panic!("LOG_FORMAT must be `text` or `json`, got `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_empty_entries_dropped() {
        assert_eq!(
            parse_origins(" http://a:3000 ,, http://b:3000,"),
            vec!["http://a:3000".to_string(), "http://b:3000".to_string()]
        );
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!(parse_log_format("JSON"), LogFormat::Json);
        assert_eq!(parse_log_format("text"), LogFormat::Text);
    }

    #[test]
    #[should_panic(expected = "LOG_FORMAT")]
    fn unknown_log_format_panics() {
        parse_log_format("xml");
    }
}
