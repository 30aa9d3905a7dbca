use std::path::PathBuf;
use std::time::Duration;

/// Connection and retry policy for the remote generation server. All knobs
/// come from the environment so back-ends can be tuned without code changes.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub retries: u32,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub cleanup_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: "http://127.0.0.1:8188".to_string(),
            retries: 5,
            retry_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            cleanup_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RemoteConfig {
    pub fn from_env() -> Self {
        let defaults = RemoteConfig::default();
        RemoteConfig {
            base_url: std::env::var("COMFYUI_URL").unwrap_or(defaults.base_url),
            retries: env_u64("COMFYUI_RETRIES")
                .map(|v| (v as u32).max(1))
                .unwrap_or(defaults.retries),
            retry_delay: env_u64("COMFYUI_RETRY_DELAY_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            poll_interval: defaults.poll_interval,
            cleanup_delay: env_u64("COMFYUI_CLEANUP_DELAY_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_delay),
            request_timeout: env_u64("COMFYUI_REQUEST_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Shared default-assets folder (stock voices, fallback music).
pub fn default_assets_folder() -> PathBuf {
    std::env::var("DEFAULT_ASSETS_FOLDER")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("default_assets"))
}
