use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub downloads_path: String,
    pub public_origin: String,
    pub gemini_api_hostname: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub analysis_step_delay: Duration,
    pub stream_idle_timeout: Duration,
    pub session_timeout: Duration,
}

fn env_millis(key: &str, default: u64) -> Duration {
    let millis = env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}

fn env_secs(key: &str, default: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

impl AppConfig {
    /// Builds a config rooted at `storage_path` using the defaults for
    /// everything else. Used by tests and by `Default`.
    pub fn with_storage_path(storage_path: &str) -> Self {
        let storage_path = storage_path.trim_end_matches('/').to_string();
        let host = "127.0.0.1";
        let port = "2222";

        Self {
            db_path: format!("{}/db", storage_path),
            downloads_path: format!("{}/downloads", storage_path),
            public_origin: format!("http://{}:{}", host, port),
            gemini_api_hostname: "https://generativelanguage.googleapis.com".to_string(),
            gemini_api_key: "thiswontworkforgemini".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            analysis_step_delay: Duration::from_millis(800),
            stream_idle_timeout: Duration::from_secs(60),
            session_timeout: Duration::from_secs(30),
            storage_path,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("CODEVAULT_STORAGE_PATH").unwrap_or(".".to_string());
        let defaults = Self::with_storage_path(&storage_path);

        let public_origin =
            env::var("CODEVAULT_PUBLIC_ORIGIN").unwrap_or(defaults.public_origin.clone());
        let gemini_api_hostname = env::var("CODEVAULT_GEMINI_HOST")
            .unwrap_or_else(|_| defaults.gemini_api_hostname.clone());
        let gemini_api_key =
            env::var("GEMINI_API_KEY").unwrap_or_else(|_| defaults.gemini_api_key.clone());
        let gemini_model =
            env::var("CODEVAULT_GEMINI_MODEL").unwrap_or_else(|_| defaults.gemini_model.clone());
        let analysis_step_delay = env_millis("CODEVAULT_ANALYSIS_STEP_MS", 800);
        let stream_idle_timeout = env_secs("CODEVAULT_STREAM_TIMEOUT_SECS", 60);
        let session_timeout = env_secs("CODEVAULT_SESSION_TIMEOUT_SECS", 30);

        Self {
            public_origin: public_origin.trim_end_matches('/').to_string(),
            gemini_api_hostname,
            gemini_api_key,
            gemini_model,
            analysis_step_delay,
            stream_idle_timeout,
            session_timeout,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_derived_from_storage_path() {
        let config = AppConfig::with_storage_path("/tmp/codevault/");
        assert_eq!(config.storage_path, "/tmp/codevault");
        assert_eq!(config.db_path, "/tmp/codevault/db");
        assert_eq!(config.downloads_path, "/tmp/codevault/downloads");
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
    }
}
