use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: &str = "3001";
pub const DEFAULT_STORAGE_ROOT: &str = "server";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: String,
    pub storage_root: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub model_timeout: Duration,
    pub max_agent_steps: usize,
    pub command_timeout: Duration,
    pub vercel_token: Option<String>,
    pub deploy_cli: String,
    pub deploy_install: bool,
    pub deploy_timeout: Duration,
    pub session_ttl: Duration,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            model_timeout: Duration::from_secs(120),
            max_agent_steps: 25,
            command_timeout: Duration::from_secs(30),
            vercel_token: None,
            deploy_cli: "vercel".to_string(),
            deploy_install: false,
            deploy_timeout: Duration::from_secs(300),
            session_ttl: Duration::from_secs(3600),
            cert_path: None,
            key_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT").unwrap_or(defaults.port),
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_api_url: env::var("GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            model_timeout: secs_var("MODEL_TIMEOUT_SECS", defaults.model_timeout),
            max_agent_steps: env::var("MAX_AGENT_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_agent_steps),
            command_timeout: secs_var("COMMAND_TIMEOUT_SECS", defaults.command_timeout),
            vercel_token: non_empty_var("VERCEL_TOKEN"),
            deploy_cli: env::var("DEPLOY_CLI").unwrap_or(defaults.deploy_cli),
            deploy_install: env::var("DEPLOY_INSTALL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.deploy_install),
            deploy_timeout: secs_var("DEPLOY_TIMEOUT_SECS", defaults.deploy_timeout),
            session_ttl: secs_var("SESSION_TTL_SECS", defaults.session_ttl),
            cert_path: non_empty_var("CERT_PATH"),
            key_path: non_empty_var("KEY_PATH"),
        }
    }

    /// Name of the storage root as it appears in client-facing paths
    /// (`server/site/index.html`).
    pub fn root_name(&self) -> String {
        root_name_of(&self.storage_root)
    }
}

pub fn root_name_of(root: &std::path::Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_STORAGE_ROOT.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs_var(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn root_name_is_last_path_component() {
        assert_eq!(root_name_of(Path::new("server")), "server");
        assert_eq!(root_name_of(Path::new("/var/data/sites")), "sites");
        assert_eq!(root_name_of(Path::new("/")), "server");
    }
}
