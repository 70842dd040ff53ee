//! Configuration for agentrelay.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ADK_API_URL, AGENTRELAY_CALLER_ID, AGENTRELAY_PIPELINES)
//! 2. Config file (.agentrelay/config.yaml)
//! 3. Defaults (backend on localhost:8000)
//!
//! Config file discovery:
//! - Searches current directory and parents for .agentrelay/config.yaml
//! - Falls back to ~/.agentrelay/config.yaml
//! - Paths in config file are relative to the project root holding .agentrelay/
//!
//! The resolved config is a plain value handed to whoever needs it; there
//! is no process-wide backend address.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::safety::SafetyLimits;

pub const ENV_BACKEND_URL: &str = "ADK_API_URL";
pub const ENV_CALLER_ID: &str = "AGENTRELAY_CALLER_ID";
pub const ENV_PIPELINES: &str = "AGENTRELAY_PIPELINES";

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_CALLER_ID: &str = "api_user";
const DEFAULT_PIPELINES_DIR: &str = "pipelines";
const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8002";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub limits: SafetyLimits,
    #[serde(default)]
    pub server: ServerConfig,
    /// Pipeline directory (relative to the project root)
    #[serde(default)]
    pub pipelines_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub address: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Base URL of the execution backend
    pub backend_url: String,
    /// Caller (backend user) id sessions are created under
    pub caller_id: String,
    /// Directory holding pipeline YAML files
    pub pipelines_dir: PathBuf,
    /// Address the HTTP server binds to
    pub server_address: String,
    /// Limits and timeouts
    pub limits: SafetyLimits,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".agentrelay").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let home_config = dirs::home_dir()?.join(".agentrelay").join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge a parsed config file with environment overrides and defaults
fn resolve(
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path), config),
        None => (None, ConfigFile::default()),
    };

    // Project root is the parent of .agentrelay/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf);

    let backend_url = env(ENV_BACKEND_URL)
        .or(config.backend.url)
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

    let caller_id = env(ENV_CALLER_ID)
        .or(config.backend.caller_id)
        .unwrap_or_else(|| DEFAULT_CALLER_ID.to_string());

    let pipelines_dir = if let Some(dir) = env(ENV_PIPELINES) {
        PathBuf::from(dir)
    } else {
        let dir = config
            .pipelines_dir
            .unwrap_or_else(|| DEFAULT_PIPELINES_DIR.to_string());
        match &base_dir {
            Some(base) => resolve_path(base, &dir),
            None => PathBuf::from(dir),
        }
    };

    let server_address = config
        .server
        .address
        .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());

    ResolvedConfig {
        backend_url,
        caller_id,
        pipelines_dir,
        server_address,
        limits: config.limits,
        config_file,
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(file, |key| std::env::var(key).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, no_env);

        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.caller_id, "api_user");
        assert_eq!(config.pipelines_dir, PathBuf::from("pipelines"));
        assert_eq!(config.server_address, "0.0.0.0:8002");
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let relay_dir = temp.path().join(".agentrelay");
        std::fs::create_dir_all(&relay_dir).unwrap();

        let config_path = relay_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
backend:
  url: http://adk-api:8000
  caller_id: u_test
limits:
  run_timeout_seconds: 120
server:
  address: 127.0.0.1:9000
pipelines_dir: team/pipelines
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version.as_deref(), Some("1.0"));

        let config = resolve(Some((config_path.clone(), parsed)), no_env);
        assert_eq!(config.backend_url, "http://adk-api:8000");
        assert_eq!(config.caller_id, "u_test");
        assert_eq!(config.limits.run_timeout_seconds, 120);
        assert_eq!(config.limits.request_timeout_seconds, 30);
        assert_eq!(config.server_address, "127.0.0.1:9000");
        assert_eq!(config.pipelines_dir, temp.path().join("team/pipelines"));
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            backend: BackendConfig {
                url: Some("http://from-file:8000".to_string()),
                caller_id: Some("file_user".to_string()),
            },
            ..Default::default()
        };
        let env: HashMap<&str, &str> = [
            (ENV_BACKEND_URL, "http://from-env:8000"),
            (ENV_PIPELINES, "/srv/pipelines"),
        ]
        .into_iter()
        .collect();

        let config = resolve(
            Some((PathBuf::from("/project/.agentrelay/config.yaml"), file)),
            |key| env.get(key).map(|v| v.to_string()),
        );

        assert_eq!(config.backend_url, "http://from-env:8000");
        assert_eq!(config.caller_id, "file_user");
        assert_eq!(config.pipelines_dir, PathBuf::from("/srv/pipelines"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "pipelines"),
            PathBuf::from("/home/user/project/pipelines")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
