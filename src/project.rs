//! Client-side local state: the per-project `.hush` descriptor and the
//! per-user credentials record.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Project descriptor file name, looked up in the working directory.
pub const PROJECT_FILE_NAME: &str = ".hush";

const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Environment overrides for the credentials record.
pub const SERVER_ENV: &str = "HUSH_SERVER";
pub const TOKEN_ENV: &str = "HUSH_TOKEN";

/// Output format for `pull`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Dotenv,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Dotenv,
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from(".env")
}

fn default_environment() -> String {
    "production".to_string()
}

/// The `.hush` project descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub output: OutputConfig,

    /// When non-empty, `pull` only writes these keys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    /// Prepended to every key written by `pull`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl ProjectConfig {
    pub fn new(project: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
            output: OutputConfig::default(),
            secrets: Vec::new(),
            prefix: None,
        }
    }

    /// Load `.hush` from the current directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(PROJECT_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = read_config_file(path)?;
        let config: ProjectConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.display().to_string(), e))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "project".to_string(),
                "must not be empty".to_string(),
            ));
        }
        if self.environment.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "environment".to_string(),
                "must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `key` passes the optional allow-list.
    pub fn wants(&self, key: &str) -> bool {
        self.secrets.is_empty() || self.secrets.iter().any(|k| k == key)
    }
}

/// Server URL and bearer token for the remote daemon.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub server: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// `~/.hush/credentials.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        crate::util::hush_dir()
            .map(|dir| dir.join(CREDENTIALS_FILE_NAME))
            .ok_or_else(|| {
                ConfigError::InvalidValue("HOME".to_string(), "cannot determine home".to_string())
            })
    }

    /// Load the credentials record, letting `HUSH_SERVER`/`HUSH_TOKEN`
    /// override individual fields. With both variables set no file is needed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env_server = lookup(SERVER_ENV).filter(|v| !v.trim().is_empty());
        let env_token = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty());

        let mut creds = match (env_server.clone(), env_token.clone()) {
            (Some(server), Some(token)) => Credentials { server, token },
            _ => {
                let contents = read_config_file(path)?;
                #[cfg(unix)]
                crate::util::warn_if_not_private(path);
                serde_json::from_str(&contents)
                    .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))?
            }
        };

        if let Some(server) = env_server {
            creds.server = server;
        }
        if let Some(token) = env_token {
            creds.token = token;
        }

        if creds.server.trim().is_empty() || creds.token.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                path.display().to_string(),
                "server and token are required".to_string(),
            ));
        }
        Ok(creds)
    }

    /// Persist with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))?;
        crate::util::write_private_file(path, contents.as_bytes())
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.display().to_string()),
        _ => ConfigError::Io(path.display().to_string(), e),
    })
}
