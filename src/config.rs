//! Configuration management for PyPack Mirror
//!
//! This module provides configuration loading from TOML files with
//! multi-source lookup, environment variable overrides, validation, and
//! conversion into the runtime settings of the server and upstream client.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::client::ClientConfig;
use crate::constants::{env, http, limits, server, PROG_NAME};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listen address
    pub server: ServerConfigToml,
    /// Storage and upstream index settings
    pub mirror: MirrorConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Outbound proxy settings
    pub proxy: ProxyConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfigToml {
    /// Listen host (IP address)
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl Default for ServerConfigToml {
    fn default() -> Self {
        Self {
            host: server::DEFAULT_HOST.to_string(),
            port: server::DEFAULT_PORT,
        }
    }
}

/// TOML-friendly mirror configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfigToml {
    /// Root of the artifact tree; absolute and existing
    pub storage_path: Option<PathBuf>,
    /// Upstream simple index; empty or `"false"` disables it
    pub index_url: Option<String>,
    /// Project home page template containing `{}`
    pub project_url: Option<String>,
}

impl Default for MirrorConfigToml {
    fn default() -> Self {
        Self {
            storage_path: None,
            index_url: Some(http::DEFAULT_INDEX_URL.to_string()),
            project_url: None,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Read inactivity timeout; also bounds each index fetch attempt
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Retries of the index fetch after the first attempt
    pub max_retries: u32,
    /// Base delay of the index fetch backoff
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    /// User-Agent header for outbound requests
    pub user_agent: String,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            user_agent: http::USER_AGENT.to_string(),
        }
    }
}

/// TOML-friendly proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfigToml {
    /// Proxy URL, http or https
    pub url: Option<String>,
    /// Proxy user
    pub user: Option<String>,
    /// Proxy password
    pub pass: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Validated settings of the HTTP server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Socket address to bind
    pub listen: SocketAddr,
    /// Root of the artifact tree
    pub storage_path: PathBuf,
    /// Project home page template
    pub project_url: Option<String>,
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit, or the first found in standard locations)
    /// 3. Environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if an explicit file does not exist and
    /// `ConfigError::InvalidFormat` if a file does not parse
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through a variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(env::STORAGE_PATH) {
            self.mirror.storage_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(env::INDEX_URL) {
            self.mirror.index_url = Some(value);
        }
        if let Some(value) = lookup(env::PROXY_URL) {
            self.proxy.url = Some(value);
        }
        if let Some(value) = lookup(env::PROXY_USER) {
            self.proxy.user = Some(value);
        }
        if let Some(value) = lookup(env::PROXY_PASS) {
            self.proxy.pass = Some(value);
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(format!("./{PROG_NAME}.toml"))];
        if let Ok(path) = Self::get_default_config_path() {
            search_paths.push(path);
        }
        #[cfg(unix)]
        search_paths.push(PathBuf::from(format!("/etc/{PROG_NAME}/config.toml")));

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(PROG_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write the commented default configuration file
    ///
    /// Writes to `path`, or to the user config location when none is given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the file exists and `force` is
    /// not set, and `ConfigError::Io` if it cannot be written
    pub async fn write_default(path: Option<PathBuf>, force: bool) -> ConfigResult<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_default_config_path()?,
        };
        if config_path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: config_path.display().to_string(),
                reason: "File already exists; pass --force to overwrite".to_string(),
            });
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::Io {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
        }
        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(|e| ConfigError::Io {
                path: config_path.clone(),
                message: e.to_string(),
            })?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Render the configuration as TOML with the proxy password masked
    pub fn to_display_toml(&self) -> ConfigResult<String> {
        let mut shown = self.clone();
        if shown.proxy.pass.is_some() {
            shown.proxy.pass = Some("***".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// Validated storage root
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if no storage path is set, or it
    /// is relative or not an existing directory
    pub fn storage_root(&self) -> ConfigResult<PathBuf> {
        let path = self
            .mirror
            .storage_path
            .as_ref()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "mirror.storage_path".to_string(),
                value: String::new(),
                reason: format!("Set it in the config file, with --storage or {}", env::STORAGE_PATH),
            })?;
        check_storage_path(path)?;
        Ok(path.clone())
    }

    /// Convert to validated server settings
    pub fn server_settings(&self) -> ConfigResult<ServerSettings> {
        let host: IpAddr = self.server.host.parse().map_err(|_| ConfigError::InvalidValue {
            field: "server.host".to_string(),
            value: self.server.host.clone(),
            reason: "Must be an IP address".to_string(),
        })?;

        let project_url = match self.mirror.project_url.as_deref() {
            None | Some("") => None,
            Some(template) if template.contains("{}") => Some(template.to_string()),
            Some(template) => {
                return Err(ConfigError::InvalidValue {
                    field: "mirror.project_url".to_string(),
                    value: template.to_string(),
                    reason: "Must contain a {} placeholder for the project name".to_string(),
                })
            }
        };

        Ok(ServerSettings {
            listen: SocketAddr::new(host, self.server.port),
            storage_path: self.storage_root()?,
            project_url,
        })
    }

    /// Convert to runtime ClientConfig
    pub fn client_config(&self) -> ConfigResult<ClientConfig> {
        let index_url = match self.mirror.index_url.as_deref().map(str::trim) {
            None | Some("") | Some("false") => None,
            Some(value) => Some(check_url("mirror.index_url", value)?),
        };

        let proxy = match self.proxy.url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => {
                let mut url = check_url("proxy.url", value)?;
                splice_credentials(&mut url, self.proxy.user.as_deref(), self.proxy.pass.as_deref())?;
                Some(url)
            }
        };

        Ok(ClientConfig {
            index_url,
            proxy,
            user_agent: self.client.user_agent.clone(),
            request_timeout: self.client.request_timeout,
            connect_timeout: self.client.connect_timeout,
            max_retries: self.client.max_retries,
            retry_base_delay: self.client.retry_base_delay,
            ..ClientConfig::default()
        })
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# PyPack Mirror Configuration
# Durations accept human-readable values such as "30s" or "500ms".

[server]
host = "{host}"
port = {port}

[mirror]
# Root of the artifact tree (absolute path to an existing directory).
# Can also be set with --storage or {storage_env}.
# storage_path = "/srv/pypack-mirror"

# Upstream simple index; set to "false" to serve local artifacts only
index_url = "{index_url}"

# Project home page; {{}} is replaced with the project name
# project_url = "https://pypi.org/project/{{}}/"

[client]
# Longest silence tolerated while reading; also caps each index fetch attempt
request_timeout = "{request_timeout}s"
connect_timeout = "{connect_timeout}s"
# Index fetch retries, with exponential backoff from retry_base_delay
max_retries = {max_retries}
retry_base_delay = "{retry_ms}ms"
user_agent = "{user_agent}"

[proxy]
# url = "http://proxy.example:3128"
# user = "alice"
# pass = "secret"

[logging]
level = "info"  # error, warn, info, debug, trace
"#,
            host = server::DEFAULT_HOST,
            port = server::DEFAULT_PORT,
            storage_env = env::STORAGE_PATH,
            index_url = http::DEFAULT_INDEX_URL,
            request_timeout = http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
            max_retries = limits::MAX_RETRIES,
            retry_ms = limits::RETRY_BASE_DELAY_MS,
            user_agent = http::USER_AGENT,
        )
    }
}

/// Storage roots must be absolute, existing directories
fn check_storage_path(path: &Path) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        field: "mirror.storage_path".to_string(),
        value: path.display().to_string(),
        reason: reason.to_string(),
    };
    if !path.is_absolute() {
        return Err(invalid("Must be an absolute path"));
    }
    if !path.is_dir() {
        return Err(invalid("Must be an existing directory"));
    }
    Ok(())
}

/// Parse an http(s) URL that names a host
fn check_url(field: &str, value: &str) -> ConfigResult<Url> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("Only http and https URLs are supported".to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("URL must name a host".to_string()));
    }
    Ok(url)
}

/// Put proxy credentials into the URL's userinfo
fn splice_credentials(url: &mut Url, user: Option<&str>, pass: Option<&str>) -> ConfigResult<()> {
    let rejected = || ConfigError::InvalidValue {
        field: "proxy.user".to_string(),
        value: user.unwrap_or_default().to_string(),
        reason: "Credentials cannot be added to this proxy URL".to_string(),
    };
    match (user, pass) {
        (Some(user), pass) => {
            url.set_username(user).map_err(|_| rejected())?;
            url.set_password(pass).map_err(|_| rejected())?;
        }
        (None, Some(_)) => {
            return Err(ConfigError::InvalidValue {
                field: "proxy.pass".to_string(),
                value: "***".to_string(),
                reason: "A proxy password requires a proxy user".to_string(),
            })
        }
        (None, None) => {}
    }
    Ok(())
}
