use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::AuthFlowError;

/// Authorization settings, mirroring the `_auth-config` JSON blob a
/// protected Dash page embeds. Read once and passed into each flow at
/// construction; immutable afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// OAuth client id registered with the Plotly server.
    pub oauth_client_id: String,
    /// Base URL of the Plotly server, e.g. `https://plot.ly`.
    pub plotly_domain: String,
    /// Deployment path prefix for all front-end API endpoints, e.g.
    /// `/my-dash-app/` behind path-based routing. Always honored when
    /// building the redirect URI; defaults to `/`.
    #[serde(default = "default_pathname_prefix")]
    pub requests_pathname_prefix: String,
}

fn default_pathname_prefix() -> String {
    "/".to_string()
}

impl AuthConfig {
    /// Parse the embedded `_auth-config` JSON payload.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse auth config JSON")
    }
}

/// Explicit stand-in for the opener's `window.location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// `scheme://host[:port]`, no trailing slash.
    pub origin: String,
}

impl Location {
    /// Reduce a full app URL to its origin. The current pathname is dropped
    /// on purpose: app pages can live under arbitrary sub-paths that have
    /// nothing to do with the redirect endpoint.
    pub fn from_url(url: &str) -> Result<Self, AuthFlowError> {
        let parsed = url::Url::parse(url)?;
        Ok(Self {
            origin: parsed.origin().ascii_serialization(),
        })
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// URL the protected Dash app is served at.
    pub app_url: String,
    /// Browser opener command; platform default when unset.
    pub browser_command: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub auth: AuthConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Get default config file path
    /// Returns ~/.dash-oauth-login/config.toml (cross-platform)
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        let config_dir = home.join(".dash-oauth-login");
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        // Check if file exists, if not create a default one
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // Resolve environment variables
        config.resolve_env_vars()?;

        Ok(config)
    }

    /// Create a default configuration file
    fn create_default_config(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        eprintln!("Created default config file at: {}", path.display());
        eprintln!("Please edit the config file to point at your Dash app.");

        Ok(())
    }

    /// Generate default configuration content as TOML string
    fn default_config_content() -> String {
        r#"# dash-oauth-login configuration
#
# Point this at the Dash app you want to log in to.

# URL the protected Dash app is served at
app_url = "http://127.0.0.1:8050/"

# Optional: browser opener command (platform default when unset)
# browser_command = "firefox"

log_level = "info"

[auth]
# OAuth client id registered with the Plotly server.
# Use "$VAR" to read the value from an environment variable.
oauth_client_id = ""

# Base URL of the Plotly server
plotly_domain = "https://plot.ly"

# Deployment path prefix, e.g. "/my-dash-app/" behind path-based routing
requests_pathname_prefix = "/"
"#
        .to_string()
    }

    /// Resolve environment variables in configuration
    fn resolve_env_vars(&mut self) -> Result<()> {
        if self.auth.oauth_client_id.starts_with('$') {
            let env_var = &self.auth.oauth_client_id[1..];
            match std::env::var(env_var) {
                Ok(value) => self.auth.oauth_client_id = value,
                Err(_) => anyhow::bail!(
                    "Environment variable {} not found for oauth_client_id",
                    env_var
                ),
            }
        }
        Ok(())
    }
}
