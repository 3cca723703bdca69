//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use karabridge_core::protocol_constants::{
    DEFAULT_APP_NAME, DEFAULT_BIND_PORT, DEFAULT_LOGIN, DEFAULT_UPSTREAM_URL,
};
use karabridge_core::ProtocolProfile;
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to.
    /// Override: `KARABRIDGE_BIND_PORT`
    pub bind_port: u16,

    /// Karaoke service endpoint.
    /// Override: `KARABRIDGE_UPSTREAM_URL`
    pub upstream_url: String,

    /// Initial login name for upstream sessions.
    /// Override: `KARABRIDGE_LOGIN`
    pub login: String,

    /// `app` field sent with `authenticate`.
    pub app_name: String,

    /// Login collisions tolerated per session before giving up.
    /// Override: `KARABRIDGE_MAX_LOGIN_RETRIES`
    pub max_login_retries: u32,

    /// Optional fields exposed by the upstream protocol version.
    pub profile: ProtocolProfile,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: DEFAULT_BIND_PORT,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            login: DEFAULT_LOGIN.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            max_login_retries: 3,
            profile: ProtocolProfile::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies overrides from `lookup`. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("KARABRIDGE_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(url) = lookup("KARABRIDGE_UPSTREAM_URL").filter(|v| !v.is_empty()) {
            self.upstream_url = url;
        }

        if let Some(login) = lookup("KARABRIDGE_LOGIN").filter(|v| !v.is_empty()) {
            self.login = login;
        }

        if let Some(retries) = lookup("KARABRIDGE_MAX_LOGIN_RETRIES").and_then(|v| v.parse().ok())
        {
            self.max_login_retries = retries;
        }
    }

    /// Converts to karabridge-core's Config type.
    pub fn to_core_config(&self) -> karabridge_core::Config {
        karabridge_core::Config {
            preferred_port: self.bind_port,
            upstream_url: self.upstream_url.clone(),
            login: self.login.clone(),
            app_name: self.app_name.clone(),
            max_login_retries: self.max_login_retries,
            profile: self.profile,
        }
    }
}
