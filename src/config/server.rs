use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub app: AppSection,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("logdeck.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 19001,
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Public URL the console is served from; login redirects are built from it.
    pub root_url: String,
    /// "demo" disables password changes.
    pub mode: String,
}

impl AppSection {
    #[must_use]
    pub fn is_demo(&self) -> bool {
        self.mode == "demo"
    }
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            root_url: "http://localhost:19001/".to_string(),
            mode: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_secs: i64,
    /// Set the Secure attribute on the session cookie.
    pub secure_cookie: bool,
    pub anonymous: AnonymousConfig,
    pub proxy: ProxyConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            secure_cookie: false,
            anonymous: AnonymousConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnonymousConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub header_name: String,
    pub header_nickname: String,
    pub root_token_key: String,
    pub root_token_value: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: "X-WEBAUTH-USER".to_string(),
            header_nickname: "X-WEBAUTH-NICKNAME".to_string(),
            root_token_key: "X-WEBAUTH-ROOT-TOKEN".to_string(),
            root_token_value: String::new(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads the file at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Login page derived from the configured root URL.
    #[must_use]
    pub fn login_url(&self) -> String {
        let root = self.app.root_url.trim();
        if root.ends_with('/') {
            format!("{root}user/login")
        } else {
            format!("{root}/user/login")
        }
    }
}
