//! Server configuration
//!
//! Configuration is read once at startup from an optional YAML file and then
//! patched with a handful of environment overrides. Every field has a default,
//! so an empty or partial file is valid.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which worker pool backend serves connections.
///
/// Chosen once at startup; switching at runtime is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Forked worker processes, descriptors passed over a Unix socket
    Process,
    /// OS threads inside the server process
    Thread,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" | "p" => Some(Mode::Process),
            "thread" | "t" => Some(Mode::Thread),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    /// Fixed number of workers in the pool
    pub workers: usize,
    /// Upper bound on bytes read while looking for the header terminator
    pub max_request_bytes: usize,
    /// Read timeout applied to each client connection, 0 disables it
    pub read_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mode: Mode::Process,
            workers: 4,
            max_request_bytes: 8192,
            read_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }
}

/// Where files are served from and which pages stand in for `/` and misses.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub root_dir: PathBuf,
    pub index_page: String,
    pub not_found_page: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./www"),
            index_page: "index.html".to_string(),
            not_found_page: "404.html".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
}

impl Config {
    /// Loads the configuration for this run.
    ///
    /// The file path is taken from the first command line argument, then from
    /// `STATICD_CONFIG`. Without either, defaults are used. Environment
    /// overrides are applied last.
    pub fn load() -> Result<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("STATICD_CONFIG").ok());

        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Applies `STATICD_PORT`, `STATICD_MODE`, `STATICD_WORKERS` and
    /// `STATICD_ROOT` on top of the loaded values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("STATICD_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("STATICD_PORT is not a port: {port}"))?;
        }
        if let Ok(mode) = std::env::var("STATICD_MODE") {
            self.server.mode = Mode::parse(&mode)
                .with_context(|| format!("STATICD_MODE must be process or thread, got {mode}"))?;
        }
        if let Ok(workers) = std::env::var("STATICD_WORKERS") {
            self.server.workers = workers
                .parse()
                .with_context(|| format!("STATICD_WORKERS is not a number: {workers}"))?;
        }
        if let Ok(root) = std::env::var("STATICD_ROOT") {
            self.static_files.root_dir = PathBuf::from(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            bail!("server.workers must be at least 1");
        }
        if self.server.max_request_bytes == 0 {
            bail!("server.max_request_bytes must be at least 1");
        }
        if self.static_files.index_page.is_empty() {
            bail!("static_files.index_page must not be empty");
        }
        if self.static_files.not_found_page.is_empty() {
            bail!("static_files.not_found_page must not be empty");
        }
        Ok(())
    }
}
