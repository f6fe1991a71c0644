//! Configuration for folio.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FOLIO_HOME, FOLIO_LOCALE)
//! 2. Config file (.folio/config.yaml)
//! 3. Defaults (~/.folio)
//!
//! Config file discovery:
//! - Searches current directory and parents for .folio/config.yaml
//! - Paths in config file are relative to the project root (the parent of .folio/)

pub mod paths;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::PriceMetadata;
use crate::domain::RemoteLocation;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_LOCALE: &str = "en";
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub network: Option<NetworkConfig>,
    #[serde(default)]
    pub store: StoreConfig,
    /// Localized strings (unit labels, notification texts)
    #[serde(default)]
    pub strings: HashMap<String, String>,
    #[serde(default)]
    pub chapters: Vec<ChapterConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .folio/)
    pub home: Option<String>,
    /// Directory holding bundled payloads of preloaded chapters
    pub bundled: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

/// Product catalog served by the built-in purchase oracle
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Product ids already purchased
    #[serde(default)]
    pub owned: Vec<String>,
    /// Known products; `~` marks a product without localized data
    #[serde(default)]
    pub prices: HashMap<String, Option<PriceMetadata>>,
}

/// Static configuration of one chapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterConfig {
    /// Product id; also the prefix of every persisted key
    pub id: String,

    /// Payload ships with the application
    #[serde(default)]
    pub preloaded: bool,

    /// Optional time-gated release
    #[serde(default)]
    pub release_at: Option<DateTime<Utc>>,

    /// "Now available" notification for time-gated chapters
    #[serde(default)]
    pub notification: Option<NotificationTemplate>,

    /// Remote locations per locale code
    #[serde(default)]
    pub locales: HashMap<String, RemoteLocation>,
}

impl ChapterConfig {
    /// Remote locations for `locale`, if configured
    pub fn location(&self, locale: &str) -> Option<&RemoteLocation> {
        self.locales.get(locale)
    }
}

/// Localization keys for a scheduled notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub title: String,
    pub body: String,
    #[serde(default = "default_small_icon")]
    pub small_icon: String,
}

fn default_small_icon() -> String {
    "ic_stat_push_icon".to_string()
}

/// Timeouts and polling for network and readiness waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Upper bound on each manifest or payload call
    pub timeout: Duration,
    /// Re-check interval while waiting for a collaborator to become ready
    pub poll_interval: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to folio home (engine state)
    pub home: PathBuf,
    /// Absolute path to bundled payloads
    pub bundled: PathBuf,
    /// Active locale
    pub locale: String,
    pub network: NetworkSettings,
    pub store: StoreConfig,
    pub strings: HashMap<String, String>,
    pub chapters: Vec<ChapterConfig>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Look a chapter up by product id
    pub fn chapter(&self, id: &str) -> Option<&ChapterConfig> {
        self.chapters.iter().find(|c| c.id == id)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".folio").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = serde_yaml::from_str(content)?;

    for chapter in &config.chapters {
        if chapter.id.trim().is_empty() {
            anyhow::bail!("Chapter entries need a non-empty product id");
        }
    }

    Ok(config)
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn network_settings(config: Option<&NetworkConfig>) -> NetworkSettings {
    let defaults = NetworkSettings::default();
    NetworkSettings {
        timeout: config
            .and_then(|n| n.timeout_seconds)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
        poll_interval: config
            .and_then(|n| n.poll_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".folio");

    let config_file = find_config_file();
    let env_locale = std::env::var("FOLIO_LOCALE").ok();

    let resolved = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // .folio/ and the project root above it
        let folio_dir = config_path.parent().unwrap_or(Path::new("."));
        let base_dir = folio_dir.parent().unwrap_or(Path::new("."));

        let home = if let Ok(env_home) = std::env::var("FOLIO_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            resolve_path(folio_dir, home_path)
        } else {
            default_home.clone()
        };

        let bundled = config
            .paths
            .bundled
            .as_deref()
            .map(|p| resolve_path(base_dir, p))
            .unwrap_or_else(|| home.join("bundled"));

        ResolvedConfig {
            locale: env_locale
                .or(config.locale)
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            network: network_settings(config.network.as_ref()),
            store: config.store,
            strings: config.strings,
            chapters: config.chapters,
            home,
            bundled,
            config_file: config_file.clone(),
        }
    } else {
        let home = std::env::var("FOLIO_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        ResolvedConfig {
            bundled: home.join("bundled"),
            home,
            locale: env_locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            network: NetworkSettings::default(),
            store: StoreConfig::default(),
            strings: HashMap::new(),
            chapters: Vec::new(),
            config_file: None,
        }
    };

    Ok(resolved)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the folio home directory (engine state).
pub fn folio_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}
