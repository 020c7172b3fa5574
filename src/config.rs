//! Configuration for crewscope.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CREWSCOPE_MANIFEST, CREWSCOPE_CACHE_CAPACITY)
//! 2. Config file (.crewscope/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .crewscope/config.yaml
//! - Falls back to ~/.crewscope/config.yaml
//! - Paths in the config file are relative to the project root (the parent
//!   of .crewscope/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{DEFAULT_CACHE_CAPACITY, SYSTEM_AGENT};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".crewscope";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub router: Option<RouterConfig>,
    #[serde(default)]
    pub agents: Option<AgentsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    /// Pseudo-agent names that never get a panel entry
    pub reserved_names: Option<Vec<String>>,
    /// Crew manifest path (relative to the project root)
    pub manifest: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Memoized detections per router
    pub cache_capacity: usize,
    /// Pseudo-agent names excluded from the panel
    pub reserved_names: Vec<String>,
    /// Default crew manifest
    pub manifest: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            reserved_names: vec![SYSTEM_AGENT.to_string()],
            manifest: None,
        }
    }
}

/// Find config file by searching `start` and its parents, then the home directory
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
        .filter(|path| path.exists())
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
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources, discovering the file from `start`
fn load_config_from(start: &Path) -> Result<ResolvedConfig> {
    let mut resolved = ResolvedConfig::default();

    if let Some(config_path) = find_config_file(start) {
        let config = load_config_file(&config_path)?;

        // Project root is the parent of .crewscope/
        let base_dir = config_path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));

        if let Some(capacity) = config.router.as_ref().and_then(|r| r.cache_capacity) {
            resolved.cache_capacity = capacity;
        }
        if let Some(agents) = config.agents {
            if let Some(names) = agents.reserved_names {
                resolved.reserved_names = names;
            }
            resolved.manifest = agents.manifest.map(|m| resolve_path(base_dir, &m));
        }
        resolved.config_file = Some(config_path);
    }

    if let Ok(manifest) = std::env::var("CREWSCOPE_MANIFEST") {
        resolved.manifest = Some(PathBuf::from(manifest));
    }
    if let Ok(capacity) = std::env::var("CREWSCOPE_CACHE_CAPACITY") {
        resolved.cache_capacity = capacity
            .trim()
            .parse()
            .with_context(|| format!("Invalid CREWSCOPE_CACHE_CAPACITY: {}", capacity))?;
    }

    Ok(resolved)
}

fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd)
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
