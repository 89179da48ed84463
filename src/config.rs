//! Configuration for the resolution engine.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (EKN_BACKEND_URL, EKN_DEFAULT_DOMAIN, EKN_DATA_DIRS)
//! 2. Config file (.ekn/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .ekn/config.yaml
//! - Relative paths in the config file are resolved against the directory
//!   that contains `.ekn/`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

use crate::core::redirect::DEFAULT_MAX_HOPS;
use crate::core::{DomainRegistry, EngineSettings};
use crate::domain::EknId;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3004/query";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
    #[serde(default)]
    pub redirects: Option<RedirectsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Language code sent with every query
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainsConfig {
    /// Domain used when a query names none
    pub default: Option<String>,
    /// Directories searched for `<dir>/<domain>`
    #[serde(default)]
    pub data_dirs: Vec<String>,
    /// Explicit domain -> storage root mapping
    #[serde(default)]
    pub paths: HashMap<String, String>,
    /// Ids hidden from every query, per domain
    #[serde(default)]
    pub hidden: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectsConfig {
    pub max_hops: Option<u32>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub backend_url: String,
    pub timeout_seconds: u64,
    pub language: Option<String>,
    pub default_domain: Option<String>,
    pub data_dirs: Vec<PathBuf>,
    pub domain_paths: HashMap<String, PathBuf>,
    pub hidden: HashMap<String, Vec<String>>,
    pub max_redirect_hops: u32,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            language: None,
            default_domain: None,
            data_dirs: default_data_dirs(),
            domain_paths: HashMap::new(),
            hidden: HashMap::new(),
            max_redirect_hops: DEFAULT_MAX_HOPS,
            config_file: None,
        }
    }
}

impl ResolvedConfig {
    /// Request-shaping settings for an engine
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let base_url = Url::parse(&self.backend_url)
            .with_context(|| format!("Invalid backend URL: {}", self.backend_url))?;

        Ok(EngineSettings {
            base_url,
            default_domain: self.default_domain.clone(),
            language: self.language.clone(),
            max_redirect_hops: self.max_redirect_hops,
        })
    }

    /// Domain registry seeded with the configured paths and hidden ids
    pub fn registry(&self) -> Result<DomainRegistry> {
        let mut registry = DomainRegistry::new(self.data_dirs.clone());

        for (domain, root) in &self.domain_paths {
            registry = registry.with_domain(domain.clone(), root.clone());
        }

        for (domain, ids) in &self.hidden {
            let ids = ids
                .iter()
                .map(|raw| {
                    EknId::parse(raw)
                        .with_context(|| format!("Invalid hidden id for domain '{}'", domain))
                })
                .collect::<Result<Vec<_>>>()?;
            registry = registry.with_hidden(domain.clone(), ids);
        }

        Ok(registry)
    }

    /// Build from an optional parsed config file located at `config_path`
    fn from_file(config: ConfigFile, config_path: &Path) -> Self {
        // Base directory is the parent of .ekn/ (i.e., grandparent of config.yaml)
        let base_dir = config_path
            .parent() // .ekn/
            .and_then(|p| p.parent()) // project root
            .unwrap_or(Path::new("."));

        let defaults = Self::default();

        let data_dirs = if config.domains.data_dirs.is_empty() {
            defaults.data_dirs
        } else {
            config
                .domains
                .data_dirs
                .iter()
                .map(|dir| resolve_path(base_dir, dir))
                .collect()
        };

        let domain_paths = config
            .domains
            .paths
            .iter()
            .map(|(domain, root)| (domain.clone(), resolve_path(base_dir, root)))
            .collect();

        Self {
            backend_url: config
                .backend
                .base_url
                .unwrap_or(defaults.backend_url),
            timeout_seconds: config
                .backend
                .timeout_seconds
                .unwrap_or(defaults.timeout_seconds),
            language: config.backend.language,
            default_domain: config.domains.default,
            data_dirs,
            domain_paths,
            hidden: config.domains.hidden,
            max_redirect_hops: config
                .redirects
                .and_then(|r| r.max_hops)
                .unwrap_or(defaults.max_redirect_hops),
            config_file: Some(config_path.to_path_buf()),
        }
    }

    /// Apply environment overrides, looked up through `var`
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("EKN_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(domain) = var("EKN_DEFAULT_DOMAIN") {
            self.default_domain = Some(domain);
        }
        if let Some(dirs) = var("EKN_DATA_DIRS") {
            self.data_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
    }
}

/// `<XDG data dir>/ekn/data`, then the system-wide location
fn default_data_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("ekn").join("data"));
    }
    dirs.push(PathBuf::from("/usr/share/ekn/data"));
    dirs
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".ekn").join("config.yaml");
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

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
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

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let mut config = match find_config_file() {
        Some(path) => ResolvedConfig::from_file(load_config_file(&path)?, &path),
        None => ResolvedConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
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
