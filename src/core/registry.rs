//! Domain registry: domain id -> storage root, plus hidden content.
//!
//! Roots are resolved lazily on first use and cached for the life of the
//! registry. Resolution is deterministic, so two callers racing to fill the
//! same entry compute the same path and the first insert wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::domain::EknId;

use super::error::EngineError;

#[derive(Debug, Default)]
pub struct DomainRegistry {
    /// Directories searched for `<dir>/<domain>` when a domain has no explicit path
    data_dirs: Vec<PathBuf>,

    /// Paths configured up front; consulted before discovery
    explicit: HashMap<String, PathBuf>,

    /// Ids hidden process-wide, per domain
    hidden: HashMap<String, Vec<EknId>>,

    cache: RwLock<HashMap<String, PathBuf>>,
}

fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain != "."
        && domain != ".."
        && !domain.contains(|c: char| c == '/' || c == '\\' || c.is_whitespace())
}

impl DomainRegistry {
    /// Create a registry that discovers domains under `data_dirs`
    pub fn new(data_dirs: Vec<PathBuf>) -> Self {
        Self {
            data_dirs,
            ..Default::default()
        }
    }

    /// Pin a domain to a storage root
    pub fn with_domain(mut self, domain: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.explicit.insert(domain.into(), root.into());
        self
    }

    /// Hide ids from every query against `domain`
    pub fn with_hidden(
        mut self,
        domain: impl Into<String>,
        ids: impl IntoIterator<Item = EknId>,
    ) -> Self {
        self.hidden.entry(domain.into()).or_default().extend(ids);
        self
    }

    /// Register a domain at runtime; an existing cached entry wins
    pub fn register(&self, domain: &str, root: &Path) -> PathBuf {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(domain.to_string())
            .or_insert_with(|| root.to_path_buf())
            .clone()
    }

    /// Storage root for `domain`, computed and cached on first use
    pub fn resolve(&self, domain: &str) -> Result<PathBuf, EngineError> {
        if let Some(root) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(domain)
        {
            return Ok(root.clone());
        }

        let root = self.locate(domain).ok_or_else(|| EngineError::UnknownDomain {
            domain: domain.to_string(),
        })?;
        debug!(domain, root = %root.display(), "Resolved domain storage root");

        Ok(self.register(domain, &root))
    }

    /// Ids hidden for `domain`
    pub fn hidden(&self, domain: &str) -> &[EknId] {
        self.hidden.get(domain).map(Vec::as_slice).unwrap_or_default()
    }

    /// Domains resolved so far
    pub fn cached_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        domains.sort();
        domains
    }

    fn locate(&self, domain: &str) -> Option<PathBuf> {
        if !is_valid_domain(domain) {
            return None;
        }

        if let Some(root) = self.explicit.get(domain) {
            return Some(root.clone());
        }

        self.data_dirs
            .iter()
            .map(|dir| dir.join(domain))
            .find(|candidate| candidate.is_dir())
    }
}
