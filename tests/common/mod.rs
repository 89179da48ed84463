//! Shared fixtures: an in-memory search backend and engine builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ekn_engine::{
    CompiledRequest, DomainRegistry, Engine, EngineSettings, Transport, TransportError,
};
use reqwest::Url;
use serde_json::{json, Value};

pub const ROOT: &str = "/srv/ekn/foo";
pub const BAR_ROOT: &str = "/srv/ekn/bar";

/// Build a content record in domain `foo` as the search bridge would return it
pub fn record(hash: &str, title: &str, redirect: Option<&str>) -> Value {
    record_in("foo", hash, title, redirect)
}

/// Build a record in `domain`. A bare `redirect` hash points into the same
/// domain; anything containing `://` is used verbatim.
pub fn record_in(domain: &str, hash: &str, title: &str, redirect: Option<&str>) -> Value {
    let redirect = redirect.map(|r| {
        if r.contains("://") {
            r.to_string()
        } else {
            format!("ekn://{domain}/{r}")
        }
    });
    json!({
        "@id": format!("ekn://{domain}/{hash}"),
        "@type": "ekn://_vocab/ArticleObject",
        "title": title,
        "synopsis": format!("About {title}"),
        "redirectsTo": redirect.unwrap_or_default(),
    })
}

fn key(domain: &str, hash: &str) -> String {
    format!("ekn://{domain}/{hash}")
}

/// How the mock answers the next request
#[derive(Debug, Clone)]
enum Behaviour {
    Serve,
    Fail(TransportError),
    Raw(String),
    Hang,
}

/// In-memory backend.
///
/// Id queries (`id:<hash>` clauses) are answered from `objects` of the
/// domain the request targets; any other query pages through
/// `search_order`. Every request is recorded.
pub struct MockBackend {
    /// Records keyed by `ekn://<domain>/<hash>`
    objects: HashMap<String, Value>,
    search_order: Vec<String>,
    behaviour: Behaviour,
    /// Call index (0-based) from which requests hang forever
    hang_from: Option<usize>,
    requests: Mutex<Vec<CompiledRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            search_order: Vec::new(),
            behaviour: Behaviour::Serve,
            hang_from: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Store an object in domain `foo`
    pub fn with_object(self, hash: &str, title: &str, redirect: Option<&str>) -> Self {
        self.with_object_in("foo", hash, title, redirect)
    }

    /// Store an object in `domain`
    pub fn with_object_in(
        mut self,
        domain: &str,
        hash: &str,
        title: &str,
        redirect: Option<&str>,
    ) -> Self {
        self.objects
            .insert(key(domain, hash), record_in(domain, hash, title, redirect));
        self
    }

    /// Store a raw record under `hash` in domain `foo`
    pub fn with_record(mut self, hash: &str, record: Value) -> Self {
        self.objects.insert(key("foo", hash), record);
        self
    }

    /// Hashes in domain `foo` returned, in order, by non-id queries
    pub fn with_search_order(mut self, hashes: &[&str]) -> Self {
        self.search_order = hashes.iter().map(|h| key("foo", h)).collect();
        self
    }

    pub fn failing(mut self, error: TransportError) -> Self {
        self.behaviour = Behaviour::Fail(error);
        self
    }

    pub fn returning_raw(mut self, payload: &str) -> Self {
        self.behaviour = Behaviour::Raw(payload.to_string());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.behaviour = Behaviour::Hang;
        self
    }

    pub fn hanging_from_call(mut self, call: usize) -> Self {
        self.hang_from = Some(call);
        self
    }

    pub fn requests(&self) -> Vec<CompiledRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `path` parameter of every request, in order
    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.param("path").map(str::to_string))
            .collect()
    }

    /// Hashes named by each id query, in request order
    pub fn id_lookups(&self) -> Vec<Vec<String>> {
        self.requests()
            .iter()
            .filter_map(|r| r.param("q").map(requested_ids))
            .filter(|ids| !ids.is_empty())
            .collect()
    }

    fn answer(&self, request: &CompiledRequest) -> String {
        let offset: usize = request
            .param("offset")
            .and_then(|o| o.parse().ok())
            .unwrap_or(0);
        let limit: usize = request
            .param("limit")
            .and_then(|l| l.parse().ok())
            .unwrap_or(10);

        let ids = request.param("q").map(requested_ids).unwrap_or_default();
        let (keys, total): (Vec<String>, usize) = if ids.is_empty() {
            (
                self.search_order.iter().skip(offset).take(limit).cloned().collect(),
                self.search_order.len(),
            )
        } else {
            let found: Vec<String> = ids
                .iter()
                .map(|hash| key(request.domain(), hash))
                .filter(|id| self.objects.contains_key(id))
                .take(limit)
                .collect();
            let total = found.len();
            (found, total)
        };

        let results: Vec<Value> = keys
            .iter()
            .filter_map(|id| self.objects.get(id).cloned())
            .collect();

        json!({
            "numResults": total,
            "offset": offset,
            "results": results,
        })
        .to_string()
    }
}

/// `id:` terms of a compiled `q` parameter, excluding `NOT` clauses
pub fn requested_ids(q: &str) -> Vec<String> {
    let positive = q.split(" AND NOT ").next().unwrap_or_default();
    positive
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter_map(|token| token.strip_prefix("id:"))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Transport for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: &CompiledRequest) -> Result<String, TransportError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };

        if matches!(self.hang_from, Some(from) if call >= from) {
            std::future::pending::<()>().await;
        }

        match &self.behaviour {
            Behaviour::Serve => Ok(self.answer(request)),
            Behaviour::Fail(error) => Err(error.clone()),
            Behaviour::Raw(payload) => Ok(payload.clone()),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

pub fn registry() -> DomainRegistry {
    DomainRegistry::new(Vec::new())
        .with_domain("foo", ROOT)
        .with_domain("bar", BAR_ROOT)
}

pub fn settings() -> EngineSettings {
    let mut settings = EngineSettings::new(Url::parse("http://127.0.0.1:3004/query").unwrap());
    settings.default_domain = Some("foo".to_string());
    settings
}

/// Engine over `backend`; `foo` (the default) at `ROOT`, `bar` at `BAR_ROOT`
pub fn engine(backend: &Arc<MockBackend>) -> Engine {
    engine_with_hops(backend, ekn_engine::core::DEFAULT_MAX_HOPS)
}

pub fn engine_with_hops(backend: &Arc<MockBackend>, max_hops: u32) -> Engine {
    let mut settings = settings();
    settings.max_redirect_hops = max_hops;
    Engine::new(settings, Arc::new(registry()), backend.clone())
}

pub fn titles(models: &[ekn_engine::ContentModel]) -> Vec<String> {
    models.iter().map(|m| m.title().to_string()).collect()
}
