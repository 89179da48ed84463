//! Engine facade: resolve objects by id or by query.
//!
//! Every operation is a single future that resolves exactly once. A
//! cancelled call always resolves to `EngineError::Cancelled`, never to a
//! success, and issues no further transport calls once the token fires.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{send_cancellable, HttpTransport, Transport};
use crate::config::ResolvedConfig;
use crate::domain::{ContentModel, EknId, QueryDescriptor};

use super::compiler::QueryCompiler;
use super::error::EngineError;
use super::marshal::{marshal_many, MarshalledPage};
use super::redirect::{resolve_redirects, DEFAULT_MAX_HOPS};
use super::registry::DomainRegistry;

/// Settings that shape every request an engine issues
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Search endpoint, e.g. `http://127.0.0.1:3004/query`
    pub base_url: Url,
    pub default_domain: Option<String>,
    pub language: Option<String>,
    pub max_redirect_hops: u32,
}

impl EngineSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            default_domain: None,
            language: None,
            max_redirect_hops: DEFAULT_MAX_HOPS,
        }
    }
}

/// Content resolution engine
///
/// Cheap to clone; clones share the transport and the domain cache.
#[derive(Clone)]
pub struct Engine {
    transport: Arc<dyn Transport>,
    compiler: Arc<QueryCompiler>,
    max_redirect_hops: u32,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("transport", &self.transport.name())
            .field("compiler", &self.compiler)
            .field("max_redirect_hops", &self.max_redirect_hops)
            .finish()
    }
}

/// One page of resolved results
#[derive(Debug, Clone)]
pub struct ResultBatch {
    /// Results in backend order, redirects already substituted
    pub results: Vec<ContentModel>,

    /// Records the backend returned before redirect resolution
    pub hits: usize,

    /// Total matches reported by the backend, when it says
    pub total: Option<u64>,

    /// Fetches the page after this one
    pub continuation: QueryContinuation,
}

/// Reusable "fetch the next page" capability
#[derive(Debug, Clone)]
pub struct QueryContinuation {
    engine: Engine,
    query: QueryDescriptor,
    next_offset: u32,
    follow_redirects: bool,
    exhausted: bool,
}

impl QueryContinuation {
    /// Offset the next fetch starts at
    pub fn next_offset(&self) -> u32 {
        self.next_offset
    }

    /// The backend returned fewer hits than were asked for, or the page
    /// size is zero and fetching again could never advance
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Descriptor the next fetch will send
    pub fn next_query(&self, limit: u32) -> QueryDescriptor {
        self.query.with_page(self.next_offset, limit)
    }

    /// Fetch up to `limit` more results with the original query shape
    pub async fn fetch(
        &self,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<ResultBatch, EngineError> {
        self.engine
            .query_objects(&self.next_query(limit), cancel, self.follow_redirects)
            .await
    }
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        registry: Arc<DomainRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut compiler = QueryCompiler::new(settings.base_url, registry);
        if let Some(domain) = settings.default_domain {
            compiler = compiler.with_default_domain(domain);
        }
        if let Some(language) = settings.language {
            compiler = compiler.with_language(language);
        }

        Self {
            transport,
            compiler: Arc::new(compiler),
            max_redirect_hops: settings.max_redirect_hops,
        }
    }

    /// Build an HTTP-backed engine from resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let settings = config.engine_settings()?;
        let registry = config.registry()?;
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_seconds))
            .context("Failed to create HTTP transport")?;

        Ok(Self::new(settings, Arc::new(registry), Arc::new(transport)))
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    pub fn max_redirect_hops(&self) -> u32 {
        self.max_redirect_hops
    }

    /// Resolve one object, following its redirect chain to the end.
    #[instrument(skip(self, cancel), fields(request_id = %Uuid::new_v4(), id = %id))]
    pub async fn get_object_by_id(
        &self,
        id: &EknId,
        cancel: &CancellationToken,
    ) -> Result<ContentModel, EngineError> {
        let mut current = id.clone();
        let mut source: Option<EknId> = None;
        let mut hops = 0u32;

        loop {
            let descriptor = QueryDescriptor::for_ids(vec![current.clone()], current.domain());
            let page = self.fetch_page(&descriptor, cancel).await?;

            let model = match (page.results.into_iter().next(), source.as_ref()) {
                (Some(model), _) => model,
                (None, None) => return Err(EngineError::NotFound { id: current.to_string() }),
                (None, Some(source)) => {
                    return Err(EngineError::UnresolvedRedirect {
                        source_id: source.to_string(),
                        target: current.to_string(),
                    })
                }
            };

            let Some(target) = model.redirects_to().cloned() else {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                debug!(hops, "Resolved object");
                return Ok(model);
            };

            if hops >= self.max_redirect_hops {
                warn!(hops, "Redirect chain too long");
                return Err(EngineError::RedirectLoop { hops });
            }
            hops += 1;
            info!(hop = hops, from = %model.id(), to = %target, "Following redirect");

            source = Some(model.id().clone());
            current = target;
        }
    }

    /// Run a query and resolve any redirects in the results
    pub async fn get_objects_by_query(
        &self,
        query: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> Result<ResultBatch, EngineError> {
        self.query_objects(query, cancel, true).await
    }

    /// Run a query, optionally leaving redirecting results unresolved
    #[instrument(
        skip(self, query, cancel),
        fields(request_id = %Uuid::new_v4(), offset = query.offset(), limit = query.limit())
    )]
    pub async fn query_objects(
        &self,
        query: &QueryDescriptor,
        cancel: &CancellationToken,
        follow_redirects: bool,
    ) -> Result<ResultBatch, EngineError> {
        let page = self.fetch_page(query, cancel).await?;
        let hits = page.results.len();

        let results = if follow_redirects {
            let domain = query.domain().or(self.compiler.default_domain());
            resolve_redirects(page.results, self.max_redirect_hops, move |targets| {
                self.fetch_targets(targets, domain, cancel)
            })
            .await?
        } else {
            page.results
        };

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let limit = usize::try_from(query.limit()).unwrap_or(usize::MAX);
        let advanced = u32::try_from(hits).unwrap_or(u32::MAX);

        Ok(ResultBatch {
            results,
            hits,
            total: page.total,
            continuation: QueryContinuation {
                engine: self.clone(),
                query: query.clone(),
                next_offset: query.offset().saturating_add(advanced),
                follow_redirects,
                exhausted: limit == 0 || hits < limit,
            },
        })
    }

    /// Callback form of `get_object_by_id`; `on_done` runs exactly once
    pub fn spawn_get_object_by_id<F>(
        &self,
        id: EknId,
        cancel: CancellationToken,
        on_done: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<ContentModel, EngineError>) + Send + 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.get_object_by_id(&id, &cancel).await;
            on_done(result);
        })
    }

    /// Callback form of `get_objects_by_query`; `on_done` runs exactly once
    pub fn spawn_get_objects_by_query<F>(
        &self,
        query: QueryDescriptor,
        cancel: CancellationToken,
        on_done: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<ResultBatch, EngineError>) + Send + 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.get_objects_by_query(&query, &cancel).await;
            on_done(result);
        })
    }

    /// One compile-send-marshal round trip, no redirect handling
    async fn fetch_page(
        &self,
        descriptor: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> Result<MarshalledPage, EngineError> {
        let request = self.compiler.compile(descriptor)?;
        debug!(uri = %request.uri(), "Sending request");

        let payload = send_cancellable(self.transport.as_ref(), &request, cancel)
            .await
            .inspect_err(|e| warn!(error = %e, "Request failed"))?;

        let mut page = marshal_many(&payload, request.root())?;
        debug!(records = page.results.len(), total = ?page.total, "Marshalled response");

        // `ekn:///<hash>` means the default domain, else the one we just queried
        let home = self.compiler.default_domain().unwrap_or(request.domain());
        for model in &mut page.results {
            model.qualify(home);
        }
        Ok(page)
    }

    /// Refetch one hop's redirect targets, one batched request per target
    /// domain; the resolver handles further hops.
    async fn fetch_targets(
        &self,
        targets: Vec<EknId>,
        fallback_domain: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentModel>, EngineError> {
        let mut by_domain: Vec<(Option<String>, Vec<EknId>)> = Vec::new();
        for target in targets {
            let domain = target.domain().or(fallback_domain).map(str::to_string);
            match by_domain.iter_mut().find(|(d, _)| *d == domain) {
                Some((_, ids)) => ids.push(target),
                None => by_domain.push((domain, vec![target])),
            }
        }

        let mut fetched = Vec::new();
        for (domain, ids) in by_domain {
            debug!(domain = ?domain, targets = ids.len(), "Fetching redirect targets");
            let descriptor = QueryDescriptor::for_ids(ids, domain.as_deref());
            fetched.extend(self.fetch_page(&descriptor, cancel).await?.results);
        }
        Ok(fetched)
    }
}
