//! Command-line interface for ekn.
//!
//! Provides commands for resolving objects by id, searching a domain,
//! inspecting compiled requests, and showing the resolved configuration.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config;
use crate::core::{Engine, ResultBatch};
use crate::domain::{ContentModel, EknId, MatchMode, ModelKind, QueryDescriptor, SortField, SortOrder};

/// ekn - Content resolution engine for ekn knowledge domains
#[derive(Parser, Debug)]
#[command(name = "ekn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve an object by id, following redirects
    Get {
        /// Object id (ekn://<domain>/<hash>)
        id: String,

        /// Print the full model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search a domain
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Number of pages to fetch
        #[arg(long, default_value = "1")]
        pages: u32,

        /// Leave redirecting results unresolved
        #[arg(long)]
        no_redirects: bool,

        /// Print the full models as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the backend request a search would send
    Compile {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Query flags shared by `search` and `compile`
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Free-text search terms
    pub terms: Vec<String>,

    /// Typeahead prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Required tag (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Restrict to these ids (repeatable)
    #[arg(long = "id")]
    pub ids: Vec<String>,

    /// Domain to search (defaults to the configured default)
    #[arg(short, long)]
    pub domain: Option<String>,

    #[arg(short, long, default_value = "10")]
    pub limit: u32,

    #[arg(short, long, default_value = "0")]
    pub offset: u32,

    /// Relevance cutoff percentage
    #[arg(long, default_value = "20")]
    pub cutoff: u8,

    /// Sort by a custom value slot instead of relevance
    #[arg(long)]
    pub sort_by: Option<String>,

    #[arg(long, value_enum, default_value = "asc")]
    pub order: OrderArg,

    /// Match free-text terms against titles only
    #[arg(long)]
    pub only_title: bool,
}

/// Sort order for CLI (maps to SortOrder)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        }
    }
}

impl QueryArgs {
    /// Build the descriptor these flags describe
    pub fn to_descriptor(&self) -> Result<QueryDescriptor> {
        let mut builder = QueryDescriptor::builder()
            .tags(self.tags.iter().cloned())
            .offset(self.offset)
            .limit(self.limit)
            .cutoff(self.cutoff)
            .order(self.order.into());

        if !self.terms.is_empty() {
            builder = builder.query(self.terms.join(" "));
        }
        if let Some(prefix) = &self.prefix {
            builder = builder.prefix(prefix.clone());
        }
        for raw in &self.ids {
            builder = builder.id(EknId::parse(raw).with_context(|| format!("Invalid id: {}", raw))?);
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(field) = &self.sort_by {
            builder = builder.sort_by(SortField::Custom(field.clone()));
        }
        if self.only_title {
            builder = builder.match_mode(MatchMode::OnlyTitle);
        }

        Ok(builder.build())
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Get { id, json } => get_object(&id, json).await,
            Commands::Search {
                query,
                pages,
                no_redirects,
                json,
            } => search(&query, pages, !no_redirects, json).await,
            Commands::Compile { query } => compile(&query),
            Commands::Config => show_config(),
        }
    }
}

/// Token that fires on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

fn engine() -> Result<Engine> {
    Engine::from_config(config::config()?)
}

fn kind_label(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Content => "content",
        ModelKind::Article => "article",
        ModelKind::Image => "image",
        ModelKind::Video => "video",
    }
}

fn print_model(model: &ContentModel, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(model)?);
        return Ok(());
    }

    let content = model.content();
    println!("{:<40} {:<8} {}", content.id.to_string(), kind_label(model.kind()), content.title);
    if !content.synopsis.is_empty() {
        println!("    {}", content.synopsis);
    }
    if let Some(url) = &content.content_url {
        println!("    {}", url);
    }
    Ok(())
}

/// Resolve a single object
async fn get_object(raw_id: &str, json: bool) -> Result<()> {
    let id = EknId::parse(raw_id).with_context(|| format!("Invalid id: {}", raw_id))?;
    let engine = engine()?;
    let cancel = cancel_on_ctrl_c();

    let model = engine
        .get_object_by_id(&id, &cancel)
        .await
        .with_context(|| format!("Failed to resolve {}", id))?;

    print_model(&model, json)
}

/// Run a search, following continuations for extra pages
async fn search(args: &QueryArgs, pages: u32, follow_redirects: bool, json: bool) -> Result<()> {
    let descriptor = args.to_descriptor()?;
    let engine = engine()?;
    let cancel = cancel_on_ctrl_c();

    let mut batch: ResultBatch = engine
        .query_objects(&descriptor, &cancel, follow_redirects)
        .await
        .context("Search failed")?;
    let mut shown = 0usize;

    for page in 1..=pages.max(1) {
        for model in &batch.results {
            print_model(model, json)?;
        }
        shown += batch.results.len();

        if page == pages.max(1) || batch.continuation.is_exhausted() {
            break;
        }
        batch = batch
            .continuation
            .fetch(args.limit, &cancel)
            .await
            .context("Fetching next page failed")?;
    }

    let total = batch
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    eprintln!(
        "\n[{} results shown, {} total, next offset {}]",
        shown,
        total,
        batch.continuation.next_offset()
    );

    Ok(())
}

/// Print the request URI without sending it
fn compile(args: &QueryArgs) -> Result<()> {
    let descriptor = args.to_descriptor()?;
    let config = config::config()?;
    let engine = Engine::from_config(config)?;

    let request = engine.compiler().compile(&descriptor)?;
    println!("{}", request.uri());
    for (key, value) in request.params() {
        eprintln!("  {:<8} {}", key, value);
    }

    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("ekn configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Backend:");
    println!("  URL:      {}", cfg.backend_url);
    println!("  Timeout:  {}s", cfg.timeout_seconds);
    println!("  Language: {}", cfg.language.as_deref().unwrap_or("(none)"));
    println!();
    println!("Domains:");
    println!("  Default:  {}", cfg.default_domain.as_deref().unwrap_or("(none)"));
    println!("  Data directories:");
    for dir in &cfg.data_dirs {
        println!("    {}", dir.display());
    }
    if !cfg.domain_paths.is_empty() {
        println!("  Explicit paths:");
        for (domain, root) in &cfg.domain_paths {
            println!("    {}: {}", domain, root.display());
        }
    }
    if !cfg.hidden.is_empty() {
        println!("  Hidden content:");
        for (domain, ids) in &cfg.hidden {
            println!("    {}: {} id(s)", domain, ids.len());
        }
    }
    println!();
    println!("Redirects:");
    println!("  Max hops: {}", cfg.max_redirect_hops);

    Ok(())
}
