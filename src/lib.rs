//! ekn-engine - Content resolution engine for ekn knowledge domains
//!
//! Turns structured queries and `ekn://` identifiers into typed content
//! models by querying a search backend, marshalling its JSON-LD records,
//! and following redirect chains to their terminal objects.
//!
//! # Architecture
//!
//! A call flows through a fixed set of stages:
//! - A `QueryDescriptor` is compiled into a backend request
//! - A `Transport` sends it, honouring a cancellation token
//! - The marshaller turns the payload into `ContentModel`s
//! - Redirecting results are resolved hop by hop, in place
//!
//! # Modules
//!
//! - `adapters`: Transports to the search backend (HTTP)
//! - `core`: Compiler, marshaller, redirect resolver, engine facade
//! - `domain`: Data structures (QueryDescriptor, ContentModel, EknId)
//! - `config`: Configuration loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Resolve a single object
//! ekn get ekn://foo/0123abcd
//!
//! # Search a domain, two pages of five
//! ekn search tyrion --domain foo --limit 5 --pages 2
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{HttpTransport, Transport, TransportError};
pub use core::{
    CompiledRequest, DomainRegistry, Engine, EngineError, EngineSettings, QueryCompiler,
    QueryContinuation, ResultBatch,
};
pub use domain::{ContentModel, EknId, ModelKind, QueryDescriptor, SortField, SortOrder};
pub use tokio_util::sync::CancellationToken;
