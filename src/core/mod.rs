//! Core resolution logic.
//!
//! This module contains:
//! - Registry: Domain storage roots and hidden content
//! - Compiler: Query descriptors to backend requests
//! - Marshal: Backend payloads to typed models
//! - Redirect: Batched, bounded redirect resolution
//! - Engine: The public facade

pub mod compiler;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod redirect;
pub mod registry;

// Re-export commonly used types
pub use compiler::{CompiledRequest, QueryCompiler};
pub use engine::{Engine, EngineSettings, QueryContinuation, ResultBatch};
pub use error::EngineError;
pub use marshal::{marshal_many, marshal_one, resolve_media_uri, MarshalledPage};
pub use redirect::{resolve_redirects, DEFAULT_MAX_HOPS};
pub use registry::DomainRegistry;
