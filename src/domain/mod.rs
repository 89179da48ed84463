//! Domain types for the resolution engine.
//!
//! This module contains the core data structures:
//! - Query: Immutable query descriptors
//! - Model: Identifiers and marshalled content models

pub mod model;
pub mod query;

// Re-export commonly used types
pub use model::{
    ArticleObject, ContentModel, ContentObject, EknId, ImageObject, ModelKind, TocEntry,
    VideoObject,
};
pub use query::{MatchMode, QueryDescriptor, QueryDescriptorBuilder, SortField, SortOrder};
