//! Query compiler: descriptor -> backend request.
//!
//! The backend speaks a Xapian-style query parser syntax. Clauses are
//! combined with `AND`; each clause is built by a small pure function so the
//! shape of the `q` parameter can be tested without a registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;

use crate::domain::{EknId, MatchMode, QueryDescriptor, SortField};

use super::error::EngineError;
use super::registry::DomainRegistry;

/// Database directory inside a domain's storage root
pub const DB_SUFFIX: &str = "db";

/// A backend request ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRequest {
    base_url: Url,
    domain: String,
    root: PathBuf,
    params: Vec<(&'static str, String)>,
}

impl CompiledRequest {
    /// Full request URI with the query string attached
    pub fn uri(&self) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .extend_pairs(self.params.iter().map(|(k, v)| (*k, v.as_str())));
        url
    }

    /// Value of a single query-string parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    /// Domain the request was compiled against
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Storage root of that domain
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Builds backend requests for one search endpoint
#[derive(Debug)]
pub struct QueryCompiler {
    base_url: Url,
    registry: Arc<DomainRegistry>,
    default_domain: Option<String>,
    language: Option<String>,
}

impl QueryCompiler {
    pub fn new(base_url: Url, registry: Arc<DomainRegistry>) -> Self {
        Self {
            base_url,
            registry,
            default_domain: None,
            language: None,
        }
    }

    /// Domain used when a descriptor names none
    pub fn with_default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = Some(domain.into());
        self
    }

    /// Language code sent as `lang`
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    pub fn default_domain(&self) -> Option<&str> {
        self.default_domain.as_deref()
    }

    /// Parse loosely-typed descriptor data and compile it
    pub fn compile_json(&self, value: &Value) -> Result<CompiledRequest, EngineError> {
        self.compile(&QueryDescriptor::from_json(value)?)
    }

    pub fn compile(&self, descriptor: &QueryDescriptor) -> Result<CompiledRequest, EngineError> {
        let domain = descriptor
            .domain()
            .or(self.default_domain.as_deref())
            .ok_or_else(|| EngineError::InvalidQuery {
                field: "domain".to_string(),
                reason: "no domain given and no default domain configured".to_string(),
            })?
            .to_string();

        let root = self.registry.resolve(&domain)?;

        let mut params: Vec<(&'static str, String)> =
            vec![("path", root.join(DB_SUFFIX).display().to_string())];

        if let Some(q) = query_clause(descriptor, self.registry.hidden(&domain)) {
            params.push(("q", q));
        }

        params.push(("offset", descriptor.offset().to_string()));
        params.push(("limit", descriptor.limit().to_string()));
        params.push(("cutoff", descriptor.cutoff().to_string()));
        params.push(("order", descriptor.order().as_param().to_string()));

        if let SortField::Custom(field) = descriptor.sort_by() {
            params.push(("sortBy", field.clone()));
        }
        if let Some(language) = &self.language {
            params.push(("lang", language.clone()));
        }
        params.push(("match", descriptor.match_mode().as_param().to_string()));

        Ok(CompiledRequest {
            base_url: self.base_url.clone(),
            domain,
            root,
            params,
        })
    }
}

/// Combined `q` parameter, or `None` when the descriptor selects everything
pub fn query_clause(descriptor: &QueryDescriptor, hidden: &[EknId]) -> Option<String> {
    let positive: Vec<String> = [
        descriptor
            .query()
            .and_then(|text| free_text_clause(text, descriptor.match_mode())),
        descriptor.prefix().and_then(prefix_clause),
        tags_clause(descriptor.tags()),
        ids_clause(descriptor.ids()),
    ]
    .into_iter()
    .flatten()
    .collect();

    if positive.is_empty() {
        return None;
    }

    let mut clause = positive.join(" AND ");
    if let Some(excluded) = ids_clause(hidden) {
        clause = format!("{clause} AND NOT {excluded}");
    }
    Some(clause)
}

/// Exact title OR exact phrase OR any of the individual terms
pub fn free_text_clause(text: &str, mode: MatchMode) -> Option<String> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return None;
    }

    let exact_title = format!("exact_title:{}", title_case(&tokens));
    let phrase = format!("\"{}\"", tokens.join(" "));
    let terms: Vec<String> = tokens
        .iter()
        .flat_map(|token| {
            let bare = match mode {
                MatchMode::TitleSynopsis => Some(token.clone()),
                MatchMode::OnlyTitle => None,
            };
            std::iter::once(format!("title:{token}")).chain(bare)
        })
        .collect();

    Some(format!(
        "({exact_title} OR {phrase} OR {})",
        group(&terms, "OR")
    ))
}

/// Typeahead match on the title, last word treated as a prefix
pub fn prefix_clause(text: &str) -> Option<String> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return None;
    }

    let exact_title = format!("exact_title:{}*", title_case(&tokens));
    let last = tokens.len() - 1;
    let words: Vec<String> = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            if i == last {
                format!("title:{token}*")
            } else {
                format!("title:{token}")
            }
        })
        .collect();

    Some(format!("({exact_title} OR {})", group(&words, "AND")))
}

/// Every tag must match
pub fn tags_clause(tags: &[String]) -> Option<String> {
    let clauses: Vec<String> = tags
        .iter()
        .map(|tag| tag.replace('"', ""))
        .filter(|tag| !tag.trim().is_empty())
        .map(|tag| format!("tag:\"{tag}\""))
        .collect();

    if clauses.is_empty() {
        None
    } else {
        Some(group(&clauses, "AND"))
    }
}

/// Any of the ids may match
pub fn ids_clause(ids: &[EknId]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let clauses: Vec<String> = ids.iter().map(|id| format!("id:{}", id.hash())).collect();
    Some(group(&clauses, "OR"))
}

/// Lower-cased terms with parser metacharacters removed.
/// Lower-casing also keeps `AND`, `OR`, `NOT` and friends from reading as operators.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !matches!(c, '(' | ')' | '"' | '*'))
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// `tyrion lannister` -> `Tyrion_Lannister`
fn title_case(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("_")
}

fn group(clauses: &[String], op: &str) -> String {
    if clauses.len() == 1 {
        clauses[0].clone()
    } else {
        format!("({})", clauses.join(&format!(" {op} ")))
    }
}
