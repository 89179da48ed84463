//! Immutable query descriptors.
//!
//! A descriptor can be built two ways:
//! - `QueryDescriptor::builder()` for typed Rust callers
//! - `QueryDescriptor::from_json` for loosely-typed input (CLI, IPC, tests),
//!   which rejects unknown keys and explicit `null` values but quietly
//!   defaults numeric fields that fail to parse

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::error::EngineError;

use super::model::EknId;

pub const DEFAULT_OFFSET: u32 = 0;
pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_CUTOFF: u8 = 20;
const MAX_CUTOFF: u8 = 100;

/// Field to order results by
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Backend relevance score
    #[default]
    Relevance,

    /// A value slot named by the content domain (e.g. `sequence-number`)
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Value of the `order` request parameter
    pub fn as_param(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Which fields free-text terms are matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    TitleSynopsis,
    OnlyTitle,
}

impl MatchMode {
    pub fn as_param(self) -> &'static str {
        match self {
            MatchMode::TitleSynopsis => "title_synopsis",
            MatchMode::OnlyTitle => "only_title",
        }
    }
}

/// Search parameters for one logical query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryDescriptor {
    query: Option<String>,
    prefix: Option<String>,
    tags: Vec<String>,
    ids: Vec<EknId>,
    offset: u32,
    limit: u32,
    cutoff: u8,
    sort_by: SortField,
    order: SortOrder,
    domain: Option<String>,
    match_mode: MatchMode,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            query: None,
            prefix: None,
            tags: Vec::new(),
            ids: Vec::new(),
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_LIMIT,
            cutoff: DEFAULT_CUTOFF,
            sort_by: SortField::default(),
            order: SortOrder::default(),
            domain: None,
            match_mode: MatchMode::default(),
        }
    }
}

/// Keys accepted by `QueryDescriptor::from_json`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Query,
    Prefix,
    Tags,
    Ids,
    Offset,
    Limit,
    Cutoff,
    SortBy,
    Order,
    Domain,
    Match,
}

impl Field {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "query" => Field::Query,
            "prefix" => Field::Prefix,
            "tags" => Field::Tags,
            "ids" => Field::Ids,
            "offset" => Field::Offset,
            "limit" => Field::Limit,
            "cutoff" => Field::Cutoff,
            "sort_by" => Field::SortBy,
            "order" => Field::Order,
            "domain" => Field::Domain,
            "match" => Field::Match,
            _ => return None,
        })
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidQuery {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, EngineError> {
    value
        .as_str()
        .ok_or_else(|| invalid(key, format!("expected a string, got {value}")))
}

fn expect_str_list(key: &str, value: &Value) -> Result<Vec<String>, EngineError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(key, format!("expected a list of strings, got {value}")))?;

    items
        .iter()
        .map(|item| expect_str(key, item).map(str::to_string))
        .collect()
}

/// Numbers, numeric strings, and non-negative floats are accepted.
/// Anything else yields `None` and the caller substitutes a default.
fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u32)
            }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl QueryDescriptor {
    pub fn builder() -> QueryDescriptorBuilder {
        QueryDescriptorBuilder::default()
    }

    /// Identifier-list query covering exactly the given ids
    pub fn for_ids(ids: Vec<EknId>, domain: Option<&str>) -> Self {
        let limit = u32::try_from(ids.len()).unwrap_or(u32::MAX);
        let mut builder = Self::builder().ids(ids).limit(limit);
        if let Some(domain) = domain {
            builder = builder.domain(domain);
        }
        builder.build()
    }

    /// Parse a loosely-typed descriptor.
    ///
    /// Fails with `InvalidQuery` on an unrecognized key or a key explicitly
    /// set to `null`. Malformed `offset`, `limit`, and `cutoff` values fall
    /// back to their defaults instead.
    pub fn from_json(value: &Value) -> Result<Self, EngineError> {
        let map: &Map<String, Value> = value
            .as_object()
            .ok_or_else(|| invalid("<root>", "descriptor must be a JSON object"))?;

        let mut builder = Self::builder();

        for (key, value) in map {
            let field =
                Field::from_key(key).ok_or_else(|| invalid(key, "unrecognized field"))?;

            if value.is_null() {
                return Err(invalid(key, "field is explicitly unset"));
            }

            builder = match field {
                Field::Query => builder.query(expect_str(key, value)?),
                Field::Prefix => builder.prefix(expect_str(key, value)?),
                Field::Tags => builder.tags(expect_str_list(key, value)?),
                Field::Ids => {
                    let ids = expect_str_list(key, value)?
                        .iter()
                        .map(|raw| {
                            EknId::parse(raw)
                                .map_err(|_| invalid(key, format!("malformed id '{raw}'")))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    builder.ids(ids)
                }
                Field::Offset => builder.offset(lenient_u32(value).unwrap_or(DEFAULT_OFFSET)),
                Field::Limit => builder.limit(lenient_u32(value).unwrap_or(DEFAULT_LIMIT)),
                Field::Cutoff => {
                    let cutoff = lenient_u32(value)
                        .map(|c| c.min(u32::from(MAX_CUTOFF)) as u8)
                        .unwrap_or(DEFAULT_CUTOFF);
                    builder.cutoff(cutoff)
                }
                Field::SortBy => match expect_str(key, value)? {
                    "relevance" => builder.sort_by(SortField::Relevance),
                    "" => return Err(invalid(key, "sort field cannot be empty")),
                    custom => builder.sort_by(SortField::Custom(custom.to_string())),
                },
                Field::Order => match expect_str(key, value)? {
                    "asc" | "ascending" => builder.order(SortOrder::Ascending),
                    "desc" | "descending" => builder.order(SortOrder::Descending),
                    other => return Err(invalid(key, format!("unknown sort order '{other}'"))),
                },
                Field::Domain => builder.domain(expect_str(key, value)?),
                Field::Match => match expect_str(key, value)? {
                    "title_synopsis" => builder.match_mode(MatchMode::TitleSynopsis),
                    "only_title" => builder.match_mode(MatchMode::OnlyTitle),
                    other => return Err(invalid(key, format!("unknown match mode '{other}'"))),
                },
            };
        }

        Ok(builder.build())
    }

    /// Same query shape, different window
    pub fn with_page(&self, offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit,
            ..self.clone()
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn ids(&self) -> &[EknId] {
        &self.ids
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn cutoff(&self) -> u8 {
        self.cutoff
    }

    pub fn sort_by(&self) -> &SortField {
        &self.sort_by
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Target domain, `None` for the engine default
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }
}

/// Builder for `QueryDescriptor`
#[derive(Debug, Clone, Default)]
pub struct QueryDescriptorBuilder {
    inner: QueryDescriptor,
}

impl QueryDescriptorBuilder {
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.inner.query = Some(query.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.prefix = Some(prefix.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.inner.tags.push(tag.into());
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn id(mut self, id: EknId) -> Self {
        self.inner.ids.push(id);
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = EknId>) -> Self {
        self.inner.ids.extend(ids);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.inner.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.inner.limit = limit;
        self
    }

    /// Relevance cutoff percentage, clamped to 100
    pub fn cutoff(mut self, cutoff: u8) -> Self {
        self.inner.cutoff = cutoff.min(MAX_CUTOFF);
        self
    }

    pub fn sort_by(mut self, sort_by: SortField) -> Self {
        self.inner.sort_by = sort_by;
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.inner.order = order;
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.inner.domain = Some(domain.into());
        self
    }

    pub fn match_mode(mut self, match_mode: MatchMode) -> Self {
        self.inner.match_mode = match_mode;
        self
    }

    pub fn build(self) -> QueryDescriptor {
        self.inner
    }
}
