//! Result models produced by the marshaller.
//!
//! Every record the search backend returns carries an `@type` tag that
//! selects one of a closed set of variants. The tag table below is the only
//! place wire tags are mapped to variants.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::error::EngineError;

const ID_SCHEME: &str = "ekn://";

/// Object identifier of the form `ekn://<domain>/<hash>`.
///
/// The domain segment may be empty (`ekn:///<hash>`), in which case the
/// object lives in the engine's default domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EknId {
    domain: String,
    hash: String,
}

impl EknId {
    /// Parse an identifier string
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidId { id: raw.to_string() };

        let rest = raw.strip_prefix(ID_SCHEME).ok_or_else(invalid)?;
        let (domain, hash) = rest.split_once('/').ok_or_else(invalid)?;

        if hash.is_empty()
            || !hash
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid());
        }
        if domain.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(invalid());
        }

        Ok(Self {
            domain: domain.to_string(),
            hash: hash.to_string(),
        })
    }

    /// Domain segment, `None` when the id uses the default domain
    pub fn domain(&self) -> Option<&str> {
        if self.domain.is_empty() {
            None
        } else {
            Some(&self.domain)
        }
    }

    /// Hash segment, as indexed by the search backend
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// This id with an empty domain segment replaced by `domain`
    pub fn in_domain(&self, domain: &str) -> Self {
        Self {
            domain: self.domain().unwrap_or(domain).to_string(),
            hash: self.hash.clone(),
        }
    }
}

impl fmt::Display for EknId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", ID_SCHEME, self.domain, self.hash)
    }
}

impl FromStr for EknId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EknId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EknId> for String {
    fn from(id: EknId) -> Self {
        id.to_string()
    }
}

/// Model variant selected by a record's `@type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Content,
    Article,
    Image,
    Video,
}

/// Wire tag -> variant. Single source of truth for type dispatch.
const TYPE_TABLE: &[(&str, ModelKind)] = &[
    ("ekn://_vocab/ContentObject", ModelKind::Content),
    ("ekn://_vocab/ArticleObject", ModelKind::Article),
    ("ekn://_vocab/ImageObject", ModelKind::Image),
    ("ekn://_vocab/VideoObject", ModelKind::Video),
];

impl ModelKind {
    /// Look up a wire tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        TYPE_TABLE
            .iter()
            .find(|(wire, _)| *wire == tag)
            .map(|(_, kind)| *kind)
    }

    /// Wire tag for this variant
    pub fn tag(self) -> &'static str {
        TYPE_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(wire, _)| *wire)
            .unwrap_or_default()
    }
}

fn redirect_target<'de, D>(deserializer: D) -> Result<Option<EknId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(target) => EknId::parse(target)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Attributes shared by every content variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentObject {
    #[serde(rename = "@id")]
    pub id: EknId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub synopsis: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Thumbnail reference (usually another ekn id)
    #[serde(default)]
    pub thumbnail: Option<String>,

    /// Media payload, resolved to an absolute URI after marshalling
    #[serde(default, rename = "contentURL")]
    pub content_url: Option<String>,

    /// MIME type of the payload
    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub last_modified_date: Option<DateTime<Utc>>,

    /// Target this object stands in for; `None` for terminal objects
    #[serde(default, deserialize_with = "redirect_target", skip_serializing_if = "Option::is_none")]
    pub redirects_to: Option<EknId>,
}

/// One entry of an article's table of contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    #[serde(rename = "hasIndex", default)]
    pub index: u32,

    #[serde(rename = "hasLabel", default)]
    pub label: String,

    #[serde(rename = "hasIndexLabel", default)]
    pub index_label: Option<String>,

    /// Anchor within the article body
    #[serde(rename = "hasContent", default)]
    pub anchor: Option<String>,

    #[serde(rename = "hasParent", default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleObject {
    #[serde(flatten)]
    pub content: ContentObject,

    #[serde(default)]
    pub article_body: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub word_count: Option<u64>,

    #[serde(default)]
    pub table_of_contents: Vec<TocEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageObject {
    #[serde(flatten)]
    pub content: ContentObject,

    #[serde(default)]
    pub caption: Option<String>,

    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoObject {
    #[serde(flatten)]
    pub content: ContentObject,

    /// ISO 8601 duration as stored by the backend
    #[serde(default)]
    pub duration: Option<String>,

    #[serde(default)]
    pub transcript: Option<String>,

    #[serde(default)]
    pub poster: Option<String>,
}

/// A marshalled result record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentModel {
    Content(ContentObject),
    Article(ArticleObject),
    Image(ImageObject),
    Video(VideoObject),
}

impl ContentModel {
    /// Shared attributes of any variant
    pub fn content(&self) -> &ContentObject {
        match self {
            ContentModel::Content(c) => c,
            ContentModel::Article(a) => &a.content,
            ContentModel::Image(i) => &i.content,
            ContentModel::Video(v) => &v.content,
        }
    }

    pub(crate) fn content_mut(&mut self) -> &mut ContentObject {
        match self {
            ContentModel::Content(c) => c,
            ContentModel::Article(a) => &mut a.content,
            ContentModel::Image(i) => &mut i.content,
            ContentModel::Video(v) => &mut v.content,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ContentModel::Content(_) => ModelKind::Content,
            ContentModel::Article(_) => ModelKind::Article,
            ContentModel::Image(_) => ModelKind::Image,
            ContentModel::Video(_) => ModelKind::Video,
        }
    }

    pub fn id(&self) -> &EknId {
        &self.content().id
    }

    pub fn title(&self) -> &str {
        &self.content().title
    }

    pub fn redirects_to(&self) -> Option<&EknId> {
        self.content().redirects_to.as_ref()
    }

    pub fn is_redirect(&self) -> bool {
        self.redirects_to().is_some()
    }

    /// Pin default-domain ids (`ekn:///<hash>`) on this record to `domain`,
    /// so ids compare equal however the backend spelled them.
    pub fn qualify(&mut self, domain: &str) {
        let content = self.content_mut();
        content.id = content.id.in_domain(domain);
        if let Some(target) = content.redirects_to.as_mut() {
            *target = target.in_domain(domain);
        }
    }
}
