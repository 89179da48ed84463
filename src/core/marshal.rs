//! Response marshalling: raw backend payloads -> typed models.
//!
//! Batches are fail-fast. One record that cannot be marshalled fails the
//! whole response, so callers never see a partial batch.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{ContentModel, ModelKind};

use super::error::EngineError;

/// Media directory inside a domain's storage root
pub const MEDIA_DIR: &str = "media";

/// Records from one backend response
#[derive(Debug, Clone, PartialEq)]
pub struct MarshalledPage {
    pub results: Vec<ContentModel>,

    /// Total matches reported by the backend (`numResults`)
    pub total: Option<u64>,
}

/// Absolute URI for a media reference.
///
/// Relative references live under `<root>/media/`. References that already
/// carry a scheme are returned untouched.
pub fn resolve_media_uri(root: &Path, url: &str) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    let path = root.join(MEDIA_DIR).join(url.trim_start_matches('/'));
    format!("file://{}", path.display())
}

fn decode<T: DeserializeOwned>(kind: ModelKind, record: Value) -> Result<T, EngineError> {
    serde_json::from_value(record).map_err(|e| {
        EngineError::MalformedResponse(format!("invalid {} record: {}", kind.tag(), e))
    })
}

/// Marshal a single record.
///
/// The record may be an object or a JSON string holding one; the search
/// bridge stores records in serialized form.
pub fn marshal_one(record: &Value, root: &Path) -> Result<ContentModel, EngineError> {
    let record: Value = match record {
        Value::String(serialized) => serde_json::from_str(serialized).map_err(|e| {
            EngineError::MalformedResponse(format!("record is not valid JSON: {e}"))
        })?,
        other => other.clone(),
    };

    if !record.is_object() {
        return Err(EngineError::MalformedResponse(format!(
            "record must be an object, got {record}"
        )));
    }

    let tag = record
        .get("@type")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::MalformedResponse("record has no @type".to_string()))?;

    let kind = ModelKind::from_tag(tag).ok_or_else(|| EngineError::UnsupportedType {
        tag: tag.to_string(),
    })?;

    let mut model = match kind {
        ModelKind::Content => ContentModel::Content(decode(kind, record)?),
        ModelKind::Article => ContentModel::Article(decode(kind, record)?),
        ModelKind::Image => ContentModel::Image(decode(kind, record)?),
        ModelKind::Video => ContentModel::Video(decode(kind, record)?),
    };

    resolve_media(&mut model, root);
    Ok(model)
}

fn resolve_media(model: &mut ContentModel, root: &Path) {
    let content = model.content_mut();
    if let Some(url) = content.content_url.as_mut() {
        *url = resolve_media_uri(root, url);
    }
    if let ContentModel::Video(video) = model {
        if let Some(poster) = video.poster.as_mut() {
            *poster = resolve_media_uri(root, poster);
        }
    }
}

/// Marshal a batch envelope of the form `{"numResults": n, "results": [...]}`
pub fn marshal_many(payload: &str, root: &Path) -> Result<MarshalledPage, EngineError> {
    if payload.trim().is_empty() {
        return Err(EngineError::MalformedResponse("empty response".to_string()));
    }

    let envelope: Value = serde_json::from_str(payload)
        .map_err(|e| EngineError::MalformedResponse(format!("response is not valid JSON: {e}")))?;

    let object = envelope.as_object().ok_or_else(|| {
        EngineError::MalformedResponse(format!("response must be an object, got {envelope}"))
    })?;

    let records = object
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            EngineError::MalformedResponse("response has no results array".to_string())
        })?;

    let results = records
        .iter()
        .map(|record| marshal_one(record, root))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MarshalledPage {
        results,
        total: object.get("numResults").and_then(Value::as_u64),
    })
}
