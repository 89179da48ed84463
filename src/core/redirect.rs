//! Batch redirect resolution.
//!
//! Each hop collects the distinct redirect targets of the current sequence,
//! fetches them with one request, and substitutes the fetched objects in
//! place. Hops run strictly one after another because the targets of hop
//! N+1 are only known once hop N has been fetched.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use tracing::{debug, info};

use crate::domain::{ContentModel, EknId};

use super::error::EngineError;

/// Default bound on redirect hops per resolution
pub const DEFAULT_MAX_HOPS: u32 = 16;

/// Distinct redirect targets in first-seen order
pub fn redirect_targets(results: &[ContentModel]) -> Vec<EknId> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter_map(ContentModel::redirects_to)
        .filter(|target| seen.insert(*target))
        .cloned()
        .collect()
}

/// Replace every redirect target in `results` with its terminal object.
///
/// `refetch` receives the distinct targets of one hop and returns whatever
/// the backend has for them, without following redirects itself. Output
/// order always matches input order.
///
/// Targets are matched against fetched ids exactly, so both must already
/// be qualified (see `ContentModel::qualify`).
pub async fn resolve_redirects<F, Fut>(
    mut results: Vec<ContentModel>,
    max_hops: u32,
    mut refetch: F,
) -> Result<Vec<ContentModel>, EngineError>
where
    F: FnMut(Vec<EknId>) -> Fut,
    Fut: Future<Output = Result<Vec<ContentModel>, EngineError>>,
{
    let mut hops = 0u32;

    loop {
        let targets = redirect_targets(&results);
        if targets.is_empty() {
            debug!(hops, "Redirect resolution complete");
            return Ok(results);
        }

        if hops >= max_hops {
            return Err(EngineError::RedirectLoop { hops });
        }
        hops += 1;
        info!(hop = hops, targets = targets.len(), "Following redirects");

        let fetched: HashMap<EknId, ContentModel> = refetch(targets)
            .await?
            .into_iter()
            .map(|model| (model.id().clone(), model))
            .collect();

        results = results
            .into_iter()
            .map(|model| match model.redirects_to() {
                None => Ok(model),
                Some(target) => fetched.get(target).cloned().ok_or_else(|| {
                    EngineError::UnresolvedRedirect {
                        source_id: model.id().to_string(),
                        target: target.to_string(),
                    }
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
    }
}
