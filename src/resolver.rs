use crate::{
    api::{PlatformApi, MAX_PAGE_SIZE},
    duration,
    error::{ApiError, ErrorClassifier, Resilience, Stage, Staged},
    models::DurationIndex,
};
use std::collections::HashSet;
use tracing::{info, warn};

/// Looks up durations in batches of at most `batch_size` ids (capped at the API limit of 50).
///
/// Ids the API does not return, or whose duration does not parse, are left out of the index.
pub async fn resolve_durations(
    api: &dyn PlatformApi,
    video_ids: &[String],
    batch_size: usize,
    resilience: Resilience,
    classifier: &dyn ErrorClassifier,
) -> Result<Staged<DurationIndex>, ApiError> {
    let mut seen = HashSet::with_capacity(video_ids.len());
    let ids: Vec<String> = video_ids
        .iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect();
    let batch_size = batch_size.clamp(1, MAX_PAGE_SIZE);

    let mut index = DurationIndex::with_capacity(ids.len());

    let mut processed = 0;
    for batch in ids.chunks(batch_size) {
        let details = match api.list_video_durations(batch).await {
            Ok(details) => details,
            Err(e) => {
                let interruption = resilience.intercept(Stage::Resolve, e, classifier)?;
                return Ok(Staged {
                    value: index,
                    interruption: Some(interruption),
                });
            }
        };

        for detail in details {
            match duration::parse_minutes(&detail.iso_duration) {
                Ok(minutes) => {
                    index.insert(detail.video_id, minutes);
                }
                Err(e) => warn!("Unreadable duration for {}: {}", detail.video_id, e),
            }
        }

        processed += batch.len();
        info!("Processed {}/{} videos", processed, ids.len());
    }

    Ok(Staged::complete(index))
}
