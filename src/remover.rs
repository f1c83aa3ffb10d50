use crate::{
    api::PlatformApi,
    error::{ApiError, ErrorClassifier, Interruption, Resilience, Stage},
    models::LikedEntry,
};
use tracing::info;

#[derive(Debug, Default)]
pub struct RemovalReport {
    /// Entries whose membership record was deleted before any abort.
    pub removed: usize,
    pub interruption: Option<Interruption>,
}

/// Deletes each entry's membership record in order, optionally clearing the video's rating too.
pub async fn remove_entries(
    api: &dyn PlatformApi,
    entries: &[LikedEntry],
    clear_rating: bool,
    resilience: Resilience,
    classifier: &dyn ErrorClassifier,
) -> Result<RemovalReport, ApiError> {
    let mut report = RemovalReport::default();

    for entry in entries {
        info!(
            "Unliking: {} (Duration: {:.2} minutes)",
            entry.title,
            entry.duration_minutes.unwrap_or_default()
        );

        if let Err(e) = api.delete_collection_item(&entry.collection_entry_id).await {
            report.interruption = Some(resilience.intercept(Stage::Remove, e, classifier)?);
            break;
        }
        report.removed += 1;

        if clear_rating {
            if let Err(e) = api.clear_rating(&entry.video_id).await {
                report.interruption = Some(resilience.intercept(Stage::Remove, e, classifier)?);
                break;
            }
        }
    }

    Ok(report)
}
