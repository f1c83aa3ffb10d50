use crate::models::{DurationIndex, LikedEntry};
use tracing::warn;

/// Liked entries split by how their duration compares to the threshold. Input order is kept.
#[derive(Debug, Default)]
pub struct Selection {
    /// Strictly shorter than the threshold.
    pub selected: Vec<LikedEntry>,
    pub retained: Vec<LikedEntry>,
    /// No duration was resolved; never selected.
    pub unresolved: Vec<LikedEntry>,
}

pub fn select_short(entries: Vec<LikedEntry>, durations: &DurationIndex, threshold: f64) -> Selection {
    let mut selection = Selection::default();

    for mut entry in entries {
        let Some(&minutes) = durations.get(&entry.video_id) else {
            warn!("Warning: Couldn't get duration for {}", entry.title);
            selection.unresolved.push(entry);
            continue;
        };

        entry.duration_minutes = Some(minutes);
        if minutes < threshold {
            selection.selected.push(entry);
        } else {
            selection.retained.push(entry);
        }
    }

    selection
}
