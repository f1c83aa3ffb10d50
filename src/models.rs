use serde::Deserialize;
use std::collections::HashMap;

/// One membership record of the liked-videos collection.
#[derive(Clone, Debug, PartialEq)]
pub struct LikedEntry {
    pub video_id: String,
    /// Removal goes through this id, not `video_id`.
    pub collection_entry_id: String,
    pub title: String,
    pub duration_minutes: Option<f64>,
}

impl LikedEntry {
    pub fn new(
        video_id: impl Into<String>,
        collection_entry_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            collection_entry_id: collection_entry_id.into(),
            title: title.into(),
            duration_minutes: None,
        }
    }
}

/// Video id to duration in minutes.
pub type DurationIndex = HashMap<String, f64>;

#[derive(Clone, Debug, Default)]
pub struct ItemPage {
    pub entries: Vec<LikedEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoDuration {
    pub video_id: String,
    pub iso_duration: String,
}

// Wire shapes of the YouTube Data API v3. Only the fields this tool reads.

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    pub likes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub id: String,
    pub snippet: Option<PlaylistItemSnippet>,
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemSnippet {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
}
