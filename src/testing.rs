//! In-memory [`PlatformApi`] for exercising the pipeline without a network.

use crate::{
    api::PlatformApi,
    error::ApiError,
    models::{ItemPage, LikedEntry, VideoDuration},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Makes the `call`-th (0-based) invocation of one operation fail.
#[derive(Clone, Debug)]
pub struct Failure {
    pub call: usize,
    pub status: u16,
    pub message: String,
}

impl Failure {
    pub fn quota(call: usize) -> Self {
        Self {
            call,
            status: 403,
            message: "The request cannot be completed because you have exceeded your quota.".to_string(),
        }
    }

    pub fn status(call: usize, status: u16, message: &str) -> Self {
        Self {
            call,
            status,
            message: message.to_string(),
        }
    }

    fn to_error(&self, endpoint: &str) -> ApiError {
        ApiError::Status {
            endpoint: endpoint.to_string(),
            status: self.status,
            message: self.message.clone(),
            reasons: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct Calls {
    pub pages: Vec<Option<String>>,
    pub lookups: Vec<Vec<String>>,
    pub deletes: Vec<String>,
    pub ratings: Vec<String>,
}

#[derive(Default)]
pub struct FakeApi {
    pub entries: Vec<LikedEntry>,
    /// video id -> ISO-8601 duration
    pub durations: HashMap<String, String>,
    pub page_failure: Option<Failure>,
    pub lookup_failure: Option<Failure>,
    pub delete_failure: Option<Failure>,
    pub rating_failure: Option<Failure>,
    pub calls: Mutex<Calls>,
}

impl FakeApi {
    /// Liked set built from `(video id, title, duration)` triples; entry ids are `e-<video id>`.
    pub fn with_videos(videos: &[(&str, &str, &str)]) -> Self {
        Self {
            entries: videos
                .iter()
                .map(|(id, title, _)| LikedEntry::new(*id, format!("e-{id}"), *title))
                .collect(),
            durations: videos
                .iter()
                .map(|(id, _, d)| (id.to_string(), d.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// `n` liked videos, all `PT1M` long.
    pub fn with_count(n: usize) -> Self {
        let mut api = Self::default();
        for i in 0..n {
            let id = format!("v{i}");
            api.entries.push(LikedEntry::new(&id, format!("e-{id}"), format!("Video {i}")));
            api.durations.insert(id, "PT1M".to_string());
        }
        api
    }

    fn failing(failure: &Option<Failure>, call: usize, endpoint: &str) -> Result<(), ApiError> {
        match failure {
            Some(f) if f.call == call => Err(f.to_error(endpoint)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformApi for FakeApi {
    async fn liked_collection_id(&self) -> Result<String, ApiError> {
        Ok("LL".to_string())
    }

    async fn list_collection_items(
        &self,
        collection_id: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ItemPage, ApiError> {
        assert_eq!(collection_id, "LL");
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.pages.push(page_token.map(str::to_string));
            calls.pages.len() - 1
        };
        Self::failing(&self.page_failure, call, "playlistItems.list")?;

        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + page_size).min(self.entries.len());
        Ok(ItemPage {
            entries: self.entries[start..end].to_vec(),
            next_page_token: (end < self.entries.len()).then(|| end.to_string()),
        })
    }

    async fn list_video_durations(&self, video_ids: &[String]) -> Result<Vec<VideoDuration>, ApiError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.lookups.push(video_ids.to_vec());
            calls.lookups.len() - 1
        };
        Self::failing(&self.lookup_failure, call, "videos.list")?;

        Ok(video_ids
            .iter()
            .filter_map(|id| {
                self.durations.get(id).map(|d| VideoDuration {
                    video_id: id.clone(),
                    iso_duration: d.clone(),
                })
            })
            .collect())
    }

    async fn delete_collection_item(&self, collection_entry_id: &str) -> Result<(), ApiError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.deletes.push(collection_entry_id.to_string());
            calls.deletes.len() - 1
        };
        Self::failing(&self.delete_failure, call, "playlistItems.delete")
    }

    async fn clear_rating(&self, video_id: &str) -> Result<(), ApiError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.ratings.push(video_id.to_string());
            calls.ratings.len() - 1
        };
        Self::failing(&self.rating_failure, call, "videos.rate")
    }
}
