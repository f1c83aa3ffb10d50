use crate::{
    error::ApiError,
    models::{
        ChannelListResponse, ErrorEnvelope, ItemPage, LikedEntry, PlaylistItemListResponse,
        VideoDuration, VideoListResponse,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Largest `maxResults` / id-list size the API accepts per call.
pub const MAX_PAGE_SIZE: usize = 50;

/// The calls this tool makes against the video platform.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Id of the authenticated user's liked-videos collection.
    async fn liked_collection_id(&self) -> Result<String, ApiError>;

    async fn list_collection_items(
        &self,
        collection_id: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ItemPage, ApiError>;

    /// Content details for up to [`MAX_PAGE_SIZE`] ids. Unknown ids are absent from the result.
    async fn list_video_durations(&self, video_ids: &[String]) -> Result<Vec<VideoDuration>, ApiError>;

    async fn delete_collection_item(&self, collection_entry_id: &str) -> Result<(), ApiError>;

    /// Resets the user's rating of a video (`rating=none`).
    async fn clear_rating(&self, video_id: &str) -> Result<(), ApiError>;
}

/// reqwest-backed client for the YouTube Data API v3.
pub struct YouTubeClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl YouTubeClient {
    pub fn new(base_url: &str, access_token: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.access_token)
    }

    async fn send(&self, endpoint: &str, rb: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        debug!("[api] {}", endpoint);
        let response = rb.send().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(endpoint, status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        rb: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, rb).await?;
        let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

/// Builds an [`ApiError::Status`] from a Google-style error body, falling back to the raw text.
fn status_error(endpoint: &str, status: u16, body: &str) -> ApiError {
    let (message, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope.error.message,
            envelope
                .error
                .errors
                .into_iter()
                .map(|e| e.reason)
                .filter(|r| !r.is_empty())
                .collect(),
        ),
        Err(_) => (body.trim().to_string(), Vec::new()),
    };
    ApiError::Status {
        endpoint: endpoint.to_string(),
        status,
        message,
        reasons,
    }
}

#[async_trait]
impl PlatformApi for YouTubeClient {
    async fn liked_collection_id(&self) -> Result<String, ApiError> {
        let endpoint = "channels.list";
        let rb = self
            .request(Method::GET, "channels")
            .query(&[("part", "contentDetails"), ("mine", "true")]);
        let response: ChannelListResponse = self.get_json(endpoint, rb).await?;

        let channel = response.items.into_iter().next().ok_or(ApiError::NoChannel)?;
        channel
            .content_details
            .related_playlists
            .likes
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Decode {
                endpoint: endpoint.to_string(),
                message: "channel has no relatedPlaylists.likes".to_string(),
            })
    }

    async fn list_collection_items(
        &self,
        collection_id: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<ItemPage, ApiError> {
        let max_results = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut rb = self.request(Method::GET, "playlistItems").query(&[
            ("part", "snippet,contentDetails"),
            ("playlistId", collection_id),
            ("maxResults", max_results.as_str()),
        ]);
        if let Some(token) = page_token {
            rb = rb.query(&[("pageToken", token)]);
        }
        let response: PlaylistItemListResponse = self.get_json("playlistItems.list", rb).await?;

        let mut entries = Vec::with_capacity(response.items.len());
        for item in response.items {
            let Some(video_id) = item.content_details.and_then(|d| d.video_id) else {
                warn!("[api] Skipping liked item {} without a video id", item.id);
                continue;
            };
            let title = item.snippet.map(|s| s.title).unwrap_or_default();
            entries.push(LikedEntry::new(video_id, item.id, title));
        }

        Ok(ItemPage {
            entries,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn list_video_durations(&self, video_ids: &[String]) -> Result<Vec<VideoDuration>, ApiError> {
        let ids = video_ids.join(",");
        let rb = self
            .request(Method::GET, "videos")
            .query(&[("part", "contentDetails"), ("id", ids.as_str())]);
        let response: VideoListResponse = self.get_json("videos.list", rb).await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|video| {
                let duration = video.content_details.and_then(|d| d.duration)?;
                Some(VideoDuration {
                    video_id: video.id,
                    iso_duration: duration,
                })
            })
            .collect())
    }

    async fn delete_collection_item(&self, collection_entry_id: &str) -> Result<(), ApiError> {
        let rb = self
            .request(Method::DELETE, "playlistItems")
            .query(&[("id", collection_entry_id)]);
        self.send("playlistItems.delete", rb).await?;
        Ok(())
    }

    async fn clear_rating(&self, video_id: &str) -> Result<(), ApiError> {
        let rb = self
            .request(Method::POST, "videos/rate")
            .query(&[("id", video_id), ("rating", "none")])
            .header(reqwest::header::CONTENT_LENGTH, "0");
        self.send("videos.rate", rb).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base: &str) -> YouTubeClient {
        YouTubeClient::new(base, "tok-123".to_string(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn liked_collection_id_sends_bearer_and_reads_likes() {
        let app = Router::new().route(
            "/channels",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(headers["authorization"], "Bearer tok-123");
                assert_eq!(q["part"], "contentDetails");
                assert_eq!(q["mine"], "true");
                Json(json!({
                    "items": [{"contentDetails": {"relatedPlaylists": {"likes": "LL", "uploads": "UU1"}}}]
                }))
            }),
        );
        let base = serve(app).await;
        assert_eq!(client(&base).liked_collection_id().await.unwrap(), "LL");
    }

    #[tokio::test]
    async fn liked_collection_id_without_channel_is_no_channel() {
        let app = Router::new().route("/channels", get(|| async { Json(json!({"items": []})) }));
        let base = serve(app).await;
        assert!(matches!(
            client(&base).liked_collection_id().await,
            Err(ApiError::NoChannel)
        ));
    }

    #[tokio::test]
    async fn list_collection_items_decodes_page_and_skips_items_without_video() {
        let app = Router::new().route(
            "/playlistItems",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["playlistId"], "LL");
                assert_eq!(q["maxResults"], "50");
                assert_eq!(q["pageToken"], "p2");
                Json(json!({
                    "nextPageToken": "p3",
                    "items": [
                        {"id": "e1", "snippet": {"title": "Short"}, "contentDetails": {"videoId": "a"}},
                        {"id": "e2", "snippet": {"title": "Gone"}, "contentDetails": {}},
                        {"id": "e3", "snippet": {"title": "Long"}, "contentDetails": {"videoId": "b"}}
                    ]
                }))
            }),
        );
        let base = serve(app).await;
        let page = client(&base)
            .list_collection_items("LL", Some("p2"), 500)
            .await
            .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("p3"));
        assert_eq!(
            page.entries,
            vec![LikedEntry::new("a", "e1", "Short"), LikedEntry::new("b", "e3", "Long")]
        );
    }

    #[tokio::test]
    async fn empty_next_page_token_ends_pagination() {
        let app = Router::new().route(
            "/playlistItems",
            get(|| async { Json(json!({"nextPageToken": "", "items": []})) }),
        );
        let base = serve(app).await;
        let page = client(&base).list_collection_items("LL", None, 50).await.unwrap();
        assert!(page.next_page_token.is_none());
        assert!(page.entries.is_empty());
    }

    #[tokio::test]
    async fn list_video_durations_joins_ids() {
        let app = Router::new().route(
            "/videos",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["id"], "a,b,c");
                Json(json!({
                    "items": [
                        {"id": "a", "contentDetails": {"duration": "PT2M"}},
                        {"id": "c", "contentDetails": {"duration": "PT10M"}}
                    ]
                }))
            }),
        );
        let base = serve(app).await;
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out = client(&base).list_video_durations(&ids).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].video_id, "c");
        assert_eq!(out[1].iso_duration, "PT10M");
    }

    #[tokio::test]
    async fn quota_error_body_maps_to_status_with_reasons() {
        let app = Router::new().route(
            "/playlistItems",
            axum::routing::delete(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": {
                            "code": 403,
                            "message": "The request cannot be completed because you have exceeded your quota.",
                            "errors": [{"domain": "youtube.quota", "reason": "quotaExceeded"}]
                        }
                    })),
                )
            }),
        );
        let base = serve(app).await;
        let err = client(&base).delete_collection_item("e1").await.unwrap_err();
        match err {
            ApiError::Status { status, message, reasons, endpoint } => {
                assert_eq!(status, 403);
                assert_eq!(endpoint, "playlistItems.delete");
                assert!(message.contains("quota"));
                assert_eq!(reasons, vec!["quotaExceeded".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_keeps_raw_text() {
        let app = Router::new().route(
            "/playlistItems",
            axum::routing::delete(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = serve(app).await;
        let err = client(&base).delete_collection_item("e1").await.unwrap_err();
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn clear_rating_posts_rating_none() {
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let app = Router::new().route(
            "/videos/rate",
            post(move |Query(q): Query<HashMap<String, String>>| {
                let seen = seen2.clone();
                async move {
                    seen.lock()
                        .unwrap()
                        .push((q["id"].clone(), q["rating"].clone()));
                    StatusCode::NO_CONTENT
                }
            }),
        );
        let base = serve(app).await;
        client(&base).clear_rating("a").await.unwrap();
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[("a".to_string(), "none".to_string())]
        );
    }

    #[tokio::test]
    async fn malformed_success_body_is_decode_error() {
        let app = Router::new().route("/videos", get(|| async { Json(Value::String("nope".into())) }));
        let base = serve(app).await;
        let err = client(&base)
            .list_video_durations(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
