use crate::{
    api::{PlatformApi, MAX_PAGE_SIZE},
    error::{ApiError, ErrorClassifier, Resilience, Stage, Staged},
    models::LikedEntry,
};
use tracing::info;

/// Everything in the liked collection, in collection order.
#[derive(Debug)]
pub struct LikedSet {
    pub collection_id: String,
    pub entries: Vec<LikedEntry>,
}

/// Pages through the liked-videos collection until no continuation token comes back.
///
/// The collection id lookup is never trapped: without it there is nothing partial to return.
pub async fn fetch_liked(
    api: &dyn PlatformApi,
    page_size: usize,
    resilience: Resilience,
    classifier: &dyn ErrorClassifier,
) -> Result<Staged<LikedSet>, ApiError> {
    let collection_id = api.liked_collection_id().await?;
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

    let mut entries = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let result = api
            .list_collection_items(&collection_id, page_token.as_deref(), page_size)
            .await;
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                let interruption = resilience.intercept(Stage::Fetch, e, classifier)?;
                return Ok(Staged {
                    value: LikedSet {
                        collection_id,
                        entries,
                    },
                    interruption: Some(interruption),
                });
            }
        };

        entries.extend(page.entries);
        info!("Retrieved {} liked videos so far...", entries.len());

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(Staged::complete(LikedSet {
        collection_id,
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, KeywordClassifier};
    use crate::testing::{FakeApi, Failure};

    #[tokio::test]
    async fn pages_cover_every_record_once_in_order() {
        for n in [0usize, 1, 49, 50, 51, 120] {
            let api = FakeApi::with_count(n);
            let out = fetch_liked(&api, 50, Resilience::Resilient, &KeywordClassifier::default())
                .await
                .unwrap();
            assert!(out.interruption.is_none());
            assert_eq!(out.value.collection_id, "LL");
            assert_eq!(out.value.entries, api.entries);

            let expected_pages = n.div_ceil(50).max(1);
            assert_eq!(api.calls.lock().unwrap().pages.len(), expected_pages, "n={n}");
        }
    }

    #[tokio::test]
    async fn oversized_page_request_is_clamped() {
        let api = FakeApi::with_count(120);
        fetch_liked(&api, 500, Resilience::Resilient, &KeywordClassifier::default())
            .await
            .unwrap();
        assert_eq!(api.calls.lock().unwrap().pages.len(), 3);
    }

    #[tokio::test]
    async fn quota_on_later_page_keeps_partial_results() {
        let mut api = FakeApi::with_count(120);
        api.page_failure = Some(Failure::quota(1));
        let out = fetch_liked(&api, 50, Resilience::Resilient, &KeywordClassifier::default())
            .await
            .unwrap();
        assert_eq!(out.value.entries.len(), 50);
        let interruption = out.interruption.unwrap();
        assert_eq!(interruption.stage, Stage::Fetch);
        assert_eq!(interruption.class, ErrorClass::TransientQuota);
    }

    #[tokio::test]
    async fn non_quota_error_also_stops_resilient_loop() {
        let mut api = FakeApi::with_count(120);
        api.page_failure = Some(Failure::status(2, 500, "backend error"));
        let out = fetch_liked(&api, 50, Resilience::Resilient, &KeywordClassifier::default())
            .await
            .unwrap();
        assert_eq!(out.value.entries.len(), 100);
        assert_eq!(out.interruption.unwrap().class, ErrorClass::TransientOther);
        assert_eq!(api.calls.lock().unwrap().pages.len(), 3);
    }

    #[tokio::test]
    async fn fail_fast_propagates_page_error() {
        let mut api = FakeApi::with_count(60);
        api.page_failure = Some(Failure::quota(0));
        let out = fetch_liked(&api, 50, Resilience::FailFast, &KeywordClassifier::default()).await;
        assert!(matches!(out, Err(ApiError::Status { status: 403, .. })));
    }
}
