mod common;

use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use reqwest::Url;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::mpsc;

use tubecast::catalog::{Catalog, CatalogError, YouTubeClient};
use tubecast::cycle::Poller;
use tubecast::model::{AdConfig, ChannelRef, FeedId};
use tubecast::publisher::Publisher;
use tubecast::store::DedupStore;

type Params = Query<HashMap<String, String>>;

fn authorized(params: &HashMap<String, String>) -> bool {
    params.get("key").map(String::as_str) == Some("test-key")
}

async fn channels(Query(p): Params) -> impl IntoResponse {
    if !authorized(&p) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "bad key" })));
    }
    let items = match p.get("id").map(String::as_str) {
        Some("UCknown") => json!([{
            "contentDetails": { "relatedPlaylists": { "uploads": "UUknown" } }
        }]),
        _ => json!([]),
    };
    (StatusCode::OK, Json(json!({ "items": items })))
}

async fn playlist_items(Query(p): Params) -> impl IntoResponse {
    if p.get("playlistId").map(String::as_str) != Some("UUknown") {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "playlistNotFound" })));
    }
    let max: usize = p.get("maxResults").and_then(|m| m.parse().ok()).unwrap_or(5);
    let items: Vec<_> = (1..=12)
        .take(max)
        .map(|n| {
            json!({ "snippet": {
                "title": format!("Episode {n}"),
                "publishedAt": "2024-05-01T12:00:00Z",
                "resourceId": { "kind": "youtube#video", "videoId": format!("vid{n}") }
            }})
        })
        .collect();
    (StatusCode::OK, Json(json!({ "items": items })))
}

async fn videos(Query(p): Params) -> impl IntoResponse {
    let items = match p.get("id").map(String::as_str) {
        Some("vid1") => json!([{
            "snippet": {
                "title": "Episode 1",
                "description": "First one",
                "publishedAt": "2024-05-01T12:00:00Z",
                "thumbnails": {
                    "default": { "url": "https://i.ytimg.com/vi/vid1/default.jpg" },
                    "high": { "url": "https://i.ytimg.com/vi/vid1/hqdefault.jpg" }
                }
            },
            "contentDetails": { "duration": "PT1H2M3S" }
        }]),
        Some("boom") => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "backendError" })),
            )
        }
        _ => json!([]),
    };
    (StatusCode::OK, Json(json!({ "items": items })))
}

async fn search(Query(p): Params) -> impl IntoResponse {
    assert_eq!(p.get("type").map(String::as_str), Some("channel"));
    assert_eq!(p.get("maxResults").map(String::as_str), Some("5"));
    Json(json!({ "items": [
        {
            "id": { "kind": "youtube#channel", "channelId": "UCone" },
            "snippet": {
                "channelTitle": "One",
                "title": "One",
                "description": "first",
                "thumbnails": { "default": { "url": "https://yt3.example/one.jpg" } }
            }
        },
        {
            "id": { "kind": "youtube#channel" },
            "snippet": { "title": "No id" }
        }
    ]}))
}

async fn spawn_fake_youtube() -> Url {
    let app = Router::new()
        .route("/channels", get(channels))
        .route("/playlistItems", get(playlist_items))
        .route("/videos", get(videos))
        .route("/search", get(search));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

async fn client() -> YouTubeClient {
    YouTubeClient::with_base_url("test-key".into(), spawn_fake_youtube().await)
}

#[tokio::test]
async fn resolves_channel_to_uploads_feed() {
    let yt = client().await;
    let feed = yt
        .resolve_upload_feed(&ChannelRef::new("UCknown"))
        .await
        .unwrap();
    assert_eq!(feed, FeedId("UUknown".into()));
}

#[tokio::test]
async fn unknown_channel_is_not_found() {
    let yt = client().await;
    let err = yt
        .resolve_upload_feed(&ChannelRef::new("Some Display Name"))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn rejected_key_surfaces_api_status() {
    let url = spawn_fake_youtube().await;
    let yt = YouTubeClient::with_base_url("wrong".into(), url);
    let err = yt
        .resolve_upload_feed(&ChannelRef::new("UCknown"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Api { status: 403, .. }), "{err:?}");
}

#[tokio::test]
async fn listing_respects_limit_and_order() {
    let yt = client().await;
    let items = yt
        .list_recent_items(&FeedId("UUknown".into()), 3)
        .await
        .unwrap();
    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["vid1", "vid2", "vid3"]);
    assert_eq!(items[0].title, "Episode 1");
    assert!(items[0].published_at.is_some());
}

#[tokio::test]
async fn missing_feed_maps_404_to_not_found() {
    let yt = client().await;
    let err = yt
        .list_recent_items(&FeedId("UUgone".into()), 10)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn detail_carries_duration_and_best_thumbnail() {
    let yt = client().await;
    let item = yt.fetch_item_detail("vid1").await.unwrap();
    assert_eq!(item.title, "Episode 1");
    assert_eq!(item.description, "First one");
    assert_eq!(item.duration_seconds, Some(3723));
    assert_eq!(
        item.thumbnail_url.as_deref(),
        Some("https://i.ytimg.com/vi/vid1/hqdefault.jpg")
    );
    assert_eq!(item.source_url, "https://www.youtube.com/watch?v=vid1");
}

#[tokio::test]
async fn detail_errors_are_distinguished() {
    let yt = client().await;
    assert!(yt.fetch_item_detail("nope").await.unwrap_err().is_not_found());
    let err = yt.fetch_item_detail("boom").await.unwrap_err();
    assert!(matches!(err, CatalogError::Api { status: 500, .. }));
}

#[tokio::test]
async fn search_skips_hits_without_channel_id() {
    let yt = client().await;
    let hits = yt.search_channels("one").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].channel_id, "UCone");
    assert_eq!(hits[0].channel_title, "One");
}

#[tokio::test]
async fn unreachable_api_never_leaks_the_key_into_reports() {
    const KEY: &str = "SUPER-SECRET-KEY";
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let base = Url::parse(&format!("http://{addr}/youtube/v3/")).unwrap();
    let td = tempdir().unwrap();
    let poller = Poller::new(
        Arc::new(YouTubeClient::with_base_url(KEY.into(), base)),
        Arc::new(common::FakeMedia::new(&td.path().join("work"))),
        Publisher::test_mode(),
        DedupStore::empty(td.path().join("state.json")),
        common::settings(&["UC1"], AdConfig::default()),
    );

    let report = poller.run_cycle().await.unwrap();
    assert_eq!(report.channel_errors.len(), 1);
    let activity = serde_json::to_string(&poller.recent_cycles()).unwrap();
    assert!(activity.contains("failed to reach catalog API"));
    assert!(!activity.contains(KEY), "{activity}");

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = poller
        .publish_single("https://youtu.be/abc", &tx)
        .await
        .unwrap_err();
    assert_eq!(err.stage(), "detail");
    assert!(!err.to_string().contains(KEY));
    assert!(!format!("{err:?}").contains(KEY));
}
