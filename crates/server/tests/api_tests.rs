//! API tests driving the router against mock instances.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{encode_instance, fixtures, Part, TestFixture};
use qbfleet_core::instance::DELETED_TORRENT_MESSAGE;
use qbfleet_core::{InstanceApi, InstanceError, TorrentFile};

const QB1: &str = "http://qb1:8080";
const QB2: &str = "http://qb2:8080";

// ============================================================================
// Health, config, metrics
// ============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new(&[QB1]).await;

    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);

    let endpoints = response.body["endpoints"].as_array().unwrap();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0]["url"], QB1);
    assert_eq!(endpoints[0]["password_configured"], true);
    assert!(endpoints[0].get("password").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new(&[QB1]).await;
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/api/v1/metrics").await;
    assert_status!(response, StatusCode::OK);
    let text = response.body.as_str().unwrap();
    assert!(text.contains("qbfleet_http_requests_total"));
}

#[tokio::test]
async fn test_instances_report_versions() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    fixture
        .instance(1)
        .set_failure(InstanceError::ConnectionFailed("refused".to_string()))
        .await;

    let response = fixture.get("/api/v1/instances").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["count"], 2);
    assert_eq!(response.body["instances"][0]["instance"], QB1);
    assert_eq!(response.body["instances"][0]["version"], "2.11.2");
    assert!(response.body["instances"][1]["error"].is_string());
}

// ============================================================================
// Torrents
// ============================================================================

#[tokio::test]
async fn test_list_torrents_with_unreachable_instance() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    fixture
        .instance(0)
        .set_failure(InstanceError::ConnectionFailed("refused".to_string()))
        .await;
    let qb2 = fixture.instance(1);
    for (hash, name) in [("aa", "Gamma"), ("bb", "Alpha"), ("cc", "Beta")] {
        qb2.add_torrent(fixtures::torrent(qb2.id(), hash, name)).await;
    }

    let response = fixture.get("/api/v1/torrents").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["count"], 3);

    let names: Vec<&str> = response.body["torrents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

    let errors = response.body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["instance"], QB1);
}

#[tokio::test]
async fn test_list_abandoned() {
    let fixture = TestFixture::new(&[QB1]).await;
    let qb1 = fixture.instance(0);
    qb1.add_torrent(fixtures::torrent(qb1.id(), "aa", "Gone")).await;
    qb1.add_torrent(fixtures::torrent(qb1.id(), "bb", "Alive")).await;
    qb1.set_trackers(
        "aa",
        vec![fixtures::tracker("https://t.example/announce", DELETED_TORRENT_MESSAGE)],
    )
    .await;

    let response = fixture.get("/api/v1/torrents/abandoned").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["count"], 1);
    assert_eq!(response.body["torrents"][0]["torrent"]["hash"], "aa");
    assert_eq!(
        response.body["torrents"][0]["tracker_url"],
        "https://t.example/announce"
    );
}

#[tokio::test]
async fn test_get_trackers() {
    let fixture = TestFixture::new(&[QB1]).await;
    let qb1 = fixture.instance(0);
    qb1.add_torrent(fixtures::torrent(qb1.id(), "aa", "Some Torrent")).await;
    qb1.set_trackers("aa", vec![fixtures::tracker("https://t.example/announce", "")])
        .await;

    let path = format!("/api/v1/torrents/{}/aa/trackers", encode_instance(QB1));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body[0]["url"], "https://t.example/announce");
    assert_eq!(response.body[0]["status"], "working");
}

#[tokio::test]
async fn test_get_trackers_unknown_torrent() {
    let fixture = TestFixture::new(&[QB1]).await;

    let path = format!("/api/v1/torrents/{}/ffff/trackers", encode_instance(QB1));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_files_unknown_instance() {
    let fixture = TestFixture::new(&[QB1]).await;

    let path = format!(
        "/api/v1/torrents/{}/aa/files",
        encode_instance("http://qb9:8080")
    );
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_files() {
    let fixture = TestFixture::new(&[QB1]).await;
    let qb1 = fixture.instance(0);
    qb1.add_torrent(fixtures::torrent(qb1.id(), "aa", "Season 1")).await;
    qb1.set_files(
        "aa",
        vec![
            TorrentFile {
                index: 0,
                name: "Season 1/E01.mkv".to_string(),
                size: 700,
                progress: 1.0,
                priority: 1,
                availability: 2.0,
                is_seed: Some(true),
            },
            TorrentFile {
                index: 1,
                name: "Season 1/E02.mkv".to_string(),
                size: 650,
                progress: 0.5,
                priority: 0,
                availability: 1.0,
                is_seed: None,
            },
        ],
    )
    .await;

    let path = format!("/api/v1/torrents/{}/aa/files", encode_instance(QB1));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::OK);

    let files = response.body.as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "Season 1/E01.mkv");
    assert_eq!(files[0]["size"], 700);
    assert_eq!(files[0]["is_seed"], true);
    assert_eq!(files[1]["index"], 1);
    assert_eq!(files[1]["priority"], 0);
    assert!(files[1].get("is_seed").is_none());
}

#[tokio::test]
async fn test_get_files_unknown_torrent() {
    let fixture = TestFixture::new(&[QB1]).await;
    let qb1 = fixture.instance(0);
    qb1.add_torrent(fixtures::torrent(qb1.id(), "aa", "Season 1")).await;

    let path = format!("/api/v1/torrents/{}/ffff/files", encode_instance(QB1));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().unwrap().contains("ffff"));
}

#[tokio::test]
async fn test_get_torrent() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    let qb2 = fixture.instance(1);
    qb2.add_torrent(fixtures::categorized_torrent(qb2.id(), "aa", "Some Movie", "movies")).await;

    let path = format!("/api/v1/torrents/{}/aa", encode_instance(QB2));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["hash"], "aa");
    assert_eq!(response.body["name"], "Some Movie");
    assert_eq!(response.body["category"], "movies");
    assert_eq!(response.body["instance"], QB2);
}

#[tokio::test]
async fn test_get_torrent_unknown_hash() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    let qb2 = fixture.instance(1);
    qb2.add_torrent(fixtures::torrent(qb2.id(), "aa", "Some Movie")).await;

    // The torrent lives on qb2; asking qb1 for it is not found.
    let path = format!("/api/v1/torrents/{}/aa", encode_instance(QB1));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let path = format!("/api/v1/torrents/{}/ffff", encode_instance(QB2));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_torrent_instance_error() {
    let fixture = TestFixture::new(&[QB1]).await;
    let qb1 = fixture.instance(0);
    qb1.add_torrent(fixtures::torrent(qb1.id(), "aa", "Some Movie")).await;
    qb1.set_failure(InstanceError::Timeout).await;

    let path = format!("/api/v1/torrents/{}/aa", encode_instance(QB1));
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::GATEWAY_TIMEOUT);

    qb1.clear_failure().await;
    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["name"], "Some Movie");
}

#[tokio::test]
async fn test_list_torrents_after_instance_recovers() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    let qb1 = fixture.instance(0);
    qb1.add_torrent(fixtures::torrent(qb1.id(), "aa", "Alpha")).await;
    qb1.set_failure(InstanceError::ConnectionFailed("refused".to_string())).await;

    let response = fixture.get("/api/v1/torrents").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["count"], 0);
    assert_eq!(response.body["errors"].as_array().unwrap().len(), 1);

    qb1.clear_failure().await;
    let response = fixture.get("/api/v1/torrents").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["count"], 1);
    assert!(response.body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let fixture = TestFixture::new(&[QB1]).await;
    let qb1 = fixture.instance(0);
    let pause = format!("/api/v1/torrents/{}/pause", encode_instance(QB1));
    let resume = format!("/api/v1/torrents/{}/resume", encode_instance(QB1));

    let response = fixture.post(&pause, json!({ "hashes": ["aa", "bb"] })).await;
    assert_status!(response, StatusCode::OK);
    assert!(qb1.is_paused("aa").await);
    assert!(qb1.is_paused("bb").await);

    let response = fixture.post(&resume, json!({ "hashes": ["aa"] })).await;
    assert_status!(response, StatusCode::OK);
    assert!(!qb1.is_paused("aa").await);
    assert!(qb1.is_paused("bb").await);
}

#[tokio::test]
async fn test_pause_requires_hashes() {
    let fixture = TestFixture::new(&[QB1]).await;

    let path = format!("/api/v1/torrents/{}/pause", encode_instance(QB1));
    let response = fixture.post(&path, json!({ "hashes": [] })).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Categories
// ============================================================================

#[tokio::test]
async fn test_list_categories_union() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    fixture.instance(0).add_category("movies", "/data/movies").await;
    fixture.instance(1).add_category("movies", "/srv/movies").await;
    fixture.instance(1).add_category("tv", "/srv/tv").await;

    let response = fixture.get("/api/v1/categories").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["count"], 2);

    let movies = &response.body["categories"][0];
    assert_eq!(movies["name"], "movies");
    assert_eq!(movies["save_path"], "/data/movies");
    assert_eq!(movies["instances"], json!([QB1, QB2]));
}

#[tokio::test]
async fn test_sync_categories_is_idempotent() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    fixture.instance(0).add_category("movies", "/data/movies").await;

    let response = fixture.post_empty("/api/v1/categories/sync").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["created"], json!([[QB2, "movies"]]));
    assert_eq!(
        fixture
            .instance(1)
            .categories()
            .await
            .get("movies")
            .map(String::as_str),
        Some("/data/movies")
    );

    let response = fixture.post_empty("/api/v1/categories/sync").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["created"], json!([]));
    assert!(fixture.instance(0).created_categories().await.is_empty());
    assert_eq!(fixture.instance(1).created_categories().await.len(), 1);
}

#[tokio::test]
async fn test_sync_categories_conflict() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    fixture.instance(0).add_category("movies", "/data/movies").await;
    fixture
        .instance(1)
        .set_create_error(InstanceError::CategoryConflict("movies".to_string()))
        .await;

    let response = fixture.post_empty("/api/v1/categories/sync").await;
    assert_status!(response, StatusCode::CONFLICT);
    assert!(response.body["error"].as_str().unwrap().contains("movies"));
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_routes_to_instance_with_category() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    fixture.instance(1).add_category("movies", "/data/movies").await;

    let response = fixture
        .post_multipart(
            "/api/v1/torrents/upload",
            &[
                Part::Text("category", "movies"),
                Part::File("torrents", "a.torrent", b"d8:announce0:e"),
                Part::File("torrents", "b.torrent", b"d8:announce0:e"),
            ],
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["instance"], QB2);
    assert_eq!(response.body["files"], 2);

    let uploads = fixture.instance(1).uploads().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].filenames, vec!["a.torrent", "b.torrent"]);
    assert_eq!(uploads[0].category, "movies");
    assert!(fixture.instance(0).uploads().await.is_empty());
}

#[tokio::test]
async fn test_upload_unknown_category() {
    let fixture = TestFixture::new(&[QB1, QB2]).await;
    fixture.instance(0).add_category("movies", "/data/movies").await;

    let response = fixture
        .post_multipart(
            "/api/v1/torrents/upload",
            &[
                Part::Text("category", "books"),
                Part::File("torrents", "a.torrent", b"d8:announce0:e"),
            ],
        )
        .await;

    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(fixture.instance(0).uploads().await.is_empty());
    assert!(fixture.instance(1).uploads().await.is_empty());
}

#[tokio::test]
async fn test_upload_unsupported_file() {
    let fixture = TestFixture::new(&[QB1]).await;
    fixture.instance(0).add_category("movies", "/data/movies").await;
    fixture
        .instance(0)
        .set_upload_error(InstanceError::UnsupportedFile("a.torrent".to_string()))
        .await;

    let response = fixture
        .post_multipart(
            "/api/v1/torrents/upload",
            &[
                Part::Text("category", "movies"),
                Part::File("torrents", "a.torrent", b"not a torrent"),
            ],
        )
        .await;

    assert_status!(response, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_upload_requires_category_and_files() {
    let fixture = TestFixture::new(&[QB1]).await;
    fixture.instance(0).add_category("movies", "/data/movies").await;

    let response = fixture
        .post_multipart(
            "/api/v1/torrents/upload",
            &[Part::File("torrents", "a.torrent", b"d8:announce0:e")],
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .post_multipart(
            "/api/v1/torrents/upload",
            &[Part::Text("category", "movies")],
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}
