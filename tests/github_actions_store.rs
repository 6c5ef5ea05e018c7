/// GitHub Actions cache store against a mock cache service
///
/// The store uses a blocking client, so every store call runs on the blocking
/// pool while the mock server runs on the async runtime.
use std::fs;
use std::path::PathBuf;

use serde_json::json;
use stowage::storage::archive;
use stowage::storage::GithubActionsStore;
use stowage::{CacheStore, SaveOutcome, StoreError};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCEPT: &str = "application/json;api-version=6.0-preview.1";

async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

fn store(uri: &str) -> GithubActionsStore {
    GithubActionsStore::new(format!("{}/", uri), "token".to_string())
}

fn populated_paths(temp: &TempDir) -> Vec<PathBuf> {
    let dir = temp.path().join("tools");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("dotnet-gitversion"), "tool binary").unwrap();
    vec![dir]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_content_is_a_miss() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_apis/artifactcache/cache"))
        .and(query_param("keys", "Linux-dotnet-tools,Linux-dotnet,Linux"))
        .and(header("authorization", "Bearer token"))
        .and(header("accept", ACCEPT))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let paths = vec![temp.path().join("tools")];
    let uri = server.uri();

    let matched = blocking(move || {
        store(&uri).restore(
            &paths,
            "Linux-dotnet-tools",
            &["Linux".to_string(), "Linux-dotnet".to_string()],
        )
    })
    .await
    .unwrap();

    assert!(matched.is_none());
    assert!(!temp.path().join("tools").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hit_downloads_and_returns_matched_key() {
    let temp = TempDir::new().unwrap();
    let paths = populated_paths(&temp);
    let (data, _) = archive::pack(&paths).unwrap();
    fs::remove_dir_all(&paths[0]).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_apis/artifactcache/cache"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cacheKey": "Linux-dotnet-tools-Other",
            "archiveLocation": format!("{}/archives/42", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/archives/42"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let restore_paths = paths.clone();
    let matched = blocking(move || {
        store(&uri).restore(&restore_paths, "Linux-dotnet-tools-GitVersion.Tool", &[])
    })
    .await
    .unwrap();

    assert_eq!(matched.as_deref(), Some("Linux-dotnet-tools-Other"));
    assert_eq!(
        fs::read_to_string(paths[0].join("dotnet-gitversion")).unwrap(),
        "tool binary"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lookup_server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_apis/artifactcache/cache"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let paths = vec![temp.path().join("tools")];
    let uri = server.uri();

    let result = blocking(move || store(&uri).restore(&paths, "k", &[])).await;

    match result {
        Err(StoreError::Http { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "backend down");
        }
        other => panic!("expected an HTTP error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reserve_conflict_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let paths = populated_paths(&temp);
    let uri = server.uri();

    let outcome = blocking(move || store(&uri).save(&paths, "Linux-dotnet-tools"))
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::AlreadyExists);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_save_uploads_contiguous_chunks_then_commits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "cacheId": 7 })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/_apis/artifactcache/caches/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_apis/artifactcache/caches/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let paths = populated_paths(&temp);
    let uri = server.uri();

    let outcome = blocking(move || store(&uri).with_chunk_size(16).save(&paths, "k"))
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Stored);

    let requests = server.received_requests().await.unwrap();

    let reserve = requests
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == "/_apis/artifactcache/caches")
        .unwrap();
    let reserved: serde_json::Value = reserve.body_json().unwrap();
    let declared_size = reserved["cacheSize"].as_u64().unwrap();

    let chunks: Vec<_> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .collect();
    assert!(chunks.len() > 1);

    let mut next_start = 0u64;
    for chunk in &chunks {
        let range = chunk
            .headers
            .get("content-range")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let bounds = range
            .strip_prefix("bytes ")
            .and_then(|r| r.strip_suffix("/*"))
            .unwrap();
        let (start, end) = bounds.split_once('-').unwrap();
        let (start, end): (u64, u64) = (start.parse().unwrap(), end.parse().unwrap());

        assert_eq!(start, next_start);
        assert!(end - start < 16);
        assert_eq!(chunk.body.len() as u64, end - start + 1);
        next_start = end + 1;
    }
    assert_eq!(next_start, declared_size);

    let commit = requests
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == "/_apis/artifactcache/caches/7")
        .unwrap();
    let committed: serde_json::Value = commit.body_json().unwrap();
    assert_eq!(committed, json!({ "size": declared_size }));
}
