//! Session protocol handler tests against an in-memory store and a fake
//! blob store.

mod common;

use chrono::{Duration, Utc};
use common::{base_link, test_config, FakeBlobStore};
use hyper::StatusCode;
use quickdrop::api::{
    CompleteUploadRequest, CompleteUploadResponse, ErrorBody, FileInfoResponse,
    InitUploadRequest, InitUploadResponse, PartRef, PasswordBody, PreviewResponse,
    RefreshUrlsRequest, RefreshUrlsResponse, ReplaceRequest,
};
use quickdrop::gate::hash_password;
use quickdrop::server::{handlers, AppState};
use quickdrop::store::{MemoryStore, SessionStore};
use std::sync::Arc;

struct TestEnv {
    state: AppState,
    store: Arc<MemoryStore>,
    blob: Arc<FakeBlobStore>,
}

fn env_with(multipart_threshold: u64, part_size: u64) -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let blob = Arc::new(FakeBlobStore::new());
    let state = AppState {
        config: test_config(multipart_threshold, part_size),
        store: store.clone(),
        blob: blob.clone(),
    };
    TestEnv { state, store, blob }
}

fn init_request(file_size: u64) -> InitUploadRequest {
    InitUploadRequest {
        file_name: "video.mp4".into(),
        file_size,
        mime_type: "video/mp4".into(),
        expiry_ms: 0,
        self_destruct: false,
        password: None,
        release_date: None,
    }
}

fn body_as<T: serde::de::DeserializeOwned>(response: &hyper::Response<String>) -> T {
    serde_json::from_str(response.body()).expect("response body should parse")
}

#[tokio::test]
async fn init_small_file_is_single_shot() {
    let env = env_with(100, 25);

    let response = handlers::init_upload(&env.state, init_request(80)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: InitUploadResponse = body_as(&response);
    assert!(!body.multipart);
    assert!(body.upload_url.is_some());
    assert!(body.part_urls.is_none());

    let saved = env.store.find(&body.file_id).await.unwrap().unwrap();
    assert_eq!(saved.storage_key, body.storage_key);
    assert_eq!(saved.download_count, 0);
    assert!(saved.max_downloads.is_none());
}

#[tokio::test]
async fn init_large_file_presigns_every_part() {
    let env = env_with(100, 25);

    let response = handlers::init_upload(&env.state, init_request(250)).await;
    let body: InitUploadResponse = body_as(&response);

    assert!(body.multipart);
    assert_eq!(body.chunk_size, Some(25));
    let part_urls = body.part_urls.unwrap();
    assert_eq!(part_urls.len(), 10);
    assert_eq!(part_urls[0].part_number, 1);
    assert_eq!(part_urls[9].part_number, 10);

    let saved = env.store.find(&body.file_id).await.unwrap().unwrap();
    assert_eq!(saved.upload_id, body.upload_id);
}

#[tokio::test]
async fn init_rejects_zero_size() {
    let env = env_with(100, 25);
    let response = handlers::init_upload(&env.state, init_request(0)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn negative_expiry_forces_self_destruct() {
    let env = env_with(100, 25);

    // The sentinel wins regardless of the flag's literal value.
    let mut request = init_request(80);
    request.expiry_ms = -1;
    request.self_destruct = false;

    let response = handlers::init_upload(&env.state, request).await;
    let body: InitUploadResponse = body_as(&response);

    let saved = env.store.find(&body.file_id).await.unwrap().unwrap();
    assert_eq!(saved.max_downloads, Some(1));
    assert!(saved.expires_at.is_none());
}

#[tokio::test]
async fn init_hashes_password() {
    let env = env_with(100, 25);

    let mut request = init_request(80);
    request.password = Some("hunter2".into());

    let response = handlers::init_upload(&env.state, request).await;
    let body: InitUploadResponse = body_as(&response);

    let saved = env.store.find(&body.file_id).await.unwrap().unwrap();
    let hash = saved.password_hash.unwrap();
    assert!(!hash.contains("hunter2"));
}

#[tokio::test]
async fn refresh_resigns_exactly_requested_parts() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.upload_id = Some("txn-1".into());
    env.store.save(link).await.unwrap();

    let request = RefreshUrlsRequest {
        file_id: "lnk".into(),
        upload_id: "txn-1".into(),
        part_numbers: vec![5, 6, 7],
    };
    let response = handlers::refresh_urls(&env.state, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: RefreshUrlsResponse = body_as(&response);
    let numbers: Vec<u32> = body.part_urls.iter().map(|p| p.part_number).collect();
    assert_eq!(numbers, vec![5, 6, 7]);
}

#[tokio::test]
async fn refresh_unknown_session_is_404() {
    let env = env_with(100, 25);
    let request = RefreshUrlsRequest {
        file_id: "missing".into(),
        upload_id: "txn".into(),
        part_numbers: vec![1],
    };
    let response = handlers::refresh_urls(&env.state, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn complete_finalizes_storage_before_responding() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.upload_id = Some("txn-1".into());
    env.store.save(link).await.unwrap();

    let parts: Vec<PartRef> = (1..=3)
        .map(|n| PartRef {
            part_number: n,
            etag: format!("e{}", n),
        })
        .collect();
    let request = CompleteUploadRequest {
        file_id: "lnk".into(),
        upload_id: Some("txn-1".into()),
        parts: Some(parts),
    };

    let response = handlers::complete_upload(&env.state, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: CompleteUploadResponse = body_as(&response);
    assert!(body.share_link.ends_with("/d/lnk"));
    assert_eq!(env.blob.completed.lock().len(), 1);
}

#[tokio::test]
async fn complete_rejects_unordered_parts() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.upload_id = Some("txn-1".into());
    env.store.save(link).await.unwrap();

    let request = CompleteUploadRequest {
        file_id: "lnk".into(),
        upload_id: Some("txn-1".into()),
        parts: Some(vec![
            PartRef {
                part_number: 2,
                etag: "e2".into(),
            },
            PartRef {
                part_number: 1,
                etag: "e1".into(),
            },
        ]),
    };

    let response = handlers::complete_upload(&env.state, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(env.blob.completed.lock().is_empty());
}

#[tokio::test]
async fn replace_keeps_link_and_resets_counter() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.download_count = 7;
    let old_key = link.storage_key.clone();
    env.store.save(link).await.unwrap();

    let request = ReplaceRequest {
        file_name: "updated.pdf".into(),
        file_size: 50,
        mime_type: "application/pdf".into(),
    };
    let response = handlers::replace_content(&env.state, "lnk", request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: InitUploadResponse = body_as(&response);
    assert_eq!(body.file_id, "lnk");
    assert_ne!(body.storage_key, old_key);

    let saved = env.store.find("lnk").await.unwrap().unwrap();
    assert_eq!(saved.download_count, 0);
    assert_eq!(saved.original_name, "updated.pdf");
    // Old blob was deleted best-effort.
    let deleted = env.blob.deleted.lock();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0], old_key);
}

#[tokio::test]
async fn info_reports_metadata_without_password() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.password_hash = Some(hash_password("secret"));
    link.max_downloads = Some(1);
    env.store.save(link).await.unwrap();

    let response = handlers::file_info(&env.state, "lnk").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: FileInfoResponse = body_as(&response);
    assert!(body.password_protected);
    assert!(body.self_destruct);
    assert_eq!(body.file_name, "document.pdf");
}

#[tokio::test]
async fn unknown_link_is_404() {
    let env = env_with(100, 25);
    let response = handlers::file_info(&env.state, "nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreleased_link_is_403_with_release_date() {
    let env = env_with(100, 25);

    let release = Utc::now() + Duration::hours(2);
    let mut link = base_link("lnk");
    link.release_date = Some(release);
    env.store.save(link).await.unwrap();

    let response = handlers::file_info(&env.state, "lnk").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body: ErrorBody = body_as(&response);
    assert_eq!(body.release_date.unwrap().timestamp(), release.timestamp());
    // Not-yet-released never triggers cleanup.
    assert!(env.blob.deleted.lock().is_empty());
    assert!(env.store.find("lnk").await.unwrap().is_some());
}

#[tokio::test]
async fn released_but_expired_is_410_not_403() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.release_date = Some(Utc::now() - Duration::hours(2));
    link.expires_at = Some(Utc::now() - Duration::hours(1));
    let storage_key = link.storage_key.clone();
    env.store.save(link).await.unwrap();

    let response = handlers::file_info(&env.state, "lnk").await;
    assert_eq!(response.status(), StatusCode::GONE);

    // Eager cleanup: blob then record.
    let deleted = env.blob.deleted.lock();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0], storage_key);
    assert!(env.store.find("lnk").await.unwrap().is_none());
}

#[tokio::test]
async fn preview_requires_password_but_skips_counter() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.password_hash = Some(hash_password("secret"));
    env.store.save(link).await.unwrap();

    let missing = handlers::preview(&env.state, "lnk", PasswordBody::default()).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = handlers::preview(
        &env.state,
        "lnk",
        PasswordBody {
            password: Some("wrong".into()),
        },
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = handlers::preview(
        &env.state,
        "lnk",
        PasswordBody {
            password: Some("secret".into()),
        },
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let body: PreviewResponse = body_as(&ok);
    assert!(body.preview_url.contains("disposition=inline"));

    // Previewing never consumes a download.
    let saved = env.store.find("lnk").await.unwrap().unwrap();
    assert_eq!(saved.download_count, 0);
}

#[tokio::test]
async fn download_consumes_self_destruct_exactly_once() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.max_downloads = Some(1);
    env.store.save(link).await.unwrap();

    let first = handlers::download(&env.state, "lnk", PasswordBody::default()).await;
    assert_eq!(first.status(), StatusCode::OK);
    let saved = env.store.find("lnk").await.unwrap().unwrap();
    assert_eq!(saved.download_count, 1);

    // The limit is now exhausted: the gate fires and cleans up.
    let second = handlers::download(&env.state, "lnk", PasswordBody::default()).await;
    assert_eq!(second.status(), StatusCode::GONE);
    assert!(env.store.find("lnk").await.unwrap().is_none());
    assert!(!env.blob.deleted.lock().is_empty());
}

#[tokio::test]
async fn download_url_uses_attachment_disposition() {
    let env = env_with(100, 25);
    env.store.save(base_link("lnk")).await.unwrap();

    let response = handlers::download(&env.state, "lnk", PasswordBody::default()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: quickdrop::api::DownloadResponse = body_as(&response);
    assert!(body.download_url.contains("disposition=attachment"));
}

#[tokio::test]
async fn verify_accepts_unprotected_links() {
    let env = env_with(100, 25);
    env.store.save(base_link("lnk")).await.unwrap();

    let response = handlers::verify_password(&env.state, "lnk", PasswordBody::default()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn verify_checks_password() {
    let env = env_with(100, 25);

    let mut link = base_link("lnk");
    link.password_hash = Some(hash_password("secret"));
    env.store.save(link).await.unwrap();

    let wrong = handlers::verify_password(
        &env.state,
        "lnk",
        PasswordBody {
            password: Some("nope".into()),
        },
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let right = handlers::verify_password(
        &env.state,
        "lnk",
        PasswordBody {
            password: Some("secret".into()),
        },
    )
    .await;
    assert_eq!(right.status(), StatusCode::OK);
}
