//! Session protocol and download gate handlers.
//!
//! Status codes matter to the client: 404 unknown link, 403 not yet
//! released (body carries the release instant), 410 expired or limit
//! reached, 401 password required or incorrect.

use super::{error_response, json_response, AppState};
use crate::api::{
    parts_are_ordered, plan_part_count, CompleteUploadRequest, CompleteUploadResponse,
    DownloadResponse, ErrorBody, FileInfoResponse, InitUploadRequest, InitUploadResponse, PartUrl,
    PasswordBody, PreviewResponse, RefreshUrlsRequest, RefreshUrlsResponse, ReplaceRequest,
    VerifyResponse,
};
use crate::blob::Disposition;
use crate::gate::{self, GateDecision, PasswordDecision};
use crate::store::FileLink;
use chrono::{Duration, Utc};
use hyper::{Response, StatusCode};
use std::time::Duration as StdDuration;
use tracing::warn;

/// `POST /api/upload/init`
///
/// Allocates the public link id and internal storage key, presigns either
/// a single PUT or the full set of part URLs, and persists the record.
pub async fn init_upload(state: &AppState, request: InitUploadRequest) -> Response<String> {
    if request.file_size == 0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "File size must be greater than zero",
        );
    }

    let link_id = uuid::Uuid::new_v4().to_string();
    let storage_key = uuid::Uuid::new_v4().to_string();

    let expires_at = if request.expiry_ms > 0 {
        Some(Utc::now() + Duration::milliseconds(request.expiry_ms))
    } else {
        None
    };

    // A negative expiry is the self-destruct sentinel and wins over
    // whatever the flag says.
    let max_downloads = if request.expiry_ms < 0 || request.self_destruct {
        Some(1)
    } else {
        None
    };

    let password_hash = request.password.as_deref().map(gate::hash_password);

    let upload = match presign_upload(state, &storage_key, &request.mime_type, request.file_size)
        .await
    {
        Ok(upload) => upload,
        Err(e) => {
            warn!(error = %e, "Presigning failed during init");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to initialize upload",
            );
        }
    };

    let link = FileLink {
        link_id: link_id.clone(),
        storage_key: storage_key.clone(),
        original_name: request.file_name,
        mime_type: request.mime_type,
        size_bytes: request.file_size,
        created_at: Utc::now(),
        expires_at,
        release_date: request.release_date,
        password_hash,
        download_count: 0,
        max_downloads,
        upload_id: upload.upload_id.clone(),
    };

    if let Err(e) = state.store.save(link).await {
        warn!(error = %e, "Failed to persist link record");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to initialize upload",
        );
    }

    json_response(
        StatusCode::OK,
        &InitUploadResponse {
            file_id: link_id,
            storage_key,
            multipart: upload.multipart,
            upload_url: upload.upload_url,
            upload_id: upload.upload_id,
            part_urls: upload.part_urls,
            chunk_size: upload.chunk_size,
        },
    )
}

/// `POST /api/upload/refresh-urls`
///
/// Re-signs exactly the requested part numbers against the same storage
/// transaction. Mutates nothing.
pub async fn refresh_urls(state: &AppState, request: RefreshUrlsRequest) -> Response<String> {
    let link = match state.store.find(&request.file_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "File link not found"),
        Err(e) => {
            warn!(error = %e, "Store lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    let ttl = StdDuration::from_secs(state.config.upload.part_url_ttl_secs);
    let mut part_urls = Vec::with_capacity(request.part_numbers.len());
    for part_number in &request.part_numbers {
        match state
            .blob
            .issue_part_put_url(&link.storage_key, &request.upload_id, *part_number, ttl)
            .await
        {
            Ok(url) => part_urls.push(PartUrl {
                part_number: *part_number,
                url,
            }),
            Err(e) => {
                warn!(error = %e, part_number, "Part URL refresh failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to refresh upload URLs",
                );
            }
        }
    }

    json_response(StatusCode::OK, &RefreshUrlsResponse { part_urls })
}

/// `POST /api/upload/complete`
///
/// For multipart sessions, finalizes the storage transaction first; a
/// storage rejection fails the whole call so there is no partial commit.
pub async fn complete_upload(state: &AppState, request: CompleteUploadRequest) -> Response<String> {
    let link = match state.store.find(&request.file_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "File link not found"),
        Err(e) => {
            warn!(error = %e, "Store lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    let upload_id = request.upload_id.or_else(|| link.upload_id.clone());
    if let (Some(upload_id), Some(parts)) = (upload_id, request.parts) {
        if parts.is_empty() || !parts_are_ordered(&parts) {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Parts must be ascending and unique",
            );
        }

        if let Err(e) = state
            .blob
            .complete_multipart(&link.storage_key, &upload_id, &parts)
            .await
        {
            warn!(error = %e, file_id = %link.link_id, "Multipart completion failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to complete upload",
            );
        }
    }

    let share_link = format!("{}/d/{}", state.config.server.public_url, link.link_id);

    json_response(
        StatusCode::OK,
        &CompleteUploadResponse {
            success: true,
            file_id: link.link_id,
            share_link,
            file_name: link.original_name,
        },
    )
}

/// `POST /api/replace/:fileId`
///
/// Swaps the content behind an existing link: best-effort delete of the
/// old blob, a brand-new storage key, download counter reset to zero. The
/// public link never changes.
pub async fn replace_content(
    state: &AppState,
    file_id: &str,
    request: ReplaceRequest,
) -> Response<String> {
    if request.file_size == 0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "File size must be greater than zero",
        );
    }

    let mut link = match state.store.find(file_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Link not found"),
        Err(e) => {
            warn!(error = %e, "Store lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    // Best-effort: a failed delete must not block the replacement.
    if let Err(e) = state.blob.delete_object(&link.storage_key).await {
        warn!(error = %e, storage_key = %link.storage_key, "Old blob cleanup failed");
    }

    let new_storage_key = uuid::Uuid::new_v4().to_string();

    let upload = match presign_upload(state, &new_storage_key, &request.mime_type, request.file_size)
        .await
    {
        Ok(upload) => upload,
        Err(e) => {
            warn!(error = %e, "Presigning failed during replace");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to replace file");
        }
    };

    link.storage_key = new_storage_key.clone();
    link.original_name = request.file_name;
    link.size_bytes = request.file_size;
    link.mime_type = request.mime_type;
    link.download_count = 0;
    link.upload_id = upload.upload_id.clone();
    let link_id = link.link_id.clone();

    if let Err(e) = state.store.save(link).await {
        warn!(error = %e, "Failed to persist replaced link");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to replace file");
    }

    json_response(
        StatusCode::OK,
        &InitUploadResponse {
            file_id: link_id,
            storage_key: new_storage_key,
            multipart: upload.multipart,
            upload_url: upload.upload_url,
            upload_id: upload.upload_id,
            part_urls: upload.part_urls,
            chunk_size: upload.chunk_size,
        },
    )
}

/// `GET /api/files/:fileId`
///
/// Metadata only; no password needed to see that a file exists and is
/// protected.
pub async fn file_info(state: &AppState, file_id: &str) -> Response<String> {
    let link = match state.store.find(file_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "File not found"),
        Err(e) => {
            warn!(error = %e, "Store lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    if let Some(response) = apply_gate(state, &link).await {
        return response;
    }

    json_response(
        StatusCode::OK,
        &FileInfoResponse {
            file_name: link.original_name,
            file_size: link.size_bytes,
            mime_type: link.mime_type,
            expires_at: link.expires_at,
            self_destruct: link.max_downloads.is_some(),
            password_protected: link.password_hash.is_some(),
        },
    )
}

/// `POST /api/files/preview/:fileId`
///
/// Mints a short-lived inline GET URL without touching the download
/// counter.
pub async fn preview(state: &AppState, file_id: &str, body: PasswordBody) -> Response<String> {
    let link = match state.store.find(file_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "File not found"),
        Err(e) => {
            warn!(error = %e, "Store lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    if let Some(response) = apply_gate(state, &link).await {
        return response;
    }
    if let Some(response) = apply_password(&link, body.password.as_deref()) {
        return response;
    }

    let ttl = StdDuration::from_secs(state.config.upload.preview_url_ttl_secs);
    match state
        .blob
        .issue_get_url(&link.storage_key, &link.original_name, ttl, Disposition::Inline)
        .await
    {
        Ok(preview_url) => json_response(
            StatusCode::OK,
            &PreviewResponse {
                preview_url,
                file_name: link.original_name,
                mime_type: link.mime_type,
            },
        ),
        Err(e) => {
            warn!(error = %e, "Preview URL presigning failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate preview",
            )
        }
    }
}

/// `POST /api/files/verify/:fileId`
pub async fn verify_password(
    state: &AppState,
    file_id: &str,
    body: PasswordBody,
) -> Response<String> {
    let link = match state.store.find(file_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "File not found"),
        Err(e) => {
            warn!(error = %e, "Store lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    let Some(ref stored) = link.password_hash else {
        return json_response(StatusCode::OK, &VerifyResponse { valid: true });
    };

    if gate::verify_password(body.password.as_deref().unwrap_or(""), stored) {
        json_response(StatusCode::OK, &VerifyResponse { valid: true })
    } else {
        error_response(StatusCode::UNAUTHORIZED, "Invalid password")
    }
}

/// `POST /api/files/download/:fileId`
///
/// The only handler that consumes a download: the counter increment is
/// atomic with the limit check, so a self-destruct link grants exactly
/// one download under concurrent requests.
pub async fn download(state: &AppState, file_id: &str, body: PasswordBody) -> Response<String> {
    let link = match state.store.find(file_id).await {
        Ok(Some(link)) => link,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "File not found"),
        Err(e) => {
            warn!(error = %e, "Store lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    if let Some(response) = apply_gate(state, &link).await {
        return response;
    }
    if let Some(response) = apply_password(&link, body.password.as_deref()) {
        return response;
    }

    let link = match state.store.try_increment_download(&link.link_id).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            // Lost the race for the last remaining download.
            cleanup_invalid(state, &link).await;
            return error_response(StatusCode::GONE, "File limit reached");
        }
        Err(crate::store::StoreError::NotFound(_)) => {
            return error_response(StatusCode::NOT_FOUND, "File not found");
        }
        Err(e) => {
            warn!(error = %e, "Download counter update failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Download failed");
        }
    };

    let ttl = StdDuration::from_secs(state.config.upload.download_url_ttl_secs);
    match state
        .blob
        .issue_get_url(
            &link.storage_key,
            &link.original_name,
            ttl,
            Disposition::Attachment,
        )
        .await
    {
        Ok(download_url) => json_response(
            StatusCode::OK,
            &DownloadResponse {
                download_url,
                file_name: link.original_name,
            },
        ),
        Err(e) => {
            warn!(error = %e, "Download URL presigning failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Download failed")
        }
    }
}

/// Presigned upload coordinates for one storage key.
struct PresignedUpload {
    multipart: bool,
    upload_url: Option<String>,
    upload_id: Option<String>,
    part_urls: Option<Vec<PartUrl>>,
    chunk_size: Option<u64>,
}

/// Decide single-shot vs multipart for `file_size` and presign accordingly.
async fn presign_upload(
    state: &AppState,
    storage_key: &str,
    mime_type: &str,
    file_size: u64,
) -> Result<PresignedUpload, crate::blob::BlobError> {
    let upload_config = &state.config.upload;
    let ttl = StdDuration::from_secs(upload_config.part_url_ttl_secs);

    if file_size <= upload_config.multipart_threshold {
        let upload_url = state.blob.issue_put_url(storage_key, mime_type, ttl).await?;
        return Ok(PresignedUpload {
            multipart: false,
            upload_url: Some(upload_url),
            upload_id: None,
            part_urls: None,
            chunk_size: None,
        });
    }

    let upload_id = state.blob.begin_multipart(storage_key, mime_type).await?;
    let total_parts = plan_part_count(file_size, upload_config.part_size);

    let mut part_urls = Vec::with_capacity(total_parts as usize);
    for part_number in 1..=total_parts {
        let url = state
            .blob
            .issue_part_put_url(storage_key, &upload_id, part_number, ttl)
            .await?;
        part_urls.push(PartUrl { part_number, url });
    }

    Ok(PresignedUpload {
        multipart: true,
        upload_url: None,
        upload_id: Some(upload_id),
        part_urls: Some(part_urls),
        chunk_size: Some(upload_config.part_size),
    })
}

/// Run the release/expiry/limit pipeline; `Some` is the terminal response.
async fn apply_gate(state: &AppState, link: &FileLink) -> Option<Response<String>> {
    match gate::evaluate(link, Utc::now()) {
        GateDecision::Allow => None,
        GateDecision::NotYetReleased(release_date) => Some(json_response(
            StatusCode::FORBIDDEN,
            &ErrorBody {
                error: "File not yet released".into(),
                release_date: Some(release_date),
            },
        )),
        GateDecision::Expired => {
            cleanup_invalid(state, link).await;
            Some(error_response(StatusCode::GONE, "File has expired"))
        }
        GateDecision::LimitReached => {
            cleanup_invalid(state, link).await;
            Some(error_response(StatusCode::GONE, "File limit reached"))
        }
    }
}

fn apply_password(link: &FileLink, supplied: Option<&str>) -> Option<Response<String>> {
    match gate::check_password(link, supplied) {
        PasswordDecision::Allow => None,
        PasswordDecision::Required => {
            Some(error_response(StatusCode::UNAUTHORIZED, "Password required"))
        }
        PasswordDecision::Invalid => {
            Some(error_response(StatusCode::UNAUTHORIZED, "Invalid password"))
        }
    }
}

/// Eagerly delete an invalid session's blob and record. Best-effort: both
/// failures are logged and swallowed.
async fn cleanup_invalid(state: &AppState, link: &FileLink) {
    if let Err(e) = state.blob.delete_object(&link.storage_key).await {
        warn!(error = %e, storage_key = %link.storage_key, "Blob cleanup failed");
    }
    if let Err(e) = state.store.delete(&link.link_id).await {
        warn!(error = %e, link_id = %link.link_id, "Record cleanup failed");
    }
}
