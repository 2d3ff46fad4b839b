//! Multipart file upload endpoint.
//!
//! DESIGN
//! ======
//! `POST /upload` accepts a multipart form, stores the first file part under
//! the upload directory, and answers with the public URL plus the message
//! kind inferred from the part's MIME type. Files are streamed chunk by
//! chunk so a large upload never sits in memory; the size cap is enforced
//! while streaming and an oversized or broken transfer is deleted again.
//!
//! Stored names are `{unix_ms}-{uuid}.{ext}` with the extension derived
//! from the MIME type, so client-supplied filenames never touch the
//! filesystem.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use crate::event::now_ms;
use crate::services::chat::MessageKind;
use crate::state::AppState;
use crate::urls::{absolutize, base_url};

/// Hard cap on a single stored file.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

type UploadReject = (StatusCode, Json<serde_json::Value>);

// =============================================================================
// HANDLER
// =============================================================================

/// Store the first file part of a multipart form and return its public URL.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadReject> {
    let base = base_url(state.config.public_base_url.as_deref(), &headers);

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.file_name().is_none() {
            continue;
        }
        let mime = field.content_type().unwrap_or("application/octet-stream").to_string();
        let name = format!("{}-{}.{}", now_ms(), Uuid::new_v4(), extension_for(&mime));
        let size = store_field(&state.config.upload_dir.join(&name), field).await?;
        info!(%name, size, mime = %mime, "upload: stored file");
        return Ok(Json(UploadResponse {
            url: absolutize(&format!("/uploads/{name}"), &base),
            kind: MessageKind::from_mime(&mime),
        }));
    }

    Err(reject("no file"))
}

// =============================================================================
// STORAGE
// =============================================================================

/// Stream one multipart field to disk, enforcing the size cap as bytes
/// arrive. Partial files are removed on any failure.
async fn store_field(path: &std::path::Path, mut field: Field<'_>) -> Result<usize, UploadReject> {
    let mut file = fs::File::create(path).await.map_err(storage_error)?;
    let mut written = 0usize;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(path).await;
                return Err(multipart_error(err));
            }
        };
        written += chunk.len();
        if written > MAX_UPLOAD_BYTES {
            drop(file);
            let _ = fs::remove_file(path).await;
            return Err(reject("file too large"));
        }
        if let Err(err) = file.write_all(&chunk).await {
            drop(file);
            let _ = fs::remove_file(path).await;
            return Err(storage_error(err));
        }
    }
    if let Err(err) = file.flush().await {
        drop(file);
        let _ = fs::remove_file(path).await;
        return Err(storage_error(err));
    }
    Ok(written)
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/mpeg" => "mp3",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    }
}

fn reject(message: &str) -> UploadReject {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message })))
}

fn multipart_error(err: MultipartError) -> UploadReject {
    error!(%err, "upload: malformed multipart body");
    reject("upload failed")
}

fn storage_error(err: std::io::Error) -> UploadReject {
    error!(%err, "upload: storage failure");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": "upload failed" })))
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
