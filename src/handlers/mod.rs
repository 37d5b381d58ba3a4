use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    media::{DeleteReport, StoredMedia, Upload},
    models::{Media, MediaMetadata, Thumbnail},
};

pub mod accounts;
pub mod media;
pub mod posts;
pub mod profiles;
pub mod users;

/// ValidJson
///
/// `Json` with its rejection folded into `ApiError`, so a malformed or
/// mistyped body is a 400 with the usual `{"error"}` shape.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}

/// MultipartForm
///
/// A fully buffered multipart body: text fields by name, plus the parts named
/// in `file_fields` as uploads. A file part with neither a name nor content is
/// treated as absent.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart, file_fields: &[&str]) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if file_fields.contains(&name.as_str()) {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(e.body_text()))?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.insert(name, Upload::new(file_name, bytes));
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(e.body_text()))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// A trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    pub fn required(&self, name: &str) -> ApiResult<String> {
        self.text(name)
            .ok_or_else(|| ApiError::validation(format!("{name} is required")))
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

/// Splits a comma-separated tag list, dropping blanks.
pub fn parse_tags(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

/// record_media
///
/// Second half of an upload: turns stored files into a `Media` row. If the row
/// cannot be written the files are removed again, so no orphan stays on disk.
pub async fn record_media(
    state: &AppState,
    owner_id: Uuid,
    stored: StoredMedia,
    mut metadata: MediaMetadata,
) -> ApiResult<Media> {
    let media = &state.media;
    if let Some((width, height)) = stored.derived.dimensions {
        metadata.width = Some(width);
        metadata.height = Some(height);
    }

    let record = Media {
        id: Uuid::new_v4(),
        user_id: owner_id,
        file_name: stored.primary.file_name.clone(),
        file_type: stored.primary.extension.clone(),
        mime_type: stored.primary.mime_type.clone(),
        size: stored.primary.size as i64,
        path: stored.primary.path.clone(),
        url: media.public_url(&stored.primary.path),
        thumbnails: stored
            .derived
            .thumbnails
            .iter()
            .map(|t| Thumbnail {
                size: t.label.clone(),
                width: t.width,
                height: t.height,
                path: t.path.clone(),
                url: media.public_url(&t.path),
            })
            .collect(),
        metadata,
        ..Media::default()
    };

    match state.repo.create_media(record).await {
        Ok(created) => Ok(created),
        Err(e) => {
            discard_files(state, &stored.primary.path).await;
            Err(e.into())
        }
    }
}

/// Best-effort removal of stored files whose record was never written.
pub async fn discard_files(state: &AppState, primary_path: &str) {
    if let Err(e) = state.media.delete(primary_path).await {
        tracing::warn!(path = %primary_path, error = %e, "failed to discard stored media");
    }
}

/// remove_media
///
/// Deletes the files of a media record, then the record. When the primary file
/// cannot be removed the record is kept and the error returned; leftover
/// thumbnails are only reported.
pub async fn remove_media(state: &AppState, media: &Media) -> ApiResult<DeleteReport> {
    let report = state.media.delete(&media.path).await?;
    for error in &report.errors {
        tracing::warn!(media_id = %media.id, "{error}");
    }
    state.repo.delete_media(media.id, media.user_id).await?;
    Ok(report)
}

/// release_media
///
/// Cascade step for media a post or profile stopped pointing at. Media still
/// referenced elsewhere is left alone, so one upload can back several posts and
/// a profile at once. `Ok(false)` when nothing was removed.
pub async fn release_media(state: &AppState, id: Uuid) -> Result<bool, String> {
    let in_use = state
        .repo
        .media_in_use(id)
        .await
        .map_err(|e| format!("media {id}: {e}"))?;
    if in_use {
        tracing::debug!(media_id = %id, "media still referenced, kept");
        return Ok(false);
    }
    let media = state
        .repo
        .get_media(id)
        .await
        .map_err(|e| format!("media {id}: {e}"))?;
    match media {
        Some(media) => remove_media(state, &media)
            .await
            .map(|_| true)
            .map_err(|e| format!("media {id}: {e}")),
        None => Ok(false),
    }
}

/// Rolls back media recorded earlier in a request that failed later on.
pub async fn discard_media(state: &AppState, media: &[Media]) {
    for m in media {
        if let Err(e) = remove_media(state, m).await {
            tracing::warn!(media_id = %m.id, error = %e, "failed to discard media");
        }
    }
}
