use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{MultipartForm, ValidJson, parse_tags, record_media, remove_media};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{Media, MediaMetadata, UpdateMediaRequest},
};

/// MediaUploadForm
///
/// Multipart body of `POST /api/media` (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct MediaUploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    title: Option<String>,
    description: Option<String>,
    alt_text: Option<String>,
    /// Comma-separated.
    tags: Option<String>,
}

/// upload_media
///
/// [Authenticated Route] Stores an image for the caller.
///
/// The content type is sniffed from the bytes; the client's filename and
/// declared type are ignored. The record is created once the original is on
/// disk, and lists whichever thumbnails could be produced.
#[utoipa::path(
    post,
    path = "/api/media",
    request_body(content = MediaUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Uploaded", body = Media),
        (status = 400, description = "Missing file, too large, or not an allowed image")
    )
)]
pub async fn upload_media(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Media>)> {
    let mut form = MultipartForm::read(multipart, &["file"]).await?;
    let upload = form
        .take_file("file")
        .ok_or_else(|| ApiError::validation("file is required"))?;
    let upload = state.media.validate(upload)?;

    let metadata = MediaMetadata {
        title: form.text("title"),
        description: form.text("description"),
        alt_text: form.text("alt_text"),
        tags: parse_tags(form.text("tags")),
        ..MediaMetadata::default()
    };

    let stored = state.media.store(upload, user.id()).await?;
    let media = record_media(&state, user.id(), stored, metadata).await?;

    Ok((StatusCode::CREATED, Json(media)))
}

/// list_my_media
///
/// [Authenticated Route] The caller's uploads, newest first.
#[utoipa::path(
    get,
    path = "/api/media",
    responses((status = 200, description = "My media", body = [Media]))
)]
pub async fn list_my_media(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Media>>> {
    Ok(Json(state.repo.list_media_by_user(user.id()).await?))
}

#[utoipa::path(
    get,
    path = "/api/media/{id}",
    params(("id" = Uuid, Path, description = "Media ID")),
    responses(
        (status = 200, description = "Found", body = Media),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_media(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Media>> {
    state
        .repo
        .get_media(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("media"))
}

/// update_media
///
/// [Authenticated Route] Replaces the descriptive metadata of the caller's
/// media. Pixel dimensions are kept. Someone else's media answers 404.
#[utoipa::path(
    put,
    path = "/api/media/{id}",
    params(("id" = Uuid, Path, description = "Media ID")),
    request_body = UpdateMediaRequest,
    responses(
        (status = 200, description = "Updated", body = Media),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn update_media(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateMediaRequest>,
) -> ApiResult<Json<Media>> {
    let existing = state
        .repo
        .get_media(id)
        .await?
        .filter(|m| m.user_id == user.id())
        .ok_or(ApiError::NotFound("media"))?;

    let metadata = MediaMetadata {
        width: existing.metadata.width,
        height: existing.metadata.height,
        title: payload.title,
        description: payload.description,
        alt_text: payload.alt_text,
        tags: payload.tags,
    };

    state
        .repo
        .update_media_metadata(id, user.id(), metadata)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("media"))
}

/// delete_media
///
/// [Authenticated Route] Removes the caller's media: original, thumbnails, then
/// the record. If the original cannot be deleted the record is kept and 500 is
/// returned, so the record never points at a half-deleted set of files.
#[utoipa::path(
    delete,
    path = "/api/media/{id}",
    params(("id" = Uuid, Path, description = "Media ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn delete_media(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let media = state
        .repo
        .get_media(id)
        .await?
        .filter(|m| m.user_id == user.id())
        .ok_or(ApiError::NotFound("media"))?;

    remove_media(&state, &media).await?;
    Ok(StatusCode::NO_CONTENT)
}
