use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use super::{ValidJson, release_media};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    gate::{require_owner_or_role, require_role},
    models::{CascadeReport, CreatePostRequest, Post, UpdatePostRequest},
    roles::Role,
};

/// Rejects references to media that do not exist or belong to someone other
/// than the post's author.
async fn check_media_refs(
    state: &AppState,
    author_id: Uuid,
    ids: impl IntoIterator<Item = Uuid>,
) -> ApiResult<()> {
    for id in ids {
        match state.repo.get_media(id).await? {
            Some(m) if m.user_id == author_id => {}
            _ => {
                return Err(ApiError::validation(format!(
                    "media {id} does not exist or is not owned by the author"
                )));
            }
        }
    }
    Ok(())
}

/// list_posts
///
/// [Authenticated Route] Lists every post, newest first.
#[utoipa::path(
    get,
    path = "/api/posts",
    responses((status = 200, description = "All posts", body = [Post]))
)]
pub async fn list_posts(_user: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(state.repo.list_posts().await?))
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Post>> {
    state
        .repo
        .get_post(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

/// create_post
///
/// [Authenticated Route] Publishes or drafts a post. Requires the `author` role
/// or higher; the author is always the caller.
#[utoipa::path(
    post,
    path = "/api/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 403, description = "Role below author")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    require_role(Some(user.claims()), Role::Author)?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    check_media_refs(
        &state,
        user.id(),
        payload
            .featured_image_id
            .into_iter()
            .chain(payload.gallery_ids.iter().copied()),
    )
    .await?;

    let post = state
        .repo
        .create_post(Post {
            id: Uuid::new_v4(),
            title: payload.title.trim().to_string(),
            content: payload.content,
            author_id: user.id(),
            featured_image_id: payload.featured_image_id,
            gallery_ids: payload.gallery_ids,
            status: payload.status.as_str().to_string(),
            tags: payload.tags,
            ..Post::default()
        })
        .await?;

    tracing::info!(post_id = %post.id, author = %post.author_id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Partial update, allowed to the author or an admin.
///
/// When the featured image is replaced, the superseded media is deleted after
/// the post is saved unless another post or a profile still uses it. That
/// cleanup is best-effort and never undoes the update.
#[utoipa::path(
    put,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Neither owner nor admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let mut post = state
        .repo
        .get_post(id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    require_owner_or_role(Some(user.claims()), post.author_id, Role::Admin)?;

    let new_refs: Vec<Uuid> = payload
        .featured_image_id
        .into_iter()
        .chain(payload.gallery_ids.iter().flatten().copied())
        .collect();
    check_media_refs(&state, post.author_id, new_refs).await?;

    let superseded = match payload.featured_image_id {
        Some(new) if post.featured_image_id != Some(new) => post.featured_image_id,
        _ => None,
    };

    if let Some(title) = payload.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title must not be empty"));
        }
        post.title = title.trim().to_string();
    }
    if let Some(content) = payload.content {
        post.content = content;
    }
    if let Some(featured) = payload.featured_image_id {
        post.featured_image_id = Some(featured);
    }
    if let Some(gallery) = payload.gallery_ids {
        post.gallery_ids = gallery;
    }
    if let Some(status) = payload.status {
        post.status = status.as_str().to_string();
    }
    if let Some(tags) = payload.tags {
        post.tags = tags;
    }

    let post = state
        .repo
        .update_post(post)
        .await?
        .ok_or(ApiError::NotFound("post"))?;

    if let Some(old) = superseded {
        if let Err(e) = release_media(&state, old).await {
            tracing::warn!(post_id = %post.id, error = %e, "failed to delete superseded featured image");
        }
    }

    Ok(Json(post))
}

/// delete_post
///
/// [Authenticated Route] Admin only. Deletes the post, then its featured image
/// and gallery media, skipping any that another post or a profile still uses.
/// Media that cannot be removed are listed in the report; the post deletion
/// stands regardless.
#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = CascadeReport),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CascadeReport>> {
    require_role(Some(user.claims()), Role::Admin)?;

    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    if !state.repo.delete_post(post.id).await? {
        return Err(ApiError::NotFound("post"));
    }

    let mut report = CascadeReport::default();
    for media_id in post.featured_image_id.into_iter().chain(post.gallery_ids) {
        match release_media(&state, media_id).await {
            Ok(true) => report.deleted_media += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(post_id = %post.id, error = %e, "cascade delete failed");
                report.errors.push(e);
            }
        }
    }

    tracing::info!(
        post_id = %post.id,
        deleted_media = report.deleted_media,
        failures = report.errors.len(),
        "post deleted"
    );
    Ok(Json(report))
}
