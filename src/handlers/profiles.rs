use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{MultipartForm, discard_media, record_media, release_media};
use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    media::ValidatedUpload,
    models::{Media, MediaMetadata, Profile, SocialLinks},
};

/// ProfileForm
///
/// Multipart body of `PUT /api/profiles/me` (documentation only). Omitted
/// text fields keep their current value.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProfileForm {
    full_name: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    website: Option<String>,
    twitter: Option<String>,
    facebook: Option<String>,
    linkedin: Option<String>,
    github: Option<String>,
    instagram: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    avatar: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    cover_image: Option<Vec<u8>>,
}

async fn own_profile(state: &AppState, user_id: Uuid) -> ApiResult<Profile> {
    if let Some(profile) = state.repo.get_profile_by_user(user_id).await? {
        return Ok(profile);
    }
    let profile = state
        .repo
        .create_profile(Profile {
            id: Uuid::new_v4(),
            user_id,
            ..Profile::default()
        })
        .await?;
    tracing::debug!(user_id = %user_id, "created empty profile");
    Ok(profile)
}

async fn store_image(state: &AppState, user_id: Uuid, upload: ValidatedUpload) -> ApiResult<Media> {
    let stored = state.media.store(upload, user_id).await?;
    record_media(state, user_id, stored, MediaMetadata::default()).await
}

/// get_profile
///
/// [Public Route] Any user's profile by their user id.
#[utoipa::path(
    get,
    path = "/api/profiles/{user_id}",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = Profile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Profile>> {
    state
        .repo
        .get_profile_by_user(user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("profile"))
}

/// get_my_profile
///
/// [Authenticated Route] The caller's profile, created empty on first access.
#[utoipa::path(
    get,
    path = "/api/profiles/me",
    responses((status = 200, description = "My profile", body = Profile))
)]
pub async fn get_my_profile(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(own_profile(&state, user.id()).await?))
}

/// update_my_profile
///
/// [Authenticated Route] Updates text fields and optionally replaces the avatar
/// and cover image.
///
/// New images are validated before anything is stored. If a later step fails,
/// images stored by this request are discarded again. Replaced images are
/// deleted after the profile is saved, best-effort, unless a post uses them.
#[utoipa::path(
    put,
    path = "/api/profiles/me",
    request_body(content = ProfileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = Profile),
        (status = 400, description = "Invalid image")
    )
)]
pub async fn update_my_profile(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Profile>> {
    let mut form = MultipartForm::read(multipart, &["avatar", "cover_image"]).await?;

    let avatar = form
        .take_file("avatar")
        .map(|u| state.media.validate(u))
        .transpose()?;
    let cover = form
        .take_file("cover_image")
        .map(|u| state.media.validate(u))
        .transpose()?;

    let mut profile = own_profile(&state, user.id()).await?;
    let mut fresh: Vec<Media> = Vec::new();
    let mut superseded = Vec::new();

    if let Some(upload) = avatar {
        let media = store_image(&state, user.id(), upload).await?;
        superseded.extend(profile.avatar_id.replace(media.id));
        fresh.push(media);
    }
    if let Some(upload) = cover {
        let media = match store_image(&state, user.id(), upload).await {
            Ok(media) => media,
            Err(e) => {
                discard_media(&state, &fresh).await;
                return Err(e);
            }
        };
        superseded.extend(profile.cover_image_id.replace(media.id));
        fresh.push(media);
    }

    if let Some(full_name) = form.text("full_name") {
        profile.full_name = full_name;
    }
    for (name, slot) in [
        ("bio", &mut profile.bio),
        ("location", &mut profile.location),
        ("website", &mut profile.website),
    ] {
        if let Some(value) = form.text(name) {
            *slot = Some(value);
        }
    }
    let SocialLinks {
        twitter,
        facebook,
        linkedin,
        github,
        instagram,
    } = &mut profile.social_links;
    for (name, slot) in [
        ("twitter", twitter),
        ("facebook", facebook),
        ("linkedin", linkedin),
        ("github", github),
        ("instagram", instagram),
    ] {
        if let Some(value) = form.text(name) {
            *slot = Some(value);
        }
    }

    let profile = match state.repo.update_profile(profile).await {
        Ok(Some(profile)) => profile,
        outcome => {
            discard_media(&state, &fresh).await;
            return Err(outcome.err().map_or(ApiError::NotFound("profile"), ApiError::from));
        }
    };

    for old in superseded {
        if let Err(e) = release_media(&state, old).await {
            tracing::warn!(user_id = %user.id(), error = %e, "failed to delete superseded profile image");
        }
    }

    Ok(Json(profile))
}

/// delete_my_profile
///
/// [Authenticated Route] Removes the caller's profile together with its avatar
/// and cover image. The account itself stays.
#[utoipa::path(
    delete,
    path = "/api/profiles/me",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No profile")
    )
)]
pub async fn delete_my_profile(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    let profile = state
        .repo
        .get_profile_by_user(user.id())
        .await?
        .ok_or(ApiError::NotFound("profile"))?;

    state.repo.delete_profile_by_user(user.id()).await?;

    for media_id in profile.avatar_id.into_iter().chain(profile.cover_image_id) {
        if let Err(e) = release_media(&state, media_id).await {
            tracing::warn!(user_id = %user.id(), error = %e, "failed to delete profile image");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
