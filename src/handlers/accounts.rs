use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{MultipartForm, ValidJson, discard_files, discard_media, record_media};
use crate::{
    AppState,
    error::{ApiError, ApiResult},
    media::StoredMedia,
    models::{
        LoginRequest, LoginResponse, Media, MediaMetadata, MessageResponse, PasswordResetRequest,
        PasswordResetToken, Profile, RegisterResponse, ResetPasswordRequest, SocialLinks, User,
    },
    password::{self, MIN_PASSWORD_LEN},
    roles::Role,
};

/// How long a password reset link stays valid.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// The same body answers every reset request, so it reveals nothing about
/// which addresses have accounts.
pub const RESET_REQUEST_MESSAGE: &str = "If the email exists, a reset link will be sent";

/// RegisterForm
///
/// Multipart body of `POST /api/auth/register` (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct RegisterForm {
    username: String,
    email: String,
    password: String,
    full_name: String,
    bio: Option<String>,
    location: Option<String>,
    website: Option<String>,
    twitter: Option<String>,
    facebook: Option<String>,
    linkedin: Option<String>,
    github: Option<String>,
    instagram: Option<String>,
    /// 'admin' | 'author' | 'reader'; defaults to 'reader'.
    role: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    avatar: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    cover_image: Option<Vec<u8>>,
}

/// register
///
/// [Public Route] Creates an account with its profile, plus optional avatar and
/// cover images.
///
/// Every check runs before anything is written: uniqueness, role, password
/// length and the uploaded images' size and type. Files are stored under the
/// new user's id. If the account, its media records or its profile cannot be
/// written, everything this request created is removed again.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body(content = RegisterForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Invalid input or image"),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let mut form = MultipartForm::read(multipart, &["avatar", "cover_image"]).await?;

    let username = form.required("username")?;
    let email = form.required("email")?;
    let password = form.required("password")?;
    let full_name = form.required("full_name")?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let role = match form.text("role") {
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|e| ApiError::validation(e.to_string()))?,
        None => Role::default(),
    };

    if state.repo.get_user_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("username already exists".into()));
    }
    if state.repo.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("email already exists".into()));
    }

    let avatar = form
        .take_file("avatar")
        .map(|u| state.media.validate(u))
        .transpose()?;
    let cover = form
        .take_file("cover_image")
        .map(|u| state.media.validate(u))
        .transpose()?;

    let password_hash = password::hash_password(&password).await?;
    let user_id = Uuid::new_v4();

    // Files first, keyed to the id the account is about to get.
    let mut stored: Vec<(&'static str, StoredMedia)> = Vec::new();
    for (slot, upload) in [("avatar", avatar), ("cover_image", cover)] {
        let Some(upload) = upload else { continue };
        match state.media.store(upload, user_id).await {
            Ok(s) => stored.push((slot, s)),
            Err(e) => {
                discard_all(&state, &stored).await;
                return Err(e.into());
            }
        }
    }

    let user = User {
        id: user_id,
        username,
        email,
        password_hash,
        role: role.as_str().to_string(),
        ..User::default()
    };
    let user = match state.repo.create_user(user).await {
        Ok(user) => user,
        Err(e) => {
            discard_all(&state, &stored).await;
            return Err(e.into());
        }
    };

    let mut recorded: Vec<(&'static str, Media)> = Vec::new();
    let mut pending = stored.into_iter();
    while let Some((slot, s)) = pending.next() {
        match record_media(&state, user.id, s, MediaMetadata::default()).await {
            Ok(media) => recorded.push((slot, media)),
            Err(e) => {
                discard_all(&state, &pending.collect::<Vec<_>>()).await;
                undo_registration(&state, user.id, recorded).await;
                return Err(e);
            }
        }
    }
    let media_in = |wanted: &str| {
        recorded
            .iter()
            .find(|(slot, _)| *slot == wanted)
            .map(|(_, m)| m.clone())
    };
    let avatar_media = media_in("avatar");
    let cover_media = media_in("cover_image");

    let social_links = SocialLinks {
        twitter: form.text("twitter"),
        facebook: form.text("facebook"),
        linkedin: form.text("linkedin"),
        github: form.text("github"),
        instagram: form.text("instagram"),
    };
    let created = state
        .repo
        .create_profile(Profile {
            id: Uuid::new_v4(),
            user_id: user.id,
            full_name,
            bio: form.text("bio"),
            location: form.text("location"),
            website: form.text("website"),
            social_links,
            avatar_id: avatar_media.as_ref().map(|m| m.id),
            cover_image_id: cover_media.as_ref().map(|m| m.id),
            ..Profile::default()
        })
        .await;
    let profile = match created {
        Ok(profile) => profile,
        Err(e) => {
            undo_registration(&state, user.id, recorded).await;
            return Err(e.into());
        }
    };

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            profile,
            avatar: avatar_media,
            cover_image: cover_media,
        }),
    ))
}

async fn discard_all(state: &AppState, stored: &[(&'static str, StoredMedia)]) {
    for (_, s) in stored {
        discard_files(state, &s.primary.path).await;
    }
}

/// Removes a half-registered account so the same username and email can be
/// used again.
async fn undo_registration(state: &AppState, user_id: Uuid, recorded: Vec<(&'static str, Media)>) {
    let media: Vec<Media> = recorded.into_iter().map(|(_, m)| m).collect();
    discard_media(state, &media).await;
    if let Err(e) = state.repo.delete_user(user_id).await {
        tracing::error!(user_id = %user_id, error = %e, "failed to roll back registration");
    }
}

/// login
///
/// [Public Route] Exchanges email and password for a signed token. Unknown
/// email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let Some(user) = state.repo.get_user_by_email(payload.email.trim()).await? else {
        return Err(ApiError::InvalidCredentials);
    };
    if !password::verify_password(&payload.password, &user.password_hash).await? {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue_default(user.id, &user.email, &user.role)?;
    tracing::info!(user_id = %user.id, "login");

    Ok(Json(LoginResponse { token, user }))
}

/// request_password_reset
///
/// [Public Route] Starts a password reset. The response is identical whether or
/// not the address has an account; for a real account a single-use token valid
/// for one hour is stored and a link mailed.
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 500, description = "Mail delivery failed")
    )
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<PasswordResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(user) = state.repo.get_user_by_email(payload.email.trim()).await? {
        let token = Uuid::new_v4().simple().to_string();
        state
            .repo
            .create_reset_token(PasswordResetToken {
                id: Uuid::new_v4(),
                user_id: user.id,
                token: token.clone(),
                expires_at: Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS),
                used: false,
                created_at: Utc::now(),
            })
            .await?;

        let link = format!(
            "{}/reset-password?token={token}",
            state.config.base_url.trim_end_matches('/')
        );
        state
            .mailer
            .send_password_reset(&user.email, &link)
            .await?;
        tracing::info!(user_id = %user.id, "password reset requested");
    }

    Ok(Json(MessageResponse::new(RESET_REQUEST_MESSAGE)))
}

/// reset_password
///
/// [Public Route] Completes a reset with a token from the mailed link. Unknown,
/// used and expired tokens are all refused with 400.
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or password too short")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let token = state
        .repo
        .get_reset_token(&payload.token)
        .await?
        .filter(|t| t.is_redeemable(Utc::now()))
        .ok_or_else(|| ApiError::validation("invalid or expired reset token"))?;

    let password_hash = password::hash_password(&payload.new_password).await?;
    if !state
        .repo
        .update_password(token.user_id, &password_hash)
        .await?
    {
        return Err(ApiError::validation("invalid or expired reset token"));
    }

    if let Err(e) = state.repo.mark_reset_token_used(token.id).await {
        tracing::warn!(token_id = %token.id, error = %e, "failed to mark reset token used");
    }
    tracing::info!(user_id = %token.user_id, "password reset completed");

    Ok(Json(MessageResponse::new("Password has been reset")))
}
