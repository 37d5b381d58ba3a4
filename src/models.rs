use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roles::Role;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Account record from the `users` table. The password hash is loaded for login
/// checks but never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,
    // One of 'admin', 'author', 'reader'.
    pub role: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SocialLinks {
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub instagram: Option<String>,
}

/// Profile
///
/// Public-facing details of a user, one per account. Avatar and cover image
/// point at media records owned by the same user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    #[sqlx(json)]
    pub social_links: SocialLinks,
    pub avatar_id: Option<Uuid>,
    pub cover_image_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Thumbnail
///
/// A derived, resized copy of a media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Thumbnail {
    /// Size class label: 'small', 'medium' or 'large'.
    pub size: String,
    pub width: u32,
    pub height: u32,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MediaMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Media
///
/// Record of an uploaded file in the `media` table. `path` is where the
/// original lives on disk; `thumbnails` lists every derived copy that was
/// produced, possibly none.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Media {
    pub id: Uuid,
    // Owner. Every update and delete filters on it.
    pub user_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub mime_type: String,
    pub size: i64,
    pub path: String,
    pub url: String,
    #[sqlx(json)]
    pub thumbnails: Vec<Thumbnail>,
    #[sqlx(json)]
    pub metadata: MediaMetadata,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

/// Post
///
/// Article record from the `posts` table. Images are referenced by media id;
/// deleting a post deletes those media too.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub featured_image_id: Option<Uuid>,
    pub gallery_ids: Vec<Uuid>,
    // 'draft' | 'published'
    pub status: String,
    pub tags: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PasswordResetToken
///
/// Single-use reset credential. Internal only; the token value leaves the
/// server solely inside the reset mail.
#[derive(Debug, Clone, FromRow, Default)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && now <= self.expires_at
    }
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginResponse
///
/// Signed credential plus a summary of the account it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// RegisterResponse
///
/// Output of multipart registration. Avatar and cover image records are
/// included when they were uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub user: User,
    pub profile: Profile,
    pub avatar: Option<Media>,
    pub cover_image: Option<Media>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// UpdateRoleRequest
///
/// Body of `PUT /api/admin/users/{id}/role`. Only the three known role names
/// deserialize; anything else is rejected with 400.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub featured_image_id: Option<Uuid>,
    #[serde(default)]
    pub gallery_ids: Vec<Uuid>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// UpdatePostRequest
///
/// Partial update of a post; absent fields keep their value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_ids: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateMediaRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// --- Output Schemas ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CascadeReport
///
/// Outcome of deleting a post. The post itself is gone; `errors` lists the
/// dependent media that could not be cleaned up.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CascadeReport {
    pub deleted_media: usize,
    pub errors: Vec<String>,
}
