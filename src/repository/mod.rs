use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Media, MediaMetadata, PasswordResetToken, Post, Profile, User};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Persistence failures as seen by the handlers. Unique-constraint violations
/// are surfaced separately so they can become 409 responses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Backend(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let what = match db.constraint() {
                    Some(c) if c.contains("email") => "email already exists",
                    Some(c) if c.contains("username") => "username already exists",
                    _ => "record already exists",
                };
                return RepositoryError::Conflict(what.to_string());
            }
        }
        RepositoryError::Backend(e.to_string())
    }
}

/// Repository Trait
///
/// The persistence contract behind every workflow. Each method is a single
/// atomic write or read; there are no multi-record transactions.
///
/// Lookups return `Ok(None)` for a missing row. Mutations that target one row
/// return `Ok(false)` or `Ok(None)` when nothing matched, including when the
/// ownership filter excluded it.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, user: User) -> RepoResult<User>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn update_user_role(&self, id: Uuid, role: &str) -> RepoResult<Option<User>>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool>;
    /// Removes the user together with their profile.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    // --- Profiles ---
    async fn create_profile(&self, profile: Profile) -> RepoResult<Profile>;
    async fn get_profile_by_user(&self, user_id: Uuid) -> RepoResult<Option<Profile>>;
    /// Replaces every mutable field of the profile owned by `profile.user_id`.
    async fn update_profile(&self, profile: Profile) -> RepoResult<Option<Profile>>;
    async fn delete_profile_by_user(&self, user_id: Uuid) -> RepoResult<bool>;

    // --- Media ---
    async fn create_media(&self, media: Media) -> RepoResult<Media>;
    async fn get_media(&self, id: Uuid) -> RepoResult<Option<Media>>;
    /// Newest first.
    async fn list_media_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Media>>;
    /// Owner-only: matches on both `id` and `user_id`.
    async fn update_media_metadata(
        &self,
        id: Uuid,
        user_id: Uuid,
        metadata: MediaMetadata,
    ) -> RepoResult<Option<Media>>;
    /// Owner-only: matches on both `id` and `user_id`. Profile and featured
    /// image references are cleared and the id is dropped from every gallery.
    async fn delete_media(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool>;
    /// Whether any post or profile still points at the media.
    async fn media_in_use(&self, id: Uuid) -> RepoResult<bool>;

    // --- Posts ---
    async fn create_post(&self, post: Post) -> RepoResult<Post>;
    async fn get_post(&self, id: Uuid) -> RepoResult<Option<Post>>;
    /// Newest first.
    async fn list_posts(&self) -> RepoResult<Vec<Post>>;
    async fn update_post(&self, post: Post) -> RepoResult<Option<Post>>;
    async fn delete_post(&self, id: Uuid) -> RepoResult<bool>;

    // --- Password reset ---
    async fn create_reset_token(&self, token: PasswordResetToken) -> RepoResult<()>;
    async fn get_reset_token(&self, token: &str) -> RepoResult<Option<PasswordResetToken>>;
    async fn mark_reset_token_used(&self, id: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;
