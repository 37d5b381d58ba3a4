use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{Media, MediaMetadata, PasswordResetToken, Post, Profile, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";
const PROFILE_COLUMNS: &str = "id, user_id, full_name, bio, location, website, social_links, \
     avatar_id, cover_image_id, created_at, updated_at";
const MEDIA_COLUMNS: &str = "id, user_id, file_name, file_type, mime_type, size, path, url, \
     thumbnails, metadata, created_at, updated_at";
const POST_COLUMNS: &str = "id, title, content, author_id, featured_image_id, gallery_ids, \
     status, tags, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Logs a database failure under the operation name before handing it up.
fn logged(op: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        tracing::error!("{op} error: {:?}", e);
        e.into()
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, user: User) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(logged("create_user"))
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_user"))
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_user_by_email"))
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_user_by_username"))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_users"))
    }

    async fn update_user_role(&self, id: Uuid, role: &str) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("update_user_role"))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool> {
        let res = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(logged("update_password"))?;
        Ok(res.rows_affected() > 0)
    }

    /// delete_user
    ///
    /// The profile row goes with the user through `ON DELETE CASCADE`.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(logged("delete_user"))?;
        Ok(res.rows_affected() > 0)
    }

    // --- PROFILES ---

    async fn create_profile(&self, profile: Profile) -> RepoResult<Profile> {
        let sql = format!(
            "INSERT INTO profiles (id, user_id, full_name, bio, location, website, social_links, \
             avatar_id, cover_image_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(profile.id)
            .bind(profile.user_id)
            .bind(&profile.full_name)
            .bind(&profile.bio)
            .bind(&profile.location)
            .bind(&profile.website)
            .bind(Json(&profile.social_links))
            .bind(profile.avatar_id)
            .bind(profile.cover_image_id)
            .fetch_one(&self.pool)
            .await
            .map_err(logged("create_profile"))
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> RepoResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");
        sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_profile_by_user"))
    }

    async fn update_profile(&self, profile: Profile) -> RepoResult<Option<Profile>> {
        let sql = format!(
            "UPDATE profiles SET full_name = $2, bio = $3, location = $4, website = $5, \
             social_links = $6, avatar_id = $7, cover_image_id = $8, updated_at = NOW() \
             WHERE user_id = $1 RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(profile.user_id)
            .bind(&profile.full_name)
            .bind(&profile.bio)
            .bind(&profile.location)
            .bind(&profile.website)
            .bind(Json(&profile.social_links))
            .bind(profile.avatar_id)
            .bind(profile.cover_image_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("update_profile"))
    }

    async fn delete_profile_by_user(&self, user_id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(logged("delete_profile_by_user"))?;
        Ok(res.rows_affected() > 0)
    }

    // --- MEDIA ---

    async fn create_media(&self, media: Media) -> RepoResult<Media> {
        let sql = format!(
            "INSERT INTO media (id, user_id, file_name, file_type, mime_type, size, path, url, \
             thumbnails, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW()) RETURNING {MEDIA_COLUMNS}"
        );
        sqlx::query_as::<_, Media>(&sql)
            .bind(media.id)
            .bind(media.user_id)
            .bind(&media.file_name)
            .bind(&media.file_type)
            .bind(&media.mime_type)
            .bind(media.size)
            .bind(&media.path)
            .bind(&media.url)
            .bind(Json(&media.thumbnails))
            .bind(Json(&media.metadata))
            .fetch_one(&self.pool)
            .await
            .map_err(logged("create_media"))
    }

    async fn get_media(&self, id: Uuid) -> RepoResult<Option<Media>> {
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1");
        sqlx::query_as::<_, Media>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_media"))
    }

    async fn list_media_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Media>> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Media>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_media_by_user"))
    }

    async fn update_media_metadata(
        &self,
        id: Uuid,
        user_id: Uuid,
        metadata: MediaMetadata,
    ) -> RepoResult<Option<Media>> {
        let sql = format!(
            "UPDATE media SET metadata = $3, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {MEDIA_COLUMNS}"
        );
        sqlx::query_as::<_, Media>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(Json(&metadata))
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("update_media_metadata"))
    }

    async fn delete_media(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        // Galleries are a UUID[] with no foreign key, so they are cleaned here.
        let removed: i64 = sqlx::query_scalar(
            "WITH removed AS (DELETE FROM media WHERE id = $1 AND user_id = $2 RETURNING id), \
             stripped AS (UPDATE posts SET gallery_ids = array_remove(gallery_ids, $1) \
                          WHERE $1 = ANY(gallery_ids) AND EXISTS (SELECT 1 FROM removed)) \
             SELECT COUNT(*) FROM removed",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(logged("delete_media"))?;
        Ok(removed > 0)
    }

    async fn media_in_use(&self, id: Uuid) -> RepoResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE featured_image_id = $1 OR $1 = ANY(gallery_ids)) \
             OR EXISTS (SELECT 1 FROM profiles WHERE avatar_id = $1 OR cover_image_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(logged("media_in_use"))
    }

    // --- POSTS ---

    async fn create_post(&self, post: Post) -> RepoResult<Post> {
        let sql = format!(
            "INSERT INTO posts (id, title, content, author_id, featured_image_id, gallery_ids, \
             status, tags, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.author_id)
            .bind(post.featured_image_id)
            .bind(&post.gallery_ids)
            .bind(&post.status)
            .bind(&post.tags)
            .fetch_one(&self.pool)
            .await
            .map_err(logged("create_post"))
    }

    async fn get_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_post"))
    }

    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC");
        sqlx::query_as::<_, Post>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_posts"))
    }

    async fn update_post(&self, post: Post) -> RepoResult<Option<Post>> {
        let sql = format!(
            "UPDATE posts SET title = $2, content = $3, featured_image_id = $4, gallery_ids = $5, \
             status = $6, tags = $7, updated_at = NOW() WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.featured_image_id)
            .bind(&post.gallery_ids)
            .bind(&post.status)
            .bind(&post.tags)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("update_post"))
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(logged("delete_post"))?;
        Ok(res.rows_affected() > 0)
    }

    // --- PASSWORD RESET ---

    async fn create_reset_token(&self, token: PasswordResetToken) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (id, user_id, token, expires_at, used, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW())",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.used)
        .execute(&self.pool)
        .await
        .map_err(logged("create_reset_token"))?;
        Ok(())
    }

    async fn get_reset_token(&self, token: &str) -> RepoResult<Option<PasswordResetToken>> {
        sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, user_id, token, expires_at, used, created_at \
             FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(logged("get_reset_token"))
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("UPDATE password_reset_tokens SET used = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(logged("mark_reset_token_used"))?;
        Ok(res.rows_affected() > 0)
    }
}
