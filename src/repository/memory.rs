use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::models::{Media, MediaMetadata, PasswordResetToken, Post, Profile, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    media: HashMap<Uuid, Media>,
    posts: HashMap<Uuid, Post>,
    reset_tokens: HashMap<Uuid, PasswordResetToken>,
}

/// MemoryRepository
///
/// In-process implementation of `Repository`. Used by the test suite and when
/// running locally without `DATABASE_URL`. Enforces the same uniqueness and
/// ownership rules as the Postgres schema, and mirrors its cascades when a
/// user is deleted.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], created: impl Fn(&T) -> chrono::DateTime<Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(created(item)));
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, mut user: User) -> RepoResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".into()));
        }
        if t.users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict("username already exists".into()));
        }
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        newest_first(&mut users, |u| u.created_at);
        Ok(users)
    }

    async fn update_user_role(&self, id: Uuid, role: &str) -> RepoResult<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.get_mut(&id).map(|u| {
            u.role = role.to_string();
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        Ok(match t.users.get_mut(&id) {
            Some(u) => {
                u.password_hash = password_hash.to_string();
                u.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }
        t.profiles.retain(|_, p| p.user_id != id);
        t.media.retain(|_, m| m.user_id != id);
        t.posts.retain(|_, p| p.author_id != id);
        t.reset_tokens.retain(|_, r| r.user_id != id);
        Ok(true)
    }

    async fn create_profile(&self, mut profile: Profile) -> RepoResult<Profile> {
        let mut t = self.tables.write().await;
        if t.profiles.values().any(|p| p.user_id == profile.user_id) {
            return Err(RepositoryError::Conflict("profile already exists".into()));
        }
        let now = Utc::now();
        profile.created_at = now;
        profile.updated_at = now;
        t.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> RepoResult<Option<Profile>> {
        let t = self.tables.read().await;
        Ok(t.profiles.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn update_profile(&self, profile: Profile) -> RepoResult<Option<Profile>> {
        let mut t = self.tables.write().await;
        Ok(t
            .profiles
            .values_mut()
            .find(|p| p.user_id == profile.user_id)
            .map(|p| {
                p.full_name = profile.full_name;
                p.bio = profile.bio;
                p.location = profile.location;
                p.website = profile.website;
                p.social_links = profile.social_links;
                p.avatar_id = profile.avatar_id;
                p.cover_image_id = profile.cover_image_id;
                p.updated_at = Utc::now();
                p.clone()
            }))
    }

    async fn delete_profile_by_user(&self, user_id: Uuid) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        let before = t.profiles.len();
        t.profiles.retain(|_, p| p.user_id != user_id);
        Ok(t.profiles.len() < before)
    }

    async fn create_media(&self, mut media: Media) -> RepoResult<Media> {
        let now = Utc::now();
        media.created_at = now;
        media.updated_at = now;
        self.tables.write().await.media.insert(media.id, media.clone());
        Ok(media)
    }

    async fn get_media(&self, id: Uuid) -> RepoResult<Option<Media>> {
        Ok(self.tables.read().await.media.get(&id).cloned())
    }

    async fn list_media_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Media>> {
        let mut media: Vec<Media> = self
            .tables
            .read()
            .await
            .media
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut media, |m| m.created_at);
        Ok(media)
    }

    async fn update_media_metadata(
        &self,
        id: Uuid,
        user_id: Uuid,
        metadata: MediaMetadata,
    ) -> RepoResult<Option<Media>> {
        let mut t = self.tables.write().await;
        Ok(t
            .media
            .get_mut(&id)
            .filter(|m| m.user_id == user_id)
            .map(|m| {
                m.metadata = metadata;
                m.updated_at = Utc::now();
                m.clone()
            }))
    }

    async fn delete_media(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        match t.media.get(&id) {
            Some(m) if m.user_id == user_id => {
                t.media.remove(&id);
                // ON DELETE SET NULL
                for p in t.profiles.values_mut() {
                    if p.avatar_id == Some(id) {
                        p.avatar_id = None;
                    }
                    if p.cover_image_id == Some(id) {
                        p.cover_image_id = None;
                    }
                }
                for p in t.posts.values_mut() {
                    if p.featured_image_id == Some(id) {
                        p.featured_image_id = None;
                    }
                    p.gallery_ids.retain(|g| *g != id);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn media_in_use(&self, id: Uuid) -> RepoResult<bool> {
        let t = self.tables.read().await;
        let in_post = t
            .posts
            .values()
            .any(|p| p.featured_image_id == Some(id) || p.gallery_ids.contains(&id));
        let in_profile = t
            .profiles
            .values()
            .any(|p| p.avatar_id == Some(id) || p.cover_image_id == Some(id));
        Ok(in_post || in_profile)
    }

    async fn create_post(&self, mut post: Post) -> RepoResult<Post> {
        let now = Utc::now();
        post.created_at = now;
        post.updated_at = now;
        self.tables.write().await.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        let mut posts: Vec<Post> = self.tables.read().await.posts.values().cloned().collect();
        newest_first(&mut posts, |p| p.created_at);
        Ok(posts)
    }

    async fn update_post(&self, post: Post) -> RepoResult<Option<Post>> {
        let mut t = self.tables.write().await;
        Ok(t.posts.get_mut(&post.id).map(|p| {
            p.title = post.title;
            p.content = post.content;
            p.featured_image_id = post.featured_image_id;
            p.gallery_ids = post.gallery_ids;
            p.status = post.status;
            p.tags = post.tags;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.tables.write().await.posts.remove(&id).is_some())
    }

    async fn create_reset_token(&self, mut token: PasswordResetToken) -> RepoResult<()> {
        token.created_at = Utc::now();
        self.tables.write().await.reset_tokens.insert(token.id, token);
        Ok(())
    }

    async fn get_reset_token(&self, token: &str) -> RepoResult<Option<PasswordResetToken>> {
        let t = self.tables.read().await;
        Ok(t.reset_tokens.values().find(|r| r.token == token).cloned())
    }

    async fn mark_reset_token_used(&self, id: Uuid) -> RepoResult<bool> {
        let mut t = self.tables.write().await;
        Ok(match t.reset_tokens.get_mut(&id) {
            Some(r) => {
                r.used = true;
                true
            }
            None => false,
        })
    }
}
