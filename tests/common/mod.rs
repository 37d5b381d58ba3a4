#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, Bytes},
    http::{Method, Request, StatusCode, header},
};
use async_trait::async_trait;
use blog_platform::{
    AppConfig, AppState, LocalMediaStore, MemoryRepository, MockEmailService, create_router,
    mailer::MailerState,
    media::MediaState,
    models::{Media, MediaMetadata, PasswordResetToken, Post, Profile, User},
    password,
    repository::{RepoResult, Repository, RepositoryError, RepositoryState},
};
use image::{DynamicImage, ImageFormat};
use serde_json::Value;
use std::{
    io::Cursor,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "password123";
pub const BASE_URL: &str = "http://blog.test";

/// TestApp
///
/// A full router over the in-memory repository, a media store rooted in a
/// temporary directory, and a recording mailer.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub mailer: Arc<MockEmailService>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(MockEmailService::new())
    }

    pub fn with_mailer(mailer: MockEmailService) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let media = Arc::new(LocalMediaStore::new(upload_dir.path(), BASE_URL)) as MediaState;
        Self::build(upload_dir, media, mailer, None)
    }

    pub fn with_media(media: MediaState) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        Self::build(upload_dir, media, MockEmailService::new(), None)
    }

    /// Local media store, but the repository refuses media records once
    /// `allowed` of them have been written.
    pub fn with_media_record_limit(allowed: usize) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let media = Arc::new(LocalMediaStore::new(upload_dir.path(), BASE_URL)) as MediaState;
        Self::build(upload_dir, media, MockEmailService::new(), Some(allowed))
    }

    fn build(
        upload_dir: TempDir,
        media: MediaState,
        mailer: MockEmailService,
        media_record_limit: Option<usize>,
    ) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let repo_state = match media_record_limit {
            Some(allowed) => Arc::new(LimitedMediaRepository::new(repo.clone(), allowed)) as RepositoryState,
            None => repo.clone() as RepositoryState,
        };
        let mailer = Arc::new(mailer);
        let config = AppConfig {
            upload_dir: upload_dir.path().to_string_lossy().into_owned(),
            base_url: BASE_URL.to_string(),
            ..AppConfig::default()
        };
        let state = AppState::new(
            repo_state,
            media,
            mailer.clone() as MailerState,
            config,
        );
        Self {
            router: create_router(state.clone()),
            state,
            repo,
            mailer,
            upload_dir,
        }
    }

    /// Inserts an account directly, with `TEST_PASSWORD` as its password.
    pub async fn seed_user(&self, role: &str) -> User {
        let id = Uuid::new_v4();
        let short = &id.simple().to_string()[..8];
        self.repo
            .create_user(User {
                id,
                username: format!("user_{short}"),
                email: format!("{short}@example.com"),
                password_hash: password::hash_password(TEST_PASSWORD).await.unwrap(),
                role: role.to_string(),
                ..User::default()
            })
            .await
            .unwrap()
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state
            .tokens
            .issue_default(user.id, &user.email, &user.role)
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(request).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }
}

/// LimitedMediaRepository
///
/// Delegates to a `MemoryRepository` but fails `create_media` after a fixed
/// number of successful writes.
pub struct LimitedMediaRepository {
    inner: Arc<MemoryRepository>,
    remaining: AtomicUsize,
}

impl LimitedMediaRepository {
    pub fn new(inner: Arc<MemoryRepository>, allowed: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl Repository for LimitedMediaRepository {
    async fn create_user(&self, user: User) -> RepoResult<User> {
        self.inner.create_user(user).await
    }
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.inner.get_user_by_email(email).await
    }
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.inner.get_user_by_username(username).await
    }
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.inner.list_users().await
    }
    async fn update_user_role(&self, id: Uuid, role: &str) -> RepoResult<Option<User>> {
        self.inner.update_user_role(id, role).await
    }
    async fn update_password(&self, id: Uuid, password_hash: &str) -> RepoResult<bool> {
        self.inner.update_password(id, password_hash).await
    }
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        self.inner.delete_user(id).await
    }
    async fn create_profile(&self, profile: Profile) -> RepoResult<Profile> {
        self.inner.create_profile(profile).await
    }
    async fn get_profile_by_user(&self, user_id: Uuid) -> RepoResult<Option<Profile>> {
        self.inner.get_profile_by_user(user_id).await
    }
    async fn update_profile(&self, profile: Profile) -> RepoResult<Option<Profile>> {
        self.inner.update_profile(profile).await
    }
    async fn delete_profile_by_user(&self, user_id: Uuid) -> RepoResult<bool> {
        self.inner.delete_profile_by_user(user_id).await
    }
    async fn create_media(&self, media: Media) -> RepoResult<Media> {
        let granted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !granted {
            return Err(RepositoryError::Backend("media table unavailable".into()));
        }
        self.inner.create_media(media).await
    }
    async fn get_media(&self, id: Uuid) -> RepoResult<Option<Media>> {
        self.inner.get_media(id).await
    }
    async fn list_media_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Media>> {
        self.inner.list_media_by_user(user_id).await
    }
    async fn update_media_metadata(
        &self,
        id: Uuid,
        user_id: Uuid,
        metadata: MediaMetadata,
    ) -> RepoResult<Option<Media>> {
        self.inner.update_media_metadata(id, user_id, metadata).await
    }
    async fn delete_media(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        self.inner.delete_media(id, user_id).await
    }
    async fn media_in_use(&self, id: Uuid) -> RepoResult<bool> {
        self.inner.media_in_use(id).await
    }
    async fn create_post(&self, post: Post) -> RepoResult<Post> {
        self.inner.create_post(post).await
    }
    async fn get_post(&self, id: Uuid) -> RepoResult<Option<Post>> {
        self.inner.get_post(id).await
    }
    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        self.inner.list_posts().await
    }
    async fn update_post(&self, post: Post) -> RepoResult<Option<Post>> {
        self.inner.update_post(post).await
    }
    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        self.inner.delete_post(id).await
    }
    async fn create_reset_token(&self, token: PasswordResetToken) -> RepoResult<()> {
        self.inner.create_reset_token(token).await
    }
    async fn get_reset_token(&self, token: &str) -> RepoResult<Option<PasswordResetToken>> {
        self.inner.get_reset_token(token).await
    }
    async fn mark_reset_token_used(&self, id: Uuid) -> RepoResult<bool> {
        self.inner.mark_reset_token_used(id).await
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// MultipartBody
///
/// Minimal multipart/form-data encoder for driving the upload endpoints.
pub struct MultipartBody {
    boundary: &'static str,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----blog-platform-test-boundary",
            buf: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", self.boundary),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(self.buf)).unwrap()
    }
}

pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, ImageFormat::Jpeg)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, ImageFormat::Png)
}

/// Counts regular files below `dir`, recursively.
pub fn count_files(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}
