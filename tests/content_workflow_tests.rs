mod common;

use axum::http::{Method, StatusCode};
use blog_platform::{MockMediaStore, media::MediaState, models::User, repository::Repository};
use common::{MultipartBody, TestApp, empty_request, json_request, jpeg, png};
use serde_json::{Value, json};
use std::{path::Path, sync::Arc};
use uuid::Uuid;

async fn upload(app: &TestApp, user: &User) -> Value {
    let request = MultipartBody::new()
        .text("title", "Sunset")
        .text("tags", "travel, sky,,")
        .file("file", "sunset.jpg", "image/jpeg", &jpeg(800, 600))
        .into_request(Method::POST, "/api/media", Some(&app.token_for(user)));
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn create_post(app: &TestApp, user: &User, body: Value) -> (StatusCode, Value) {
    app.send(json_request(
        Method::POST,
        "/api/posts",
        Some(&app.token_for(user)),
        body,
    ))
    .await
}

// --- Posts ---

#[tokio::test]
async fn test_post_creation_requires_author_role() {
    let app = TestApp::new();
    let reader = app.seed_user("reader").await;
    let author = app.seed_user("author").await;
    let admin = app.seed_user("admin").await;
    let body = json!({ "title": "Hello", "content": "World" });

    let (status, _) = app
        .send(json_request(Method::POST, "/api/posts", None, body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(
        create_post(&app, &reader, body.clone()).await.0,
        StatusCode::FORBIDDEN
    );

    let (status, post) = create_post(&app, &author, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["author_id"], author.id.to_string());
    assert_eq!(post["status"], "draft");

    // Admin subsumes author.
    assert_eq!(create_post(&app, &admin, body).await.0, StatusCode::CREATED);

    // Every authenticated role can read.
    let (status, list) = app
        .send(empty_request(
            Method::GET,
            "/api/posts",
            Some(&app.token_for(&reader)),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_post_requires_title_and_owned_media() {
    let app = TestApp::new();
    let author = app.seed_user("author").await;
    let other = app.seed_user("author").await;
    let theirs = upload(&app, &other).await;

    let (status, _) = create_post(&app, &author, json!({ "content": "no title" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create_post(
        &app,
        &author,
        json!({ "title": "Borrowed", "content": "", "featured_image_id": theirs["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create_post(
        &app,
        &author,
        json!({ "title": "Missing", "content": "", "gallery_ids": [Uuid::new_v4()] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_update_owner_or_admin() {
    let app = TestApp::new();
    let owner = app.seed_user("author").await;
    let other = app.seed_user("author").await;
    let admin = app.seed_user("admin").await;

    let (_, post) = create_post(&app, &owner, json!({ "title": "Draft", "content": "v1" })).await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &uri,
            Some(&app.token_for(&other)),
            json!({ "title": "Hijacked" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .send(json_request(
            Method::PUT,
            &uri,
            Some(&app.token_for(&owner)),
            json!({ "content": "v2", "status": "published" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Draft");
    assert_eq!(updated["content"], "v2");
    assert_eq!(updated["status"], "published");

    let (status, updated) = app
        .send(json_request(
            Method::PUT,
            &uri,
            Some(&app.token_for(&admin)),
            json!({ "tags": ["edited"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["tags"], json!(["edited"]));
    assert_eq!(updated["author_id"], owner.id.to_string());

    let missing = format!("/api/posts/{}", Uuid::new_v4());
    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &missing,
            Some(&app.token_for(&admin)),
            json!({ "title": "x" }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replacing_featured_image_deletes_the_old_one() {
    let app = TestApp::new();
    let author = app.seed_user("author").await;
    let first = upload(&app, &author).await;
    let second = upload(&app, &author).await;

    let (_, post) = create_post(
        &app,
        &author,
        json!({ "title": "Pics", "content": "", "featured_image_id": first["id"] }),
    )
    .await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &uri,
            Some(&app.token_for(&author)),
            json!({ "featured_image_id": second["id"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let first_id: Uuid = first["id"].as_str().unwrap().parse().unwrap();
    assert!(app.repo.get_media(first_id).await.unwrap().is_none());
    assert!(!Path::new(first["path"].as_str().unwrap()).exists());
    assert!(Path::new(second["path"].as_str().unwrap()).exists());
}

#[tokio::test]
async fn test_post_delete_is_admin_only_and_cascades() {
    let app = TestApp::new();
    let author = app.seed_user("author").await;
    let admin = app.seed_user("admin").await;
    let featured = upload(&app, &author).await;
    let gallery = upload(&app, &author).await;
    assert_eq!(common::count_files(app.upload_dir.path()), 8);

    let (_, post) = create_post(
        &app,
        &author,
        json!({
            "title": "Gallery",
            "content": "",
            "featured_image_id": featured["id"],
            "gallery_ids": [gallery["id"]],
        }),
    )
    .await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let (status, _) = app
        .send(empty_request(Method::DELETE, &uri, Some(&app.token_for(&author))))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, report) = app
        .send(empty_request(Method::DELETE, &uri, Some(&app.token_for(&admin))))
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["deleted_media"], 2);
    assert_eq!(report["errors"], json!([]));

    assert_eq!(common::count_files(app.upload_dir.path()), 0);
    assert!(app.repo.list_media_by_user(author.id).await.unwrap().is_empty());

    let (status, _) = app
        .send(empty_request(Method::GET, &uri, Some(&app.token_for(&admin))))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_media_shared_between_posts_survives_cascades() {
    let app = TestApp::new();
    let author = app.seed_user("author").await;
    let admin = app.seed_user("admin").await;
    let shared = upload(&app, &author).await;
    let replacement = upload(&app, &author).await;
    let shared_id: Uuid = shared["id"].as_str().unwrap().parse().unwrap();

    let (_, first) = create_post(
        &app,
        &author,
        json!({ "title": "First", "content": "", "featured_image_id": shared["id"] }),
    )
    .await;
    let (_, second) = create_post(
        &app,
        &author,
        json!({ "title": "Second", "content": "", "gallery_ids": [shared["id"]] }),
    )
    .await;
    let (_, third) = create_post(
        &app,
        &author,
        json!({ "title": "Third", "content": "", "featured_image_id": shared["id"] }),
    )
    .await;
    let second_uri = format!("/api/posts/{}", second["id"].as_str().unwrap());
    let third_uri = format!("/api/posts/{}", third["id"].as_str().unwrap());

    // Swapping the third post's featured image keeps the shared one.
    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &third_uri,
            Some(&app.token_for(&author)),
            json!({ "featured_image_id": replacement["id"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.repo.get_media(shared_id).await.unwrap().is_some());

    let first_uri = format!("/api/posts/{}", first["id"].as_str().unwrap());
    let (status, report) = app
        .send(empty_request(Method::DELETE, &first_uri, Some(&app.token_for(&admin))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["deleted_media"], 0);
    assert!(app.repo.get_media(shared_id).await.unwrap().is_some());
    assert!(Path::new(shared["path"].as_str().unwrap()).exists());

    // The untouched gallery can be sent back as is.
    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &second_uri,
            Some(&app.token_for(&author)),
            json!({ "gallery_ids": [shared["id"]] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Deleting the media outright drops it from the gallery.
    let (status, _) = app
        .send(empty_request(
            Method::DELETE,
            &format!("/api/media/{shared_id}"),
            Some(&app.token_for(&author)),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, second) = app
        .send(empty_request(Method::GET, &second_uri, Some(&app.token_for(&author))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["gallery_ids"], json!([]));
}

#[tokio::test]
async fn test_post_delete_keeps_media_used_as_avatar() {
    let app = TestApp::new();
    let author = app.seed_user("author").await;
    let admin = app.seed_user("admin").await;

    let request = MultipartBody::new()
        .file("avatar", "face.png", "image/png", &png(300, 300))
        .into_request(Method::PUT, "/api/profiles/me", Some(&app.token_for(&author)));
    let (status, profile) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, post) = create_post(
        &app,
        &author,
        json!({ "title": "Me", "content": "", "featured_image_id": profile["avatar_id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());
    let (status, report) = app
        .send(empty_request(Method::DELETE, &uri, Some(&app.token_for(&admin))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["deleted_media"], 0);
    assert_eq!(common::count_files(app.upload_dir.path()), 4);

    let profile = app.repo.get_profile_by_user(author.id).await.unwrap().unwrap();
    assert!(profile.avatar_id.is_some());
}

// --- Media ---

#[tokio::test]
async fn test_media_upload_and_metadata() {
    let app = TestApp::new();
    let user = app.seed_user("reader").await;

    let media = upload(&app, &user).await;
    assert_eq!(media["user_id"], user.id.to_string());
    assert_eq!(media["mime_type"], "image/jpeg");
    assert_eq!(media["file_name"], "sunset.jpg");
    assert_eq!(media["metadata"]["title"], "Sunset");
    assert_eq!(media["metadata"]["tags"], json!(["travel", "sky"]));
    assert_eq!(media["metadata"]["width"], 800);
    assert_eq!(media["metadata"]["height"], 600);

    let thumbs = media["thumbnails"].as_array().unwrap();
    let sizes: Vec<&str> = thumbs.iter().map(|t| t["size"].as_str().unwrap()).collect();
    assert_eq!(sizes, ["small", "medium", "large"]);
    assert_eq!(thumbs[0]["width"], 150);
    assert!(thumbs[0]["height"].as_u64().unwrap() < 150);
}

#[tokio::test]
async fn test_media_upload_requires_valid_file() {
    let app = TestApp::new();
    let user = app.seed_user("reader").await;
    let token = app.token_for(&user);

    let no_file = MultipartBody::new()
        .text("title", "nothing")
        .into_request(Method::POST, "/api/media", Some(&token));
    assert_eq!(app.send(no_file).await.0, StatusCode::BAD_REQUEST);

    let text = MultipartBody::new()
        .file("file", "notes.png", "image/png", b"plain text pretending")
        .into_request(Method::POST, "/api/media", Some(&token));
    assert_eq!(app.send(text).await.0, StatusCode::BAD_REQUEST);

    assert_eq!(common::count_files(app.upload_dir.path()), 0);
}

#[tokio::test]
async fn test_media_mutations_are_owner_only() {
    let app = TestApp::new();
    let owner = app.seed_user("author").await;
    let stranger = app.seed_user("admin").await;
    let media = upload(&app, &owner).await;
    let uri = format!("/api/media/{}", media["id"].as_str().unwrap());

    // Reading by id is open to any authenticated user.
    let (status, _) = app
        .send(empty_request(Method::GET, &uri, Some(&app.token_for(&stranger))))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, mine) = app
        .send(empty_request(
            Method::GET,
            "/api/media",
            Some(&app.token_for(&stranger)),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(mine.as_array().unwrap().is_empty());

    let edit = json!({ "title": "Renamed", "alt_text": "orange sky", "tags": ["dusk"] });
    let (status, _) = app
        .send(json_request(
            Method::PUT,
            &uri,
            Some(&app.token_for(&stranger)),
            edit.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(empty_request(Method::DELETE, &uri, Some(&app.token_for(&stranger))))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, updated) = app
        .send(json_request(Method::PUT, &uri, Some(&app.token_for(&owner)), edit))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["metadata"]["title"], "Renamed");
    assert_eq!(updated["metadata"]["alt_text"], "orange sky");
    assert_eq!(updated["metadata"]["width"], 800);

    let (status, _) = app
        .send(empty_request(Method::DELETE, &uri, Some(&app.token_for(&owner))))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(common::count_files(app.upload_dir.path()), 0);

    let (status, _) = app
        .send(empty_request(Method::GET, &uri, Some(&app.token_for(&owner))))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_file_delete_keeps_record() {
    let app = TestApp::with_media(Arc::new(MockMediaStore::new_failing()) as MediaState);
    let user = app.seed_user("reader").await;
    let token = app.token_for(&user);

    let request = MultipartBody::new()
        .file("file", "a.png", "image/png", &png(20, 20))
        .into_request(Method::POST, "/api/media", Some(&token));
    let (status, media) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/media/{}", media["id"].as_str().unwrap());

    let (status, body) = app
        .send(empty_request(Method::DELETE, &uri, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal server error");

    let (status, _) = app.send(empty_request(Method::GET, &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

// --- Profiles ---

#[tokio::test]
async fn test_profile_lifecycle() {
    let app = TestApp::new();
    let user = app.seed_user("reader").await;
    let token = app.token_for(&user);

    // Public lookup before any profile exists.
    let public_uri = format!("/api/profiles/{}", user.id);
    let (status, _) = app.send(empty_request(Method::GET, &public_uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Reading my own profile creates an empty one.
    let (status, mine) = app
        .send(empty_request(Method::GET, "/api/profiles/me", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["user_id"], user.id.to_string());

    let request = MultipartBody::new()
        .text("full_name", "Ada Writer")
        .text("location", "Dublin")
        .text("github", "https://github.com/ada")
        .file("avatar", "face.png", "image/png", &png(300, 300))
        .into_request(Method::PUT, "/api/profiles/me", Some(&token));
    let (status, updated) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["full_name"], "Ada Writer");
    assert_eq!(updated["location"], "Dublin");
    assert_eq!(updated["social_links"]["github"], "https://github.com/ada");
    assert!(updated["avatar_id"].is_string());
    assert_eq!(common::count_files(app.upload_dir.path()), 4);

    // Replacing the avatar removes the superseded image.
    let request = MultipartBody::new()
        .file("avatar", "face2.png", "image/png", &png(200, 200))
        .into_request(Method::PUT, "/api/profiles/me", Some(&token));
    let (status, replaced) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(replaced["avatar_id"], updated["avatar_id"]);
    assert_eq!(replaced["full_name"], "Ada Writer");
    assert_eq!(common::count_files(app.upload_dir.path()), 4);

    let (status, public) = app.send(empty_request(Method::GET, &public_uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["avatar_id"], replaced["avatar_id"]);

    let (status, _) = app
        .send(empty_request(Method::DELETE, "/api/profiles/me", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(common::count_files(app.upload_dir.path()), 0);

    let (status, _) = app.send(empty_request(Method::GET, &public_uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_update_rejects_bad_image() {
    let app = TestApp::new();
    let user = app.seed_user("reader").await;

    let request = MultipartBody::new()
        .text("full_name", "Should Not Stick")
        .file("cover_image", "cover.gif", "image/gif", b"GIF? no")
        .into_request(Method::PUT, "/api/profiles/me", Some(&app.token_for(&user)));
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.repo.get_profile_by_user(user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_profile_update_discards_avatar_when_cover_fails() {
    // One media record may be written: the avatar's. The cover's is refused.
    let app = TestApp::with_media_record_limit(1);
    let user = app.seed_user("reader").await;

    let request = MultipartBody::new()
        .file("avatar", "face.png", "image/png", &png(300, 300))
        .file("cover_image", "cover.png", "image/png", &png(900, 300))
        .into_request(Method::PUT, "/api/profiles/me", Some(&app.token_for(&user)));
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(app.repo.list_media_by_user(user.id).await.unwrap().is_empty());
    assert_eq!(common::count_files(app.upload_dir.path()), 0);
    let profile = app.repo.get_profile_by_user(user.id).await.unwrap().unwrap();
    assert!(profile.avatar_id.is_none());
    assert!(profile.cover_image_id.is_none());
}

// --- Surface ---

#[tokio::test]
async fn test_health_and_docs() {
    let app = TestApp::new();

    let (status, body) = app.send_raw(empty_request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");

    let (status, doc) = app
        .send(empty_request(Method::GET, "/api-docs/openapi.json", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/posts"].is_object());
    assert!(doc["paths"]["/api/auth/register"].is_object());
}

#[tokio::test]
async fn test_uploaded_files_are_served() {
    let app = TestApp::new();
    let user = app.seed_user("reader").await;
    let media = upload(&app, &user).await;

    let url = media["url"].as_str().unwrap();
    let path = url.strip_prefix(common::BASE_URL).unwrap();
    let (status, bytes) = app.send_raw(empty_request(Method::GET, path, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes.len() as u64, media["size"].as_u64().unwrap());
}
