use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use super::{ValidJson, remove_media};
use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{UpdateRoleRequest, User},
};

/// list_users
///
/// [Admin Route] Every account, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.repo.list_users().await?))
}

/// update_user_role
///
/// [Admin Route] Changes a user's role. Tokens already issued keep the old role
/// until they expire; the new role applies from the user's next login.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Unknown role"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .repo
        .update_user_role(id, payload.role.as_str())
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    tracing::info!(user_id = %user.id, role = %user.role, "role changed");
    Ok(Json(user))
}

/// delete_user
///
/// [Admin Route] Deletes an account and its profile. The user's uploaded files
/// are removed first, each together with its record. If any original cannot be
/// removed the account is kept and 500 returned, so no record is lost while its
/// file is still on disk; repeating the request retries what is left.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found"),
        (status = 500, description = "Some media files could not be removed")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.repo.get_user(id).await?.is_none() {
        return Err(ApiError::NotFound("user"));
    }

    let mut failures = Vec::new();
    for media in state.repo.list_media_by_user(id).await? {
        if let Err(e) = remove_media(&state, &media).await {
            tracing::warn!(user_id = %id, media_id = %media.id, error = %e, "failed to delete user media");
            failures.push(media.id);
        }
    }
    if !failures.is_empty() {
        return Err(ApiError::Storage(format!(
            "{} media item(s) of user {id} could not be removed",
            failures.len()
        )));
    }

    if !state.repo.delete_user(id).await? {
        return Err(ApiError::NotFound("user"));
    }
    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
