use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::binder::{parse_id, Bound, BoundQuery};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::{NewUser, User, UserUpdate};
use crate::validation::{Validate, ValidationErrors};

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FilteredUsers {
    pub filter_name: String,
    pub users: Vec<User>,
}

/// GET /users - every user in insertion order
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.users.list().await))
}

/// GET /users/filter?name= - users whose name contains the filter
pub async fn filter(
    State(state): State<AppState>,
    BoundQuery(query): BoundQuery<UserFilter>,
) -> ApiResult<FilteredUsers> {
    let filter_name = query.name.unwrap_or_default();
    let users = state.users.filter_by_name(&filter_name).await;

    Ok(ApiResponse::success(FilteredUsers { filter_name, users }))
}

/// GET /users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let id = parse_id(&id)?;
    let user = state.users.get(id).await?;
    Ok(ApiResponse::success(user))
}

/// POST /users - JSON or form body
pub async fn create(
    State(state): State<AppState>,
    Bound(new_user): Bound<NewUser>,
) -> ApiResult<User> {
    let new_user = NewUser {
        name: new_user.name.trim().to_string(),
        email: new_user.email.trim().to_string(),
    };

    if state.config.api.validate_input {
        new_user.validate()?;
    }

    let user = state.users.create(new_user).await;
    tracing::info!("User {} created", user.id);
    Ok(ApiResponse::created(user))
}

/// PUT /users/:id - multipart form with optional `name` and required `avatar` file
pub async fn update_with_avatar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<User> {
    let id = parse_id(&id)?;
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Multipart rejected: {}", rejection);
        ApiError::bad_request("Expected a multipart form")
    })?;

    let mut name: Option<String> = None;
    let mut avatar: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => {
                name = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("avatar") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                avatar = Some((file_name, bytes.to_vec()));
            }
            other => {
                tracing::debug!("Ignoring multipart field {:?}", other);
            }
        }
    }

    let (file_name, bytes) = avatar.ok_or_else(|| ApiError::bad_request("Avatar upload failed"))?;

    let name = match name {
        Some(name) => {
            let name = name.trim().to_string();
            let mut errors = ValidationErrors::default();
            crate::validation::require(&mut errors, "name", &name);
            errors.into_result()?;
            Some(name)
        }
        None => None,
    };

    // Check before writing so unknown ids leave no files behind
    if !state.users.exists(id).await {
        return Err(ApiError::not_found("User not found"));
    }

    let stored = state.avatars.save(id, &file_name, &bytes).await?;
    let user = state
        .users
        .update(
            id,
            UserUpdate {
                name,
                avatar: Some(stored.key),
            },
        )
        .await?;

    Ok(ApiResponse::success(user))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the size limit")
    } else {
        tracing::debug!("Multipart read failed: {}", err.body_text());
        ApiError::bad_request("Invalid multipart form")
    }
}
