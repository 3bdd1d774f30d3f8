use anyhow::Context;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    common::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        extract::ValidatedJson,
    },
    models::UserEntity,
    pagination::{PageQuery, PageableResponse, SortDirection},
    routes::{image_response, read_upload},
    services::{
        files,
        users::{self, CreateUserReq, UpdateUserReq},
    },
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/users",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_user, get_all_users))
            .routes(utoipa_axum::routes!(get_user, update_user, delete_user))
            .routes(utoipa_axum::routes!(get_user_by_email))
            .routes(utoipa_axum::routes!(search_users))
            .routes(utoipa_axum::routes!(upload_user_image, serve_user_image)),
    )
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct UserImageForm {
    #[schema(value_type = String, format = Binary)]
    user_image: Vec<u8>,
}

/// Register a new user.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Users"],
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = StdResponse<UserEntity, String>),
        (status = 422, description = "Invalid user fields")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateUserReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = users::create_user(conn, body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(user),
            message: Some("User created successfully"),
        },
    ))
}

/// Replace the profile of an existing user.
#[utoipa::path(
    put,
    path = "/{id}",
    tags = ["Users"],
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserReq,
    responses(
        (status = 200, description = "User updated", body = StdResponse<UserEntity, String>),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<UpdateUserReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = users::update_user(conn, id, body).await?;

    Ok(StdResponse {
        data: Some(user),
        message: Some("User updated successfully"),
    })
}

/// Delete a user along with their cart, orders and profile image.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Users"],
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    users::delete_user(conn, id, &state.config.images.user_dir).await?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("User is deleted successfully"),
    })
}

#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Users"],
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = StdResponse<UserEntity, String>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = users::find_user(conn, id).await?;

    Ok(StdResponse {
        data: Some(user),
        message: None::<String>,
    })
}

/// Page through all users, sorted by name unless asked otherwise.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Users"],
    params(PageQuery),
    responses(
        (status = 200, description = "One page of users", body = StdResponse<PageableResponse<UserEntity>, String>),
        (status = 400, description = "Invalid paging or sort field")
    )
)]
pub async fn get_all_users(
    Query(page): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = page.resolve("name", SortDirection::Asc)?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let users = users::get_all_users(conn, &page).await?;

    Ok(StdResponse {
        data: Some(users),
        message: None::<String>,
    })
}

#[utoipa::path(
    get,
    path = "/email/{email}",
    tags = ["Users"],
    params(("email" = String, Path, description = "Exact email address")),
    responses(
        (status = 200, description = "User found", body = StdResponse<UserEntity, String>),
        (status = 404, description = "No user with that email")
    )
)]
pub async fn get_user_by_email(
    Path(email): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = users::get_user_by_email(conn, &email).await?;

    Ok(StdResponse {
        data: Some(user),
        message: None::<String>,
    })
}

#[utoipa::path(
    get,
    path = "/search/{keyword}",
    tags = ["Users"],
    params(("keyword" = String, Path, description = "Substring of the user name")),
    responses(
        (status = 200, description = "Matching users", body = StdResponse<Vec<UserEntity>, String>)
    )
)]
pub async fn search_users(
    Path(keyword): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let users = users::search_users(conn, &keyword).await?;

    Ok(StdResponse {
        data: Some(users),
        message: None::<String>,
    })
}

/// Upload a profile image under the `userImage` multipart field.
#[utoipa::path(
    post,
    path = "/image/{id}",
    tags = ["Users"],
    params(("id" = Uuid, Path, description = "User ID")),
    request_body(content = UserImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = StdResponse<UserEntity, String>),
        (status = 400, description = "Unsupported file type"),
        (status = 404, description = "User not found")
    )
)]
pub async fn upload_user_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (file_name, bytes) = read_upload(multipart, "userImage").await?;
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = users::find_user(conn, id).await?;
    let dir = &state.config.images.user_dir;
    let stored = files::upload_image(dir, &file_name, &bytes).await?;
    let updated = users::set_image(conn, user.id, &stored).await?;

    if let Some(previous) = user.image_name.filter(|previous| *previous != stored) {
        files::delete_image(dir, &previous).await?;
    }
    info!("User {} image set to {}", updated.id, stored);

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(updated),
            message: Some("Image uploaded successfully"),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/image/{id}",
    tags = ["Users"],
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Image bytes", body = Vec<u8>, content_type = "image/*"),
        (status = 404, description = "User or image not found")
    )
)]
pub async fn serve_user_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = users::find_user(conn, id).await?;
    let name = user
        .image_name
        .ok_or_else(|| AppError::not_found("User has no image"))?;
    let bytes = files::read_image(&state.config.images.user_dir, &name).await?;

    Ok(image_response(&name, bytes))
}
