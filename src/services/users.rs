use std::path::Path;

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, TextExpressionMethods,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{app_error::AppError, extract::not_blank},
    models::{CreateUserEntity, UpdateUserEntity, UserEntity},
    pagination::{PageRequest, PageableResponse, sort_boxed},
    schema::users,
    services::files,
};

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct CreateUserReq {
    #[validate(length(min = 3, max = 20, message = "Invalid Name"))]
    pub name: String,
    #[validate(email(message = "Invalid user email"), length(max = 255))]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    #[validate(length(min = 4, max = 6, message = "Invalid Gender"))]
    pub gender: String,
    #[validate(custom(function = "not_blank"))]
    pub about: String,
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub image_name: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct UpdateUserReq {
    #[validate(length(min = 3, max = 20, message = "Invalid Name"))]
    pub name: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    #[validate(length(min = 4, max = 6, message = "Invalid Gender"))]
    pub gender: String,
    #[validate(custom(function = "not_blank"))]
    pub about: String,
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub image_name: Option<String>,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("Failed to hash password: {}", err)))
}

pub async fn find_user(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<UserEntity, AppError> {
    users::table
        .find(user_id)
        .select(UserEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("User not found with given id: {}", user_id)))
}

pub async fn create_user(
    conn: &mut AsyncPgConnection,
    request: CreateUserReq,
) -> Result<UserEntity, AppError> {
    info!("Creating user: {}", request.name);

    let user = diesel::insert_into(users::table)
        .values(CreateUserEntity {
            id: Uuid::new_v4(),
            password: hash_password(&request.password)?,
            name: request.name,
            email: request.email,
            gender: request.gender,
            about: request.about,
            image_name: request.image_name,
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await?;

    info!("User created: {}", user.id);
    Ok(user)
}

pub async fn update_user(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    request: UpdateUserReq,
) -> Result<UserEntity, AppError> {
    info!("Updating user: {}", user_id);

    let user = diesel::update(users::table.find(user_id))
        .set(UpdateUserEntity {
            password: hash_password(&request.password)?,
            name: request.name,
            gender: request.gender,
            about: request.about,
            image_name: request.image_name,
        })
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("User not found with given id: {}", user_id)))?;

    info!("User updated: {}", user.id);
    Ok(user)
}

/// Delete a user, their profile image, and (by cascade) their cart and orders.
pub async fn delete_user(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    image_dir: &Path,
) -> Result<(), AppError> {
    info!("Deleting user: {}", user_id);

    let user = find_user(conn, user_id).await?;
    if let Some(image_name) = &user.image_name {
        files::delete_image(image_dir, image_name).await?;
    }

    diesel::delete(users::table.find(user.id))
        .execute(conn)
        .await?;

    info!("User deleted: {}", user_id);
    Ok(())
}

pub async fn get_all_users(
    conn: &mut AsyncPgConnection,
    page: &PageRequest,
) -> Result<PageableResponse<UserEntity>, AppError> {
    let query = users::table.select(UserEntity::as_select()).into_boxed();
    let query = sort_boxed!(query, page, {
        "name" => users::name,
        "email" => users::email,
        "gender" => users::gender,
        "created_at" => users::created_at,
    })?;

    let rows: Vec<UserEntity> = query
        .then_order_by(users::id.asc())
        .limit(page.page_size)
        .offset(page.offset())
        .get_results(conn)
        .await?;
    let total: i64 = users::table.count().get_result(conn).await?;

    Ok(PageableResponse::from_rows(rows, total, page, |user| user))
}

pub async fn get_user_by_email(
    conn: &mut AsyncPgConnection,
    email: &str,
) -> Result<UserEntity, AppError> {
    users::table
        .filter(users::email.eq(email))
        .select(UserEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("User not found with given email"))
}

/// Users whose name contains `keyword` (case-sensitive substring).
pub async fn search_users(
    conn: &mut AsyncPgConnection,
    keyword: &str,
) -> Result<Vec<UserEntity>, AppError> {
    let found = users::table
        .filter(users::name.like(format!("%{}%", escape_like(keyword))))
        .order(users::name.asc())
        .select(UserEntity::as_select())
        .get_results(conn)
        .await?;
    Ok(found)
}

pub async fn set_image(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    image_name: &str,
) -> Result<UserEntity, AppError> {
    let user = diesel::update(users::table.find(user_id))
        .set(users::image_name.eq(image_name))
        .returning(UserEntity::as_returning())
        .get_result(conn)
        .await?;
    Ok(user)
}

/// Escape `LIKE` wildcards so user input matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use argon2::{PasswordHash, PasswordVerifier};
    use testresult::TestResult;

    use super::*;

    fn valid_request() -> CreateUserReq {
        CreateUserReq {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            password: "analytical".into(),
            gender: "female".into(),
            about: "First programmer".into(),
            image_name: None,
        }
    }

    #[test]
    fn valid_user_passes_validation() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn malformed_fields_are_reported() {
        let request = CreateUserReq {
            name: "Al".into(),
            email: "not-an-email".into(),
            image_name: Some(" ".into()),
            ..valid_request()
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("image_name"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn email_and_image_name_fit_their_columns() {
        let request = CreateUserReq {
            email: format!("{}@example.com", "a".repeat(250)),
            image_name: Some(format!("{}.png", "i".repeat(252))),
            ..valid_request()
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("image_name"));
    }

    #[test]
    fn password_hash_verifies() -> TestResult {
        let hash = hash_password("s3cret")?;
        let parsed = PasswordHash::new(&hash).unwrap();

        assert!(Argon2::default().verify_password(b"s3cret", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
        Ok(())
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
