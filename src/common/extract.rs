use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::common::app_error::AppError;

/// JSON body that has passed its `validator` constraints.
///
/// Malformed payloads (wrong types, missing fields) and constraint violations
/// are both rejected with 422; unreadable bodies are rejected with 400.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
                    AppError::Validation(rejection.body_text())
                } else {
                    AppError::BadRequest(rejection.body_text())
                }
            })?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Field validator rejecting empty or whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(
            validator::ValidationError::new("blank").with_message("must not be blank".into())
        );
    }
    Ok(())
}
