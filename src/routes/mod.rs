use anyhow::Context;
use axum::{
    body::Bytes,
    extract::Multipart,
    http::header,
    response::{IntoResponse, Response},
};

use crate::{common::app_error::AppError, services::files};

pub mod carts;
pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

/// Pull the file named `field_name` out of a multipart upload.
pub(crate) async fn read_upload(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| AppError::bad_request(format!("Field {} carries no file name", field_name)))?;
        let bytes = field
            .bytes()
            .await
            .context("Failed to read uploaded file")?;
        return Ok((file_name, bytes));
    }

    Err(AppError::bad_request(format!(
        "Missing multipart field {}",
        field_name
    )))
}

/// Raw image body with a content type derived from its stored name.
pub(crate) fn image_response(name: &str, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, files::content_type(name))], bytes).into_response()
}

#[cfg(test)]
pub(crate) mod test_support {
    use testresult::TestResult;
    use utoipa_axum::router::OpenApiRouter;

    use crate::common::{app_state::AppState, bootstrap::build_app, config, db};

    /// App wired to a pool that never connects; only requests rejected before any query are usable.
    pub fn offline_app(routes: OpenApiRouter<AppState>) -> TestResult<axum::Router> {
        let config = config::load_from(|key| match key {
            "DATABASE_URL" => Some("postgres://nobody@127.0.0.1:1/none".into()),
            _ => None,
        })?;
        let pool = db::connect_lazy(&config.database);
        let (router, _) = routes.split_for_parts();
        Ok(build_app(router, AppState::new(pool, config)))
    }
}
