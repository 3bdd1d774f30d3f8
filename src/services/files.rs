//! Image file store rooted at a configured directory.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use crate::common::app_error::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// Lower-cased extension of `file_name` including the dot, if it is an accepted image type.
pub fn image_extension(file_name: &str) -> Result<String, AppError> {
    let extension = file_name
        .rfind('.')
        .map(|idx| file_name[idx..].to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        warn!("Invalid file extension: {:?}", extension);
        Err(AppError::bad_request(format!(
            "File with the extension {} is not allowed.",
            if extension.is_empty() { "<none>" } else { extension.as_str() }
        )))
    }
}

pub fn content_type(file_name: &str) -> &'static str {
    match image_extension(file_name).as_deref() {
        Ok(".png") => "image/png",
        Ok(".jpg") | Ok(".jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Join a stored name onto `dir`, refusing anything that is not a bare file name.
fn stored_path(dir: &Path, name: &str) -> Result<PathBuf, AppError> {
    match Path::new(name).file_name() {
        Some(file_name) if file_name == name => Ok(dir.join(file_name)),
        _ => Err(AppError::not_found("Image not found")),
    }
}

/// Store an uploaded image under a generated name and return that name.
pub async fn upload_image(dir: &Path, original_name: &str, bytes: &[u8]) -> Result<String, AppError> {
    info!("Uploading file: {}", original_name);
    let extension = image_extension(original_name)?;
    let generated = format!("{}{}", Uuid::new_v4(), extension);

    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create image folder {}", dir.display()))?;
        info!("Created folder: {}", dir.display());
    }

    tokio::fs::write(dir.join(&generated), bytes)
        .await
        .with_context(|| format!("Failed to save image {}", generated))?;

    info!("File uploaded successfully: {}", generated);
    Ok(generated)
}

pub async fn read_image(dir: &Path, name: &str) -> Result<Vec<u8>, AppError> {
    let path = stored_path(dir, name)?;
    info!("Retrieving resource: {}", path.display());

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(AppError::not_found("Image not found")),
        Err(err) => Err(AppError::Other(
            anyhow::Error::new(err).context(format!("Failed to read image {}", path.display())),
        )),
    }
}

/// Remove a stored image. A file that is already gone is not an error.
pub async fn delete_image(dir: &Path, name: &str) -> Result<(), AppError> {
    let Ok(path) = stored_path(dir, name) else {
        warn!("Refusing to delete suspicious image name: {:?}", name);
        return Ok(());
    };

    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            info!("Image deleted: {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("Image not found in folder: {}", path.display());
            Ok(())
        }
        Err(err) => Err(AppError::Other(
            anyhow::Error::new(err).context(format!("Failed to delete image {}", path.display())),
        )),
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn accepts_known_extensions_in_any_case() -> TestResult {
        assert_eq!(image_extension("photo.PNG")?, ".png");
        assert_eq!(image_extension("archive.tar.jpeg")?, ".jpeg");
        assert_eq!(image_extension("x.jpg")?, ".jpg");
        Ok(())
    }

    #[test]
    fn rejects_other_extensions() {
        assert!(matches!(image_extension("notes.txt"), Err(AppError::BadRequest(_))));
        assert!(matches!(image_extension("no_extension"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type("a.png"), "image/png");
        assert_eq!(content_type("a.JPEG"), "image/jpeg");
        assert_eq!(content_type("a.gif"), "application/octet-stream");
    }

    #[tokio::test]
    async fn upload_then_read_and_delete() -> TestResult {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("nested/users");

        let name = upload_image(&dir, "avatar.PNG", b"not-really-a-png").await?;
        assert!(name.ends_with(".png"));

        let bytes = read_image(&dir, &name).await?;
        assert_eq!(bytes, b"not-really-a-png");

        delete_image(&dir, &name).await?;
        assert!(matches!(read_image(&dir, &name).await, Err(AppError::NotFound(_))));

        // Second delete is a no-op.
        delete_image(&dir, &name).await?;
        Ok(())
    }

    #[tokio::test]
    async fn rejected_upload_writes_nothing() -> TestResult {
        let root = tempfile::tempdir()?;
        let result = upload_image(root.path(), "script.sh", b"#!/bin/sh").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(std::fs::read_dir(root.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn path_traversal_is_refused() -> TestResult {
        let root = tempfile::tempdir()?;
        let result = read_image(root.path(), "../etc/passwd").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        Ok(())
    }
}
