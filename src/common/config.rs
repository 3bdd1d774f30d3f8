use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow};

use crate::services::carts::QuantityMerge;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub images: ImageConfig,
    pub cart: CartConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body in bytes; bounds image uploads.
    pub body_limit: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub user_dir: PathBuf,
    pub product_dir: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct CartConfig {
    pub quantity_merge: QuantityMerge,
}

/// Load configuration from the process environment.
pub fn load() -> Result<AppConfig> {
    load_from(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary key lookup.
pub fn load_from<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

    Ok(AppConfig {
        server: ServerConfig {
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            body_limit: parse_or(&lookup, "SERVER_BODY_LIMIT", 10 * 1024 * 1024)?,
        },
        database: DatabaseConfig {
            url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
        },
        images: ImageConfig {
            user_dir: lookup("USER_IMAGE_PATH")
                .unwrap_or_else(|| "images/users/".into())
                .into(),
            product_dir: lookup("PRODUCT_IMAGE_PATH")
                .unwrap_or_else(|| "images/products/".into())
                .into(),
        },
        cart: CartConfig {
            quantity_merge: parse_or(&lookup, "CART_QUANTITY_MERGE", QuantityMerge::Replace)?,
        },
    })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("Invalid value {:?} for {}: {}", raw, key, err)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use testresult::TestResult;

    use super::*;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() -> TestResult {
        let config = load_from(lookup_in(&[("DATABASE_URL", "postgres://localhost/store")]))?;

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.images.user_dir, PathBuf::from("images/users/"));
        assert_eq!(config.cart.quantity_merge, QuantityMerge::Replace);
        Ok(())
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(load_from(lookup_in(&[])).is_err());
    }

    #[test]
    fn overrides_are_parsed() -> TestResult {
        let config = load_from(lookup_in(&[
            ("DATABASE_URL", "postgres://db/store"),
            ("SERVER_PORT", "8080"),
            ("CART_QUANTITY_MERGE", "accumulate"),
            ("PRODUCT_IMAGE_PATH", "/srv/images/products"),
        ]))?;

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cart.quantity_merge, QuantityMerge::Accumulate);
        assert_eq!(
            config.images.product_dir,
            PathBuf::from("/srv/images/products")
        );
        Ok(())
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = load_from(lookup_in(&[
            ("DATABASE_URL", "postgres://db/store"),
            ("SERVER_PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }
}
