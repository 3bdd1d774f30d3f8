pub mod common;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod schema;
pub mod services;
