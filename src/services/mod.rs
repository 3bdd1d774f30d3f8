pub mod carts;
pub mod categories;
pub mod files;
pub mod orders;
pub mod products;
pub mod users;
