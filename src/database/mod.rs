pub mod connection;

pub use connection::{create_connection_pool, DbConfig, DbPool};
