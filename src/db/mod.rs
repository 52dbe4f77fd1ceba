pub mod connection;
pub mod listings;
pub mod schema;
pub mod scrapes;

pub use connection::Database;
pub use schema::init_db;
