pub mod manager;
pub mod models;
pub mod postgres;
pub mod rest;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use postgres::PgStore;
pub use rest::RestStore;
pub use store::{from_row, to_row, Row, RowFilter, StoreError, TableRef, TableStore};
