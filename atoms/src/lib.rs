//! Domain atoms for the image studio: accounts, artifacts, purchases and the
//! credit ledger, plus the storage seam they are written against.

pub mod credits;
pub mod error;
pub mod http;
pub mod media;
pub mod pagination;
pub mod purchases;
pub mod store;
pub mod users;

pub use error::AppError;
pub use store::{DynamoStore, MemoryStore, Store};
