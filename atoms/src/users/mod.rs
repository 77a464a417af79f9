pub mod http;
pub mod model;
pub mod service;

pub use model::{Account, NewAccount, ProfileUpdate, STARTING_CREDITS};
pub use service::*;
