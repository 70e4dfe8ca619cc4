pub mod couchdb;
pub mod models;
pub mod qdrant;

mod error;

pub use error::{Error, Result};
