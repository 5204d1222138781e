pub mod config;
pub mod corpus;
pub mod error;
pub mod location;
pub mod object_store;
pub mod records;
pub mod request;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use location::ObjectLocation;
