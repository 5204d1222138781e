//! Vector index services and the bound `VectorStore` writer/reader.

pub mod lance;
pub mod memory;
pub mod schema;
pub mod store;
pub mod table;

pub use lance::LanceVectorIndex;
pub use memory::MemoryVectorIndex;
pub use store::VectorStore;

use mmvec_core::{Error, Result};

/// Bucket and index names double as directory and table names.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("invalid {kind} name '{name}'")))
    }
}
