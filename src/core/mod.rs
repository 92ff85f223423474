pub mod error;
pub mod types;

pub use error::{LockError, LockTarget, Result};
pub use types::EntityId;
