mod character;
mod error;
mod types;

pub use character::Character;
pub use error::{CoreError, CoreErrorCode};
pub use types::{AttributeEntry, ItemEntry, Snapshot, Warning};
