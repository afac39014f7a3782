mod registry;
pub use self::registry::RegistryType;

mod content;
pub use self::content::{DocumentType, RecordContent};
