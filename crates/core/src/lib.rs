pub mod compare;
pub mod content;
pub mod digest;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod snapshot;

pub use compare::{ContentComparator, Tolerance};
pub use content::*;
pub use digest::{Blake3Digester, Digester};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use snapshot::{LocalSnapshot, RemoteSnapshot};
