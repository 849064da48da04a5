pub mod error;
pub mod ordered;
pub mod record_set;
pub mod traits;

pub use error::StorageError;
pub use ordered::OrderedRecordStore;
pub use record_set::RecordSet;
pub use traits::*;
