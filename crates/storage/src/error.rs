use thiserror::Error;

use missionsync_core::Category;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record {key} belongs to {actual:?}, store holds {expected:?}")]
    CategoryMismatch {
        key: String,
        expected: Category,
        actual: Category,
    },

    #[error("key {new} does not name record {existing}")]
    KeyMismatch { existing: String, new: String },

    #[error("core error: {0}")]
    Core(#[from] missionsync_core::CoreError),
}
