use missionsync_core::{Category, CoreError, RecordKey};
use missionsync_storage::{StorageError, SyncState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("cannot {operation} {category:?} {key}: record is {from:?}")]
    InvalidStateTransition {
        category: Category,
        key: RecordKey,
        from: SyncState,
        operation: &'static str,
    },

    #[error("{category:?} not found: {key}")]
    RecordNotFound { category: Category, key: RecordKey },

    #[error("vehicle did not deliver the content of {category:?} {key}")]
    RemoteContentUnavailable { category: Category, key: RecordKey },

    #[error("{operation} is not supported for {category:?} records")]
    UnsupportedCategory {
        category: Category,
        operation: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("mutation queue is closed")]
    QueueClosed,

    #[error("failed to start queue worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("queue worker panicked")]
    WorkerPanicked,
}

/// Problem with a single snapshot item. Recorded on the merge report; the rest of
/// the snapshot is still absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeIssue {
    #[error("unresolvable remote {category:?} at position {position}: {reason}")]
    UnresolvableRemoteItem {
        category: Category,
        position: usize,
        reason: String,
    },

    #[error("comparing {category:?} {key} failed: {reason}")]
    ComparatorFailure {
        category: Category,
        key: RecordKey,
        reason: String,
    },
}
