#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AttemptDraftRecord, AttemptDraftRepository, InMemoryRepository, ProgressCacheRecord,
    ProgressCacheRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
