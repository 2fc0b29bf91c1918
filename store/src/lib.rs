//! Persistent argument store.
//!
//! Compiler argument lists prepared by `buildTarget/prepare` are persisted in SQLite,
//! content-addressed by the SHA-256 of their JSON encoding, so `textDocument/sourceKitOptions`
//! can answer from disk while the build graph is still being recomputed.

mod argument_store;
mod sqlite_security;

pub use argument_store::{
    ArgumentStore, ArgumentsByPath, DATABASE_FILE_NAME, InMemoryArgumentStore,
    SqliteArgumentStore, StoreError,
};
