/// State management module
///
/// This module handles all catalog state, including:
/// - The in-memory entity store and its change events (store.rs)
/// - Shared data structures (data.rs)
/// - Editable photo metadata and patches (metadata.rs)
/// - Database connections and queries (library.rs)

pub mod data;
pub mod library;
pub mod metadata;
pub mod store;
