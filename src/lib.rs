//! Photo catalog
//!
//! An in-memory cache of photos and collections kept consistent with a
//! slower, fallible backend:
//! - `state`       - entity store, data model, SQLite catalog
//! - `gateway`     - async command surface for persistence and media work
//! - `coordinator` - optimistic mutations with rollback
//! - `import`      - staged folder import with per-item isolation
//! - `projection`  - filter/sort over store snapshots
//! - `export`      - batch export through the gateway
//! - `media`       - scan, EXIF, dimensions, thumbnails, resize

pub mod config;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod gateway;
pub mod import;
pub mod media;
pub mod projection;
pub mod state;

pub use config::CatalogConfig;
pub use coordinator::MutationCoordinator;
pub use error::{CatalogError, GatewayError, Result, ValidationError};
pub use gateway::{BackendGateway, LocalGateway};
pub use import::{FixedFolder, FolderSelector, ImportPipeline, ImportReport};
pub use state::data::{Collection, CollectionId, Photo, PhotoId};
pub use state::store::EntityStore;
