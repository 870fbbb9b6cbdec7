/// Optimistic mutations
///
/// Every mutation is applied to the store first and then confirmed with the
/// gateway. If confirmation fails, the fields the mutation touched are put
/// back to exactly what they were and the backend error is returned.
///
/// Idle -> Applied -> Confirmed
///                 -> RolledBack
use std::future::Future;
use std::sync::Arc;

use crate::error::{CatalogError, GatewayResult, Result, ValidationError};
use crate::gateway::BackendGateway;
use crate::state::data::{
    Collection, CollectionId, CollectionPatch, EntityKind, EntityRef, PhotoId,
};
use crate::state::metadata::MetadataUpdate;
use crate::state::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Applied,
    Confirmed,
    RolledBack,
}

pub struct MutationCoordinator {
    store: Arc<EntityStore>,
    gateway: Arc<dyn BackendGateway>,
}

impl MutationCoordinator {
    pub fn new(store: Arc<EntityStore>, gateway: Arc<dyn BackendGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Await the confirm call; on failure run `rollback` and surface the error
    async fn confirm<F, R>(&self, op: &'static str, target: EntityRef, request: F, rollback: R) -> Result<()>
    where
        F: Future<Output = GatewayResult<()>>,
        R: FnOnce(),
    {
        tracing::trace!(op, ?target, state = ?MutationState::Applied);

        match request.await {
            Ok(()) => {
                tracing::debug!(op, ?target, state = ?MutationState::Confirmed);
                Ok(())
            }
            Err(err) => {
                rollback();
                tracing::warn!(op, ?target, state = ?MutationState::RolledBack, "❌ {}", err);
                Err(CatalogError::Backend(err))
            }
        }
    }

    /// Edit a photo's metadata
    ///
    /// Ratings above 5 are rejected before anything is written. An update
    /// that carries no field succeeds without touching the store or the gateway.
    pub async fn update_metadata(&self, photo_id: PhotoId, update: MetadataUpdate) -> Result<()> {
        let patch = update.into_patch()?;

        let photo = self
            .store
            .photo(photo_id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Photo, photo_id))?;

        if patch.is_empty() {
            return Ok(());
        }

        let snapshot = patch.snapshot_of(&photo.metadata);
        self.store.photos().patch_by_id(photo_id, &patch);

        self.confirm(
            "update_metadata",
            EntityRef::Photo(photo_id),
            self.gateway.update_metadata(photo_id, &patch),
            || {
                self.store.photos().patch_by_id(photo_id, &snapshot);
            },
        )
        .await
    }

    /// Flip the favorite flag, returning the new value
    pub async fn toggle_favorite(&self, photo_id: PhotoId) -> Result<bool> {
        let photo = self
            .store
            .photo(photo_id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Photo, photo_id))?;

        let favorite = !photo.metadata.favorite;
        self.update_metadata(photo_id, MetadataUpdate::favorite(favorite))
            .await?;
        Ok(favorite)
    }

    pub async fn add_to_collection(&self, collection_id: CollectionId, photo_id: PhotoId) -> Result<()> {
        let collection = self.existing_collection(collection_id)?;
        let before = collection.photo_ids.clone();

        let mut after = collection;
        if after.add_member(photo_id) {
            self.store
                .collections()
                .patch_by_id(collection_id, &CollectionPatch::members(after.photo_ids));
        }

        self.confirm(
            "add_to_collection",
            EntityRef::Collection(collection_id),
            self.gateway.add_to_collection(collection_id, photo_id),
            || self.restore_members(collection_id, before),
        )
        .await
    }

    pub async fn remove_from_collection(
        &self,
        collection_id: CollectionId,
        photo_id: PhotoId,
    ) -> Result<()> {
        let collection = self.existing_collection(collection_id)?;
        let before = collection.photo_ids.clone();

        let mut after = collection;
        if after.remove_member(photo_id) {
            self.store
                .collections()
                .patch_by_id(collection_id, &CollectionPatch::members(after.photo_ids));
        }

        self.confirm(
            "remove_from_collection",
            EntityRef::Collection(collection_id),
            self.gateway.remove_from_collection(collection_id, photo_id),
            || self.restore_members(collection_id, before),
        )
        .await
    }

    /// Delete a collection; a failed confirm puts it back where it was,
    /// selection included
    pub async fn delete_collection(&self, collection_id: CollectionId) -> Result<()> {
        let table = self.store.collections();
        let index = table
            .position(collection_id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Collection, collection_id))?;
        let was_selected = table.selected_id() == Some(collection_id);

        let removed = table
            .remove_by_id(collection_id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Collection, collection_id))?;

        self.confirm(
            "delete_collection",
            EntityRef::Collection(collection_id),
            self.gateway.delete_collection(collection_id),
            || {
                if let Err(err) = table.restore(index, removed) {
                    tracing::error!("Failed to restore collection {}: {}", collection_id, err);
                    return;
                }
                if was_selected {
                    table.select(Some(collection_id));
                }
            },
        )
        .await
    }

    /// Create a collection. Not optimistic: the backend assigns the id.
    pub async fn create_collection(&self, name: &str) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let record = self.gateway.create_collection(name).await?;
        let collection = Collection::from_record(record, Vec::new());
        self.store.collections().insert_many(vec![collection.clone()])?;

        tracing::info!("📁 Created collection '{}' ({})", collection.name, collection.id);
        Ok(collection)
    }

    /// Replace the store's collections with the backend's, memberships included
    pub async fn load_collections(&self) -> Result<usize> {
        let records = self.gateway.list_collections().await?;

        let mut collections = Vec::with_capacity(records.len());
        for record in records {
            let members = self.gateway.photos_in_collection(record.id).await?;
            let photo_ids = members.into_iter().map(|photo| photo.id).collect();
            collections.push(Collection::from_record(record, photo_ids));
        }

        let count = collections.len();
        self.store.collections().replace_all(collections)?;
        Ok(count)
    }

    fn existing_collection(&self, collection_id: CollectionId) -> Result<Collection> {
        self.store
            .collection(collection_id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Collection, collection_id))
    }

    fn restore_members(&self, collection_id: CollectionId, photo_ids: Vec<PhotoId>) {
        self.store
            .collections()
            .patch_by_id(collection_id, &CollectionPatch::members(photo_ids));
    }
}
