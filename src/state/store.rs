/// In-memory entity store
///
/// The store is the session-authoritative cache of photos and collections.
/// Every operation takes the table lock exactly once, so readers never see a
/// half-applied write. Writes are announced on a broadcast channel; having no
/// subscribers is fine.
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use super::data::{Collection, CollectionId, Entity, EntityKind, EntityRef, Photo, PhotoId, ViewMode};
use crate::error::{CatalogError, ValidationError};

/// Default capacity of the change-notification channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Change notification published after each successful store write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Replaced(EntityKind),
    Inserted(Vec<EntityRef>),
    Patched(EntityRef),
    Removed(EntityRef),
    /// A removed record was put back (rollback of a deletion)
    Restored(EntityRef),
    SelectionChanged(EntityKind, Option<EntityRef>),
    ViewModeChanged(ViewMode),
    Cleared(EntityKind),
}

struct TableState<T: Entity> {
    items: Vec<T>,
    selected: Option<T::Id>,
}

impl<T: Entity> TableState<T> {
    fn position(&self, id: T::Id) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }
}

/// Ordered table of one entity kind plus its selection pointer
pub struct EntityTable<T: Entity> {
    inner: RwLock<TableState<T>>,
    events: broadcast::Sender<StoreEvent>,
}

impl<T: Entity> EntityTable<T> {
    fn new(events: broadcast::Sender<StoreEvent>) -> Self {
        Self {
            inner: RwLock::new(TableState {
                items: Vec::new(),
                selected: None,
            }),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TableState<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableState<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // Ignore send errors (no receivers)
        let _ = self.events.send(event);
    }

    /// Replace the whole table. The selection survives only if its target does.
    ///
    /// Fails without touching the table if an id repeats in the input.
    pub fn replace_all(&self, entities: Vec<T>) -> Result<(), CatalogError> {
        let mut seen = HashSet::with_capacity(entities.len());
        if let Some(repeated) = entities.iter().find(|entity| !seen.insert(entity.id())) {
            return Err(ValidationError::DuplicateId {
                kind: T::KIND,
                id: repeated.id().to_string(),
            }
            .into());
        }

        let selection_cleared = {
            let mut state = self.write();
            state.items = entities;
            let stale = state
                .selected
                .is_some_and(|id| state.position(id).is_none());
            if stale {
                state.selected = None;
            }
            stale
        };

        self.emit(StoreEvent::Replaced(T::KIND));
        if selection_cleared {
            self.emit(StoreEvent::SelectionChanged(T::KIND, None));
        }
        Ok(())
    }

    /// Append entities in input order
    ///
    /// Fails without touching the table if any id is already present or
    /// repeated in the input. Empty input is a no-op.
    pub fn insert_many(&self, entities: Vec<T>) -> Result<(), CatalogError> {
        if entities.is_empty() {
            return Ok(());
        }

        let refs = {
            let mut state = self.write();

            let mut seen: HashSet<T::Id> = state.items.iter().map(Entity::id).collect();
            for entity in &entities {
                if !seen.insert(entity.id()) {
                    return Err(ValidationError::DuplicateId {
                        kind: T::KIND,
                        id: entity.id().to_string(),
                    }
                    .into());
                }
            }

            let refs: Vec<EntityRef> = entities.iter().map(|e| T::entity_ref(e.id())).collect();
            state.items.extend(entities);
            refs
        };

        self.emit(StoreEvent::Inserted(refs));
        Ok(())
    }

    /// Merge a partial update. Returns false (and does nothing) if the id is absent.
    pub fn patch_by_id(&self, id: T::Id, patch: &T::Patch) -> bool {
        let patched = {
            let mut state = self.write();
            match state.items.iter_mut().find(|item| item.id() == id) {
                Some(item) => {
                    item.apply(patch);
                    true
                }
                None => false,
            }
        };

        if patched {
            self.emit(StoreEvent::Patched(T::entity_ref(id)));
        }
        patched
    }

    /// Remove an entity, clearing the selection if it pointed at it
    pub fn remove_by_id(&self, id: T::Id) -> Option<T> {
        let (removed, selection_cleared) = {
            let mut state = self.write();
            let index = state.position(id)?;
            let removed = state.items.remove(index);
            let selection_cleared = state.selected == Some(id);
            if selection_cleared {
                state.selected = None;
            }
            (removed, selection_cleared)
        };

        self.emit(StoreEvent::Removed(T::entity_ref(id)));
        if selection_cleared {
            self.emit(StoreEvent::SelectionChanged(T::KIND, None));
        }
        Some(removed)
    }

    /// Put a previously removed entity back at `index` (clamped to the table length)
    pub fn restore(&self, index: usize, entity: T) -> Result<(), CatalogError> {
        let id = entity.id();
        {
            let mut state = self.write();
            if state.position(id).is_some() {
                return Err(ValidationError::DuplicateId {
                    kind: T::KIND,
                    id: id.to_string(),
                }
                .into());
            }
            let index = index.min(state.items.len());
            state.items.insert(index, entity);
        }

        self.emit(StoreEvent::Restored(T::entity_ref(id)));
        Ok(())
    }

    pub fn select(&self, id: Option<T::Id>) {
        {
            let mut state = self.write();
            if state.selected == id {
                return;
            }
            state.selected = id;
        }
        self.emit(StoreEvent::SelectionChanged(T::KIND, id.map(T::entity_ref)));
    }

    pub fn clear(&self) {
        {
            let mut state = self.write();
            state.items.clear();
            state.selected = None;
        }
        self.emit(StoreEvent::Cleared(T::KIND));
    }

    pub fn by_id(&self, id: T::Id) -> Option<T> {
        self.read().items.iter().find(|item| item.id() == id).cloned()
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.read().position(id).is_some()
    }

    pub fn position(&self, id: T::Id) -> Option<usize> {
        self.read().position(id)
    }

    pub fn selected_id(&self) -> Option<T::Id> {
        self.read().selected
    }

    pub fn selected(&self) -> Option<T> {
        let state = self.read();
        let id = state.selected?;
        state.items.iter().find(|item| item.id() == id).cloned()
    }

    /// Point-in-time copy of the table, in store order
    pub fn snapshot(&self) -> Vec<T> {
        self.read().items.clone()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }
}

/// The catalog cache: photos, collections and the view mode
///
/// Constructed explicitly and shared by `Arc` with the components that need it.
pub struct EntityStore {
    photos: EntityTable<Photo>,
    collections: EntityTable<Collection>,
    view_mode: RwLock<ViewMode>,
    events: broadcast::Sender<StoreEvent>,
}

impl EntityStore {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            photos: EntityTable::new(events.clone()),
            collections: EntityTable::new(events.clone()),
            view_mode: RwLock::new(ViewMode::default()),
            events,
        }
    }

    pub fn photos(&self) -> &EntityTable<Photo> {
        &self.photos
    }

    pub fn collections(&self) -> &EntityTable<Collection> {
        &self.collections
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn view_mode(&self) -> ViewMode {
        *self.view_mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        *self.view_mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
        let _ = self.events.send(StoreEvent::ViewModeChanged(mode));
    }

    pub fn photo(&self, id: PhotoId) -> Option<Photo> {
        self.photos.by_id(id)
    }

    pub fn collection(&self, id: CollectionId) -> Option<Collection> {
        self.collections.by_id(id)
    }

    /// Collections whose membership includes the photo
    pub fn collections_for_photo(&self, photo_id: PhotoId) -> Vec<Collection> {
        self.collections
            .snapshot()
            .into_iter()
            .filter(|collection| collection.contains(photo_id))
            .collect()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("photos", &self.photos.len())
            .field("collections", &self.collections.len())
            .field("view_mode", &self.view_mode())
            .finish()
    }
}
