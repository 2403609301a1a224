//! Live entity set and scope-partitioned projections
//!
//! The store owns every [`IndexedEntity`] currently searchable. Each bulk
//! mutation rebuilds the match-ready projections ("hot arrays") from scratch and
//! publishes them with a single pointer swap, so a reader either sees the
//! complete previous snapshot or the complete new one, never a partial rebuild.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::matcher::acronym::hump_string;
use crate::matcher::fuzzy::PreparedText;
use crate::matcher::typo::typo_target;
use crate::models::{IndexedEntity, Scope};
use strum::IntoEnumIterator;

/// An entity with its matching artifacts precomputed
#[derive(Debug)]
pub struct PreparedEntity {
    pub entity: Arc<IndexedEntity>,
    /// Lowercased name with word-boundary flags
    pub name: PreparedText,
    /// Lowercased fully qualified name, when present
    pub full_name: Option<PreparedText>,
    /// Uppercased first character plus every capital letter of the name
    pub hump: String,
    /// Lowercased name used for edit-distance matching (extension stripped for files)
    pub typo_name: String,
    /// Lowercased name for burst (exact/prefix) matching
    pub name_lower: String,
}

impl PreparedEntity {
    fn new(entity: Arc<IndexedEntity>) -> Self {
        let name = PreparedText::new(&entity.name);
        let full_name = entity.full_name.as_deref().map(PreparedText::new);
        let hump = hump_string(&entity.name);
        let typo_name = typo_target(&entity);
        let name_lower = entity.name.to_lowercase();

        Self {
            entity,
            name,
            full_name,
            hump,
            typo_name,
            name_lower,
        }
    }
}

/// Immutable snapshot of the scope projections
#[derive(Debug, Default)]
pub struct Projections {
    buckets: HashMap<Scope, Vec<Arc<PreparedEntity>>>,
}

impl Projections {
    fn build(items: &[Arc<IndexedEntity>]) -> Self {
        let mut buckets: HashMap<Scope, Vec<Arc<PreparedEntity>>> =
            Scope::iter().map(|scope| (scope, Vec::new())).collect();
        let mut everything = Vec::with_capacity(items.len());

        for item in items {
            let prepared = Arc::new(PreparedEntity::new(Arc::clone(item)));
            buckets
                .entry(item.scope())
                .or_default()
                .push(Arc::clone(&prepared));
            everything.push(prepared);
        }

        buckets.insert(Scope::Everything, everything);
        Self { buckets }
    }

    /// Candidates for a scope; a scope with no members is empty
    pub fn scope(&self, scope: Scope) -> &[Arc<PreparedEntity>] {
        self.buckets.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.scope(Scope::Everything).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owner of the live entity set
///
/// Writers are serialized by the `items` mutex; readers only ever touch the
/// published [`Projections`] snapshot.
#[derive(Default)]
pub struct IndexStore {
    items: Mutex<Vec<Arc<IndexedEntity>>>,
    projections: RwLock<Arc<Projections>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, Vec<Arc<IndexedEntity>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild and publish projections while the writer lock is held
    fn publish(&self, items: &[Arc<IndexedEntity>]) {
        let projections = Arc::new(Projections::build(items));
        *self
            .projections
            .write()
            .unwrap_or_else(PoisonError::into_inner) = projections;
    }

    /// Consistent snapshot for one query
    pub fn snapshot(&self) -> Arc<Projections> {
        Arc::clone(&self.projections.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the full set
    pub fn set_items(&self, entities: Vec<IndexedEntity>) {
        let mut items = self.items();
        *items = entities.into_iter().map(Arc::new).collect();
        self.publish(&items);
        log::debug!("Index store replaced: {} entities", items.len());
    }

    /// Append entities and rebuild every projection
    pub fn add_items(&self, entities: Vec<IndexedEntity>) {
        if entities.is_empty() {
            return;
        }
        let mut items = self.items();
        items.extend(entities.into_iter().map(Arc::new));
        self.publish(&items);
    }

    /// Append only the entities whose id is not live yet; returns how many were added
    pub fn merge_items(&self, entities: Vec<IndexedEntity>) -> usize {
        let mut items = self.items();
        let mut seen: HashSet<String> = items.iter().map(|e| e.id.clone()).collect();

        let before = items.len();
        for entity in entities {
            if seen.insert(entity.id.clone()) {
                items.push(Arc::new(entity));
            }
        }
        let added = items.len() - before;

        if added > 0 {
            self.publish(&items);
        }
        added
    }

    /// Drop every entity owned by a file, including its `File` entity
    pub fn remove_items_by_file(&self, path: &str) -> usize {
        self.remove_where(|e| e.file_path == path)
    }

    /// Drop the declarations of a file but keep its `File` entity
    pub fn remove_symbols_by_file(&self, path: &str) -> usize {
        self.remove_where(|e| e.file_path == path && !e.is_file())
    }

    fn remove_where(&self, predicate: impl Fn(&IndexedEntity) -> bool) -> usize {
        let mut items = self.items();
        let before = items.len();
        items.retain(|e| !predicate(e));
        let removed = before - items.len();

        if removed > 0 {
            self.publish(&items);
        }
        removed
    }

    pub fn clear(&self) {
        let mut items = self.items();
        items.clear();
        *self
            .projections
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(Projections::default());
    }

    pub fn get_item_count(&self) -> usize {
        self.items().len()
    }

    /// Whether any live entity belongs to the path
    pub fn contains_file(&self, path: &str) -> bool {
        self.items().iter().any(|e| e.file_path == path)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.items().iter().any(|e| e.id == id)
    }

    /// Copy of the live set, in insertion order
    pub fn items_snapshot(&self) -> Vec<IndexedEntity> {
        self.items().iter().map(|e| (**e).clone()).collect()
    }

    pub fn entities_for_file(&self, path: &str) -> Vec<IndexedEntity> {
        self.items()
            .iter()
            .filter(|e| e.file_path == path)
            .map(|e| (**e).clone())
            .collect()
    }

    /// Entities declaring that they implement `type_name`
    pub fn find_implementations(&self, type_name: &str) -> Vec<IndexedEntity> {
        self.items()
            .iter()
            .filter(|e| {
                e.implements
                    .as_ref()
                    .is_some_and(|list| list.iter().any(|t| t == type_name))
            })
            .map(|e| (**e).clone())
            .collect()
    }
}
