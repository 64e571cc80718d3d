// ── Generic read-cache repository ──
//
// In-memory storage for one entity kind: lookup by UUID, identifier
// string, or parent UUID. No query language, no joins — hierarchy
// traversal chains parent lookups across repositories.
//
// The lookup tables live behind an `ArcSwap`, so `replace()` installs
// a whole new generation in one atomic store. A concurrent reader
// resolves against either the old tables or the new ones, never a
// half-populated mix. Writers are not synchronized against each
// other; mutation happens only inside a reader load cycle.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use uuid::Uuid;

/// Anything a repository can store: UUID identity plus the small set of
/// indexed fields (identifier string, parent UUID).
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn identifier(&self) -> &str;
    fn parent(&self) -> Option<Uuid>;
}

/// One generation of lookup tables.
#[derive(Clone)]
struct Tables<T> {
    by_id: HashMap<Uuid, Arc<T>>,

    /// Secondary index: identifier string -> UUID. Identifiers are
    /// unique per kind in the relational source.
    by_identifier: HashMap<String, Uuid>,

    /// Secondary index: parent UUID -> child UUIDs.
    by_parent: HashMap<Uuid, Vec<Uuid>>,
}

impl<T> Default for Tables<T> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_identifier: HashMap::new(),
            by_parent: HashMap::new(),
        }
    }
}

impl<T: Record> Tables<T> {
    /// Insert or update a record. Returns `true` if the id was new.
    fn insert(&mut self, record: T) -> bool {
        let id = record.id();

        // Drop stale index entries if the record changed shape.
        if let Some(previous) = self.by_id.get(&id).map(Arc::clone) {
            if previous.identifier() != record.identifier() {
                self.by_identifier.remove(previous.identifier());
            }
            if previous.parent() != record.parent() {
                if let Some(old_parent) = previous.parent() {
                    if let Some(children) = self.by_parent.get_mut(&old_parent) {
                        children.retain(|c| *c != id);
                    }
                }
            }
        }

        let is_new = !self.by_id.contains_key(&id);
        self.by_identifier.insert(record.identifier().to_owned(), id);
        if let Some(parent) = record.parent() {
            let children = self.by_parent.entry(parent).or_default();
            if !children.contains(&id) {
                children.push(id);
            }
        }
        self.by_id.insert(id, Arc::new(record));
        is_new
    }
}

/// In-memory repository for a single entity kind.
pub struct Repository<T: Record> {
    tables: ArcSwap<Tables<T>>,

    /// Full snapshot, republished on mutation for cheap subscription.
    /// The channel outlives table generations, so subscriptions
    /// survive a snapshot reload.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Record> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Repository<T> {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            tables: ArcSwap::from_pointee(Tables::default()),
            snapshot,
        }
    }

    /// Insert or update a record. Returns `true` if the id was new.
    pub fn append(&self, record: T) -> bool {
        let mut tables = Tables::clone(&self.tables.load());
        let is_new = tables.insert(record);
        self.tables.store(Arc::new(tables));
        self.publish();
        is_new
    }

    /// Install a whole new generation in one atomic step. A concurrent
    /// reader sees either the prior contents or all of `records`.
    pub fn replace(&self, records: Vec<T>) {
        let mut tables = Tables::default();
        for record in records {
            tables.insert(record);
        }
        self.tables.store(Arc::new(tables));
        self.publish();
    }

    /// Remove all records and indexes.
    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<T>> {
        self.tables.load().by_id.get(id).map(Arc::clone)
    }

    pub fn find_by_identifier(&self, identifier: &str) -> Option<Arc<T>> {
        let tables = self.tables.load();
        let id = tables.by_identifier.get(identifier)?;
        tables.by_id.get(id).map(Arc::clone)
    }

    pub fn find_by_parent(&self, parent: &Uuid) -> Vec<Arc<T>> {
        let tables = self.tables.load();
        tables
            .by_parent
            .get(parent)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|id| tables.by_id.get(id).map(Arc::clone))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    /// Stream of added/removed deltas against the subscriber's last
    /// observed generation.
    pub fn changes(&self) -> super::ChangeStream<T> {
        super::ChangeStream::new(self.snapshot.subscribe())
    }

    pub fn len(&self) -> usize {
        self.tables.load().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.load().by_id.is_empty()
    }

    fn publish(&self) {
        let values: Vec<Arc<T>> = self.tables.load().by_id.values().map(Arc::clone).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
