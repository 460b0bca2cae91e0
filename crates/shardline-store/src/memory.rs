use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use shardline_types::{MemberToken, Node, Object, RequestContext};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ObjectStore, StoreFactory};

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. Objects are cloned on read/write;
/// content is reference-counted so clones are cheap.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Object>>,
    initialized: AtomicBool,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Whether `init` has been called.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if an object with `id` is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.objects.read().expect("lock poisoned").contains_key(id)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn init(&self, ctx: &RequestContext) -> StoreResult<()> {
        ctx.check()?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn put(&self, ctx: &RequestContext, object: &Object) -> StoreResult<()> {
        ctx.check()?;
        if object.id.is_empty() {
            return Err(StoreError::InvalidArgument("object is empty".into()));
        }
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(object.id.clone(), object.clone());
        Ok(())
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<Option<Object>> {
        ctx.check()?;
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Factory handing out one fresh [`InMemoryObjectStore`] per node.
///
/// Keeps a handle to every store it created so tests can look inside the
/// shard a key was routed to.
#[derive(Default)]
pub struct InMemoryStoreFactory {
    created: Mutex<BTreeMap<MemberToken, Arc<InMemoryObjectStore>>>,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store created for `member`, if any.
    pub fn store_for(&self, member: &str) -> Option<Arc<InMemoryObjectStore>> {
        self.created.lock().expect("lock poisoned").get(member).cloned()
    }

    /// Every store created so far, by member.
    pub fn stores(&self) -> BTreeMap<MemberToken, Arc<InMemoryObjectStore>> {
        self.created.lock().expect("lock poisoned").clone()
    }
}

impl StoreFactory for InMemoryStoreFactory {
    fn create(&self, node: &Node) -> StoreResult<Arc<dyn ObjectStore>> {
        let store = Arc::new(InMemoryObjectStore::new());
        self.created
            .lock()
            .expect("lock poisoned")
            .insert(node.token(), Arc::clone(&store));
        Ok(store)
    }
}
