use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use shardline_discovery::{DiscoveryError, NodeDiscovery};
use shardline_ring::{HashRing, RingConfig, RingError};
use shardline_store::{ObjectStore, StoreError, StoreFactory, StoreResult};
use shardline_types::{MemberToken, Node, Object, RequestContext};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Shards
// ---------------------------------------------------------------------------

/// Frozen routing state: the ring and one initialized store per ring member.
struct Shards {
    ring: HashRing,
    registry: HashMap<MemberToken, Arc<dyn ObjectStore>>,
}

impl Shards {
    fn build(
        config: RingConfig,
        registry: HashMap<MemberToken, Arc<dyn ObjectStore>>,
    ) -> StoreResult<Self> {
        let ring = HashRing::with_members(config, registry.keys().cloned()).map_err(ring_error)?;
        Ok(Self { ring, registry })
    }

    fn route(&self, id: &str) -> StoreResult<(&MemberToken, &Arc<dyn ObjectStore>)> {
        let member = self.ring.locate(id.as_bytes()).map_err(ring_error)?;
        let store = self
            .registry
            .get(member)
            .ok_or_else(|| StoreError::NodeUnavailable(member.clone()))?;
        Ok((member, store))
    }
}

fn ring_error(err: RingError) -> StoreError {
    match err {
        RingError::NoMembers => StoreError::NoMembers,
        other => StoreError::InvalidArgument(format!("hash ring: {other}")),
    }
}

fn discovery_error(err: DiscoveryError) -> StoreError {
    match err {
        DiscoveryError::Context(ctx) => ctx.into(),
        other => StoreError::Discovery(other.to_string()),
    }
}

fn node_init_error(node: &Node, source: StoreError) -> StoreError {
    StoreError::NodeInit {
        node: node.diagnostic(),
        source: Box::new(source),
    }
}

// ---------------------------------------------------------------------------
// ShardRouter
// ---------------------------------------------------------------------------

/// Routes each object to exactly one storage node.
///
/// The router starts uninitialized. [`ObjectStore::init`] discovers the
/// nodes, initializes their stores and builds the ring; it must complete
/// before the router is handed to request traffic. Calls made earlier fail
/// with [`StoreError::NotReady`].
pub struct ShardRouter {
    discovery: Option<Arc<dyn NodeDiscovery>>,
    factory: Option<Arc<dyn StoreFactory>>,
    ring_config: RingConfig,
    shards: OnceLock<Shards>,
}

impl ShardRouter {
    /// Create an uninitialized router.
    pub fn new(
        discovery: Arc<dyn NodeDiscovery>,
        factory: Arc<dyn StoreFactory>,
        ring_config: RingConfig,
    ) -> Self {
        Self {
            discovery: Some(discovery),
            factory: Some(factory),
            ring_config,
            shards: OnceLock::new(),
        }
    }

    /// Create a ready router over already-initialized stores.
    ///
    /// The ring is built from the registry keys, so every member has exactly
    /// one store. `init` on the result is a no-op.
    pub fn from_shards(
        ring_config: RingConfig,
        registry: HashMap<MemberToken, Arc<dyn ObjectStore>>,
    ) -> StoreResult<Self> {
        let shards = Shards::build(ring_config.clone(), registry)?;
        Ok(Self {
            discovery: None,
            factory: None,
            ring_config,
            shards: OnceLock::from(shards),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.shards.get().is_some()
    }

    /// The member that owns `id`. Performs no I/O.
    pub fn locate(&self, id: &str) -> StoreResult<MemberToken> {
        let shards = self.shards()?;
        let member = shards.ring.locate(id.as_bytes()).map_err(ring_error)?;
        Ok(member.clone())
    }

    /// Ring members in ascending order; empty before `init`.
    pub fn members(&self) -> Vec<MemberToken> {
        self.shards
            .get()
            .map(|s| s.ring.members().cloned().collect())
            .unwrap_or_default()
    }

    /// Partitions owned by each member; empty before `init`.
    pub fn loads(&self) -> Vec<(MemberToken, usize)> {
        self.shards
            .get()
            .map(|s| s.ring.loads().iter().map(|(m, l)| (m.clone(), *l)).collect())
            .unwrap_or_default()
    }

    pub fn ring_config(&self) -> &RingConfig {
        &self.ring_config
    }

    fn shards(&self) -> StoreResult<&Shards> {
        self.shards.get().ok_or(StoreError::NotReady)
    }

    async fn init_stores(
        &self,
        ctx: &RequestContext,
        factory: &dyn StoreFactory,
        nodes: &[Node],
    ) -> StoreResult<HashMap<MemberToken, Arc<dyn ObjectStore>>> {
        let mut registry: HashMap<MemberToken, Arc<dyn ObjectStore>> =
            HashMap::with_capacity(nodes.len());
        for node in nodes {
            let token = node.token();
            if registry.contains_key(&token) {
                return Err(StoreError::InvalidArgument(format!(
                    "duplicate storage node {token}"
                )));
            }
            let store = factory
                .create(node)
                .map_err(|e| node_init_error(node, e))?;
            store
                .init(ctx)
                .await
                .map_err(|e| node_init_error(node, e))?;
            debug!(node = %node.diagnostic(), "storage node initialized");
            registry.insert(token, store);
        }
        Ok(registry)
    }
}

#[async_trait]
impl ObjectStore for ShardRouter {
    async fn init(&self, ctx: &RequestContext) -> StoreResult<()> {
        if self.is_ready() {
            debug!("shard router already initialized");
            return Ok(());
        }
        let (Some(discovery), Some(factory)) = (&self.discovery, &self.factory) else {
            return Err(StoreError::NotReady);
        };

        let nodes = discovery.list_nodes(ctx).await.map_err(discovery_error)?;
        if nodes.is_empty() {
            return Err(StoreError::Discovery("no storage nodes discovered".into()));
        }

        let registry = self.init_stores(ctx, factory.as_ref(), &nodes).await?;
        let shards = Shards::build(self.ring_config.clone(), registry)?;
        // A concurrent init may have won; its state is equivalent.
        let _ = self.shards.set(shards);
        info!(nodes = nodes.len(), "shard router initialized");
        Ok(())
    }

    async fn put(&self, ctx: &RequestContext, object: &Object) -> StoreResult<()> {
        if object.id.is_empty() {
            return Err(StoreError::InvalidArgument("object is empty".into()));
        }
        let (member, store) = self.shards()?.route(&object.id)?;
        debug!(member = %member, id = %object.id, "routing put");
        store
            .put(ctx, object)
            .await
            .map_err(|e| StoreError::on_member(member.clone(), e))
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<Option<Object>> {
        let (member, store) = self.shards()?.route(id)?;
        debug!(member = %member, id, "routing get");
        store
            .get(ctx, id)
            .await
            .map_err(|e| StoreError::on_member(member.clone(), e))
    }
}

impl std::fmt::Debug for ShardRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardRouter")
            .field("ready", &self.is_ready())
            .field("members", &self.members())
            .field("ring_config", &self.ring_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardline_discovery::{DiscoveryResult, StaticDiscovery};
    use shardline_store::{InMemoryObjectStore, InMemoryStoreFactory};

    const TEST_KEYS: [&str; 3] = ["object-1", "object-2", "543b8e0ef09346689eb33adbbbee452a"];

    fn node(id: &str, name: &str) -> Node {
        Node {
            id: id.into(),
            name: name.into(),
            endpoint: format!("{id}.local:9000"),
            access_key: "key".into(),
            secret_key: "treepotato".into(),
        }
    }

    fn three_nodes() -> Vec<Node> {
        vec![node("node1", "1"), node("node2", "2"), node("node3", "3")]
    }

    fn router_over(nodes: Vec<Node>, factory: Arc<dyn StoreFactory>) -> ShardRouter {
        ShardRouter::new(
            Arc::new(StaticDiscovery::new(nodes)),
            factory,
            RingConfig::default(),
        )
    }

    async fn ready_router() -> (ShardRouter, Arc<InMemoryStoreFactory>) {
        let factory = Arc::new(InMemoryStoreFactory::new());
        let router = router_over(three_nodes(), factory.clone());
        router.init(&RequestContext::background()).await.unwrap();
        (router, factory)
    }

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Store whose every call fails with a backend error.
    struct BrokenStore {
        endpoint: String,
    }

    #[async_trait]
    impl ObjectStore for BrokenStore {
        async fn init(&self, _ctx: &RequestContext) -> StoreResult<()> {
            Err(StoreError::BackendUnavailable {
                endpoint: self.endpoint.clone(),
                reason: "unable to check bucket: connection refused".into(),
            })
        }

        async fn put(&self, _ctx: &RequestContext, object: &Object) -> StoreResult<()> {
            Err(StoreError::Io {
                endpoint: self.endpoint.clone(),
                id: object.id.clone(),
                reason: "connection reset".into(),
            })
        }

        async fn get(&self, _ctx: &RequestContext, id: &str) -> StoreResult<Option<Object>> {
            Err(StoreError::Io {
                endpoint: self.endpoint.clone(),
                id: id.to_string(),
                reason: "connection reset".into(),
            })
        }
    }

    /// In-memory stores for every node except `broken`.
    struct PartlyBrokenFactory {
        broken: &'static str,
        inner: InMemoryStoreFactory,
    }

    impl StoreFactory for PartlyBrokenFactory {
        fn create(&self, node: &Node) -> StoreResult<Arc<dyn ObjectStore>> {
            if node.token().as_str() == self.broken {
                return Ok(Arc::new(BrokenStore { endpoint: node.endpoint.clone() }));
            }
            self.inner.create(node)
        }
    }

    struct FailingDiscovery;

    #[async_trait]
    impl NodeDiscovery for FailingDiscovery {
        async fn list_nodes(&self, _ctx: &RequestContext) -> DiscoveryResult<Vec<Node>> {
            Err(DiscoveryError::List("permission denied".into()))
        }
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn init_builds_one_store_per_node() {
        let (router, factory) = ready_router().await;
        assert!(router.is_ready());
        assert_eq!(
            router.members(),
            vec![
                MemberToken::from("node1#1"),
                MemberToken::from("node2#2"),
                MemberToken::from("node3#3"),
            ]
        );
        let stores = factory.stores();
        assert_eq!(stores.len(), 3);
        assert!(stores.values().all(|s| s.is_initialized()));
        let total: usize = router.loads().iter().map(|(_, l)| l).sum();
        assert_eq!(total, 271);
    }

    #[tokio::test]
    async fn one_failing_node_fails_whole_init() {
        let factory = Arc::new(PartlyBrokenFactory {
            broken: "node2#2",
            inner: InMemoryStoreFactory::new(),
        });
        let router = router_over(three_nodes(), factory);
        let err = router.init(&RequestContext::background()).await.unwrap_err();

        match &err {
            StoreError::NodeInit { node, source } => {
                assert_eq!(node, "node2#2#node2.local:9000#key#XXXXXXXXXX");
                assert!(matches!(**source, StoreError::BackendUnavailable { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("treepotato"));
        assert!(!router.is_ready());
        assert!(matches!(
            router.get(&RequestContext::background(), "object1").await,
            Err(StoreError::NotReady)
        ));
    }

    #[tokio::test]
    async fn discovery_failure_fails_init() {
        let router = ShardRouter::new(
            Arc::new(FailingDiscovery),
            Arc::new(InMemoryStoreFactory::new()),
            RingConfig::default(),
        );
        let err = router.init(&RequestContext::background()).await.unwrap_err();
        assert!(matches!(err, StoreError::Discovery(ref msg) if msg.contains("permission denied")));
    }

    #[tokio::test]
    async fn empty_node_set_fails_init() {
        let router = router_over(vec![], Arc::new(InMemoryStoreFactory::new()));
        let err = router.init(&RequestContext::background()).await.unwrap_err();
        assert!(matches!(err, StoreError::Discovery(_)));
        assert!(!router.is_ready());
    }

    #[tokio::test]
    async fn duplicate_members_are_rejected() {
        let nodes = vec![node("node1", "1"), node("node1", "1")];
        let router = router_over(nodes, Arc::new(InMemoryStoreFactory::new()));
        let err = router.init(&RequestContext::background()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn second_init_is_a_no_op() {
        let (router, factory) = ready_router().await;
        let before = factory.store_for("node1#1").unwrap();
        router.init(&RequestContext::background()).await.unwrap();
        let after = factory.store_for("node1#1").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn cancelled_init_reports_cancellation() {
        let router = router_over(three_nodes(), Arc::new(InMemoryStoreFactory::new()));
        let ctx = RequestContext::background();
        ctx.cancel();
        let err = router.init(&ctx).await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn calls_before_init_are_not_ready() {
        let router = router_over(three_nodes(), Arc::new(InMemoryStoreFactory::new()));
        let ctx = RequestContext::background();
        let obj = Object::new("object1", "text/plain", &b"x"[..]);
        assert!(matches!(router.put(&ctx, &obj).await, Err(StoreError::NotReady)));
        assert!(matches!(router.locate("object1"), Err(StoreError::NotReady)));
        assert!(router.members().is_empty());
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn each_key_lands_on_exactly_one_node() {
        let (router, factory) = ready_router().await;
        let ctx = RequestContext::background();

        for (i, key) in TEST_KEYS.iter().enumerate() {
            let content = format!("data{i}");
            router
                .put(&ctx, &Object::new(*key, "text/plain", content.clone()))
                .await
                .unwrap();

            let owner = router.locate(key).unwrap();
            let holders: Vec<_> = factory
                .stores()
                .into_iter()
                .filter(|(_, store)| store.contains(key))
                .map(|(member, _)| member)
                .collect();
            assert_eq!(holders, vec![owner]);

            let got = router.get(&ctx, key).await.unwrap().expect("stored");
            assert_eq!(got.id, *key);
            assert_eq!(got.content, content.as_bytes());
        }
    }

    #[tokio::test]
    async fn routing_matches_ring_placement() {
        let (router, _) = ready_router().await;
        assert_eq!(router.locate("object-1").unwrap().as_str(), "node2#2");
        assert_eq!(router.locate("object-2").unwrap().as_str(), "node2#2");
        assert_eq!(
            router.locate("543b8e0ef09346689eb33adbbbee452a").unwrap().as_str(),
            "node3#3"
        );
    }

    #[tokio::test]
    async fn round_trip_through_router() {
        let (router, _) = ready_router().await;
        let ctx = RequestContext::background();
        let obj = Object::new("object-1", "text/plain", &b"Hello, Minio!"[..]);
        router.put(&ctx, &obj).await.unwrap();
        assert_eq!(router.get(&ctx, "object-1").await.unwrap(), Some(obj));
    }

    #[tokio::test]
    async fn missing_object_is_none() {
        let (router, _) = ready_router().await;
        let got = router.get(&RequestContext::background(), "missingID").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn empty_id_is_invalid() {
        let (router, factory) = ready_router().await;
        let err = router
            .put(&RequestContext::background(), &Object::new("", "text/plain", &b"x"[..]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(factory.stores().values().all(|s| s.is_empty()));
    }

    #[tokio::test]
    async fn backend_failure_is_wrapped_with_member() {
        let mut registry: HashMap<MemberToken, Arc<dyn ObjectStore>> = HashMap::new();
        registry.insert(
            MemberToken::from("node1#1"),
            Arc::new(BrokenStore { endpoint: "1.1.1.1:9000".into() }),
        );
        let router = ShardRouter::from_shards(RingConfig::default(), registry).unwrap();

        let err = router
            .get(&RequestContext::background(), "object1")
            .await
            .unwrap_err();
        match &err {
            StoreError::Node { member, source } => {
                assert_eq!(member.as_str(), "node1#1");
                assert!(matches!(**source, StoreError::Io { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("1.1.1.1:9000 | object1"));
    }

    #[tokio::test]
    async fn unreachable_node_has_no_failover() {
        let mut registry: HashMap<MemberToken, Arc<dyn ObjectStore>> = HashMap::new();
        registry.insert(
            MemberToken::from("node1#1"),
            Arc::new(BrokenStore { endpoint: "1.1.1.1:9000".into() }),
        );
        let healthy = Arc::new(InMemoryObjectStore::new());
        registry.insert(MemberToken::from("node2#2"), healthy.clone());
        let router = ShardRouter::from_shards(RingConfig::default(), registry).unwrap();
        let ctx = RequestContext::background();

        // Keys owned by the broken node fail; they are never written elsewhere.
        let mut broken_keys = 0;
        for i in 0..50 {
            let id = format!("key{i}");
            let obj = Object::new(id.clone(), "text/plain", &b"v"[..]);
            let result = router.put(&ctx, &obj).await;
            if router.locate(&id).unwrap().as_str() == "node1#1" {
                broken_keys += 1;
                assert!(result.is_err());
                assert!(!healthy.contains(&id));
            } else {
                result.unwrap();
                assert!(healthy.contains(&id));
            }
        }
        assert!(broken_keys > 0);
    }

    #[tokio::test]
    async fn registry_miss_is_node_unavailable() {
        let ring = HashRing::with_members(
            RingConfig::default(),
            vec![MemberToken::from("node1#1")],
        )
        .unwrap();
        let shards = Shards { ring, registry: HashMap::new() };
        let router = ShardRouter {
            discovery: None,
            factory: None,
            ring_config: RingConfig::default(),
            shards: OnceLock::from(shards),
        };
        let err = router
            .get(&RequestContext::background(), "object1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NodeUnavailable(ref m) if m.as_str() == "node1#1"));
    }

    #[tokio::test]
    async fn cancellation_reaches_the_caller() {
        let (router, _) = ready_router().await;
        let ctx = RequestContext::background();
        ctx.cancel();
        let err = router.get(&ctx, "object1").await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn routers_compose() {
        let (inner, _) = ready_router().await;
        let mut registry: HashMap<MemberToken, Arc<dyn ObjectStore>> = HashMap::new();
        registry.insert(MemberToken::from("cluster#a"), Arc::new(inner));
        registry.insert(
            MemberToken::from("cluster#b"),
            Arc::new(InMemoryObjectStore::new()),
        );
        let outer = ShardRouter::from_shards(RingConfig::default(), registry).unwrap();
        let ctx = RequestContext::background();

        for key in TEST_KEYS {
            let obj = Object::new(key, "application/octet-stream", key.to_string());
            outer.put(&ctx, &obj).await.unwrap();
            assert_eq!(outer.get(&ctx, key).await.unwrap(), Some(obj));
        }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_router() {
        let (router, _) = ready_router().await;
        let router = Arc::new(router);
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let ctx = RequestContext::background();
                    let id = format!("obj{i}");
                    router
                        .put(&ctx, &Object::new(id.clone(), "text/plain", id.clone()))
                        .await
                        .unwrap();
                    router.get(&ctx, &id).await.unwrap().unwrap()
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            let obj = h.await.unwrap();
            assert_eq!(obj.id, format!("obj{i}"));
        }
    }
}
