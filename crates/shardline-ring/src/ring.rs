use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use shardline_types::MemberToken;
use tracing::debug;

use crate::config::RingConfig;
use crate::error::{RingError, RingResult};
use crate::hasher::{KeyHasher, Xxh64Hasher};

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Derived state of the ring for one member set.
#[derive(Clone, Debug, Default)]
struct Placement {
    /// Virtual nodes sorted by position on the circle.
    vnodes: Vec<(u64, MemberToken)>,
    /// Owner of each partition, indexed by partition id.
    partitions: Vec<MemberToken>,
    /// Partitions owned per member (every member listed, even at zero).
    loads: BTreeMap<MemberToken, usize>,
}

/// `ceil(floor(partitions / members) * load)`, the most partitions any single
/// member may own.
///
/// Never below `ceil(partitions / members)`, so the members can always hold
/// every partition between them, even when they outnumber the partitions.
fn average_load(partition_count: u64, members: usize, load: f64) -> f64 {
    if members == 0 {
        return 0.0;
    }
    let members = members as u64;
    let bounded = ((partition_count / members) as f64 * load).ceil();
    bounded.max(partition_count.div_ceil(members) as f64)
}

// ---------------------------------------------------------------------------
// HashRing
// ---------------------------------------------------------------------------

/// Consistent hash ring with bounded loads.
///
/// The ring is cheap to query and comparatively expensive to change: every
/// membership change recomputes the owner of every partition. Build it once
/// and share it read-only.
pub struct HashRing<H: KeyHasher = Xxh64Hasher> {
    config: RingConfig,
    hasher: H,
    members: BTreeSet<MemberToken>,
    placement: Placement,
}

impl HashRing<Xxh64Hasher> {
    /// Create an empty ring using XXH64.
    pub fn new(config: RingConfig) -> RingResult<Self> {
        Self::with_hasher(config, Xxh64Hasher::DEFAULT)
    }

    /// Create a ring over `members` using XXH64, distributing partitions once.
    pub fn with_members<I>(config: RingConfig, members: I) -> RingResult<Self>
    where
        I: IntoIterator<Item = MemberToken>,
    {
        Self::build(config, Xxh64Hasher::DEFAULT, members)
    }
}

impl<H: KeyHasher> HashRing<H> {
    /// Create an empty ring with a custom hash function.
    pub fn with_hasher(config: RingConfig, hasher: H) -> RingResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            hasher,
            members: BTreeSet::new(),
            placement: Placement::default(),
        })
    }

    /// Create a ring over `members` with a custom hash function.
    ///
    /// Equivalent to adding each member in turn, but distributes partitions
    /// only once.
    pub fn build<I>(config: RingConfig, hasher: H, members: I) -> RingResult<Self>
    where
        I: IntoIterator<Item = MemberToken>,
    {
        let mut ring = Self::with_hasher(config, hasher)?;
        let members: BTreeSet<MemberToken> = members.into_iter().collect();
        ring.placement = ring.place(&members)?;
        ring.members = members;
        Ok(ring)
    }

    /// Add a member. Returns `false` if it was already present.
    ///
    /// On error the ring is left exactly as it was.
    pub fn add(&mut self, member: MemberToken) -> RingResult<bool> {
        if self.members.contains(&member) {
            return Ok(false);
        }
        let mut members = self.members.clone();
        members.insert(member.clone());
        self.placement = self.place(&members)?;
        self.members = members;
        debug!(member = %member, members = self.members.len(), "hash ring member added");
        Ok(true)
    }

    /// Remove a member. Returns `false` if it was not present.
    pub fn remove(&mut self, member: &str) -> RingResult<bool> {
        if !self.members.contains(member) {
            return Ok(false);
        }
        let mut members = self.members.clone();
        members.remove(member);
        self.placement = self.place(&members)?;
        self.members = members;
        debug!(member, members = self.members.len(), "hash ring member removed");
        Ok(true)
    }

    /// The member that owns `key`.
    pub fn locate(&self, key: &[u8]) -> RingResult<&MemberToken> {
        if self.placement.partitions.is_empty() {
            return Err(RingError::NoMembers);
        }
        let partition = self.partition_id(key) as usize;
        Ok(&self.placement.partitions[partition])
    }

    /// The partition `key` falls into.
    pub fn partition_id(&self, key: &[u8]) -> u64 {
        self.hasher.hash64(key) % self.config.partition_count
    }

    /// The current owner of a partition, if the ring has members.
    pub fn partition_owner(&self, partition: u64) -> Option<&MemberToken> {
        usize::try_from(partition)
            .ok()
            .and_then(|p| self.placement.partitions.get(p))
    }

    /// Members in ascending token order.
    pub fn members(&self) -> impl Iterator<Item = &MemberToken> {
        self.members.iter()
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Partitions owned by each member.
    pub fn loads(&self) -> &BTreeMap<MemberToken, usize> {
        &self.placement.loads
    }

    /// Most partitions any single member may own with the current members.
    pub fn average_load(&self) -> f64 {
        average_load(
            self.config.partition_count,
            self.members.len(),
            self.config.load,
        )
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    fn place(&self, members: &BTreeSet<MemberToken>) -> RingResult<Placement> {
        // Members are visited in ascending order, so on a position collision
        // the smaller token keeps the spot regardless of insertion order.
        let mut circle: BTreeMap<u64, &MemberToken> = BTreeMap::new();
        for member in members {
            for i in 0..self.config.replication_factor {
                let position = self.hasher.hash64(format!("{member}{i}").as_bytes());
                circle.entry(position).or_insert(member);
            }
        }
        let vnodes: Vec<(u64, MemberToken)> = circle
            .into_iter()
            .map(|(position, member)| (position, member.clone()))
            .collect();
        if vnodes.is_empty() {
            return Ok(Placement::default());
        }

        let bound = average_load(self.config.partition_count, members.len(), self.config.load);
        let mut loads: BTreeMap<MemberToken, usize> =
            members.iter().map(|m| (m.clone(), 0)).collect();
        let mut partitions = Vec::with_capacity(self.config.partition_count as usize);

        for partition in 0..self.config.partition_count {
            let position = self.hasher.hash64(&partition.to_le_bytes());
            let start = vnodes.partition_point(|(p, _)| *p < position) % vnodes.len();
            let owner = (0..vnodes.len())
                .map(|step| &vnodes[(start + step) % vnodes.len()].1)
                .find(|member| (loads[*member] + 1) as f64 <= bound)
                .ok_or(RingError::InsufficientCapacity {
                    partition,
                    average_load: bound,
                })?;
            if let Some(load) = loads.get_mut(owner) {
                *load += 1;
            }
            partitions.push(owner.clone());
        }

        Ok(Placement {
            vnodes,
            partitions,
            loads,
        })
    }
}

impl<H: KeyHasher> fmt::Debug for HashRing<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("config", &self.config)
            .field("members", &self.members)
            .field("virtual_nodes", &self.placement.vnodes.len())
            .field("loads", &self.placement.loads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tokens(names: &[&str]) -> Vec<MemberToken> {
        names.iter().map(|n| MemberToken::from(*n)).collect()
    }

    fn numbered(n: usize) -> Vec<MemberToken> {
        (0..n).map(|i| MemberToken::new(format!("node-{i}"))).collect()
    }

    fn three_nodes() -> HashRing {
        HashRing::with_members(
            RingConfig::default(),
            tokens(&["node1#1", "node2#2", "node3#3"]),
        )
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[test]
    fn empty_ring_has_no_members() {
        let ring = HashRing::new(RingConfig::default()).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.locate(b"object-1"), Err(RingError::NoMembers));
        assert_eq!(ring.partition_owner(0), None);
    }

    #[test]
    fn single_member_owns_every_key() {
        let ring = HashRing::with_members(RingConfig::default(), tokens(&["only#1"])).unwrap();
        for key in ["a", "b", "object-1", ""] {
            assert_eq!(ring.locate(key.as_bytes()).unwrap().as_str(), "only#1");
        }
        assert_eq!(ring.loads()[&MemberToken::from("only#1")], 271);
    }

    #[test]
    fn locate_is_deterministic() {
        let ring = three_nodes();
        for key in ["object-1", "object-2", "543b8e0ef09346689eb33adbbbee452a"] {
            let first = ring.locate(key.as_bytes()).unwrap().clone();
            for _ in 0..10 {
                assert_eq!(ring.locate(key.as_bytes()).unwrap(), &first);
            }
        }
    }

    #[test]
    fn placement_is_stable_across_builds() {
        // Pinned so a change to the placement algorithm cannot slip through:
        // every gateway must agree on where a key lives.
        let ring = three_nodes();
        assert_eq!(ring.locate(b"object-1").unwrap().as_str(), "node2#2");
        assert_eq!(ring.locate(b"object-2").unwrap().as_str(), "node2#2");
        assert_eq!(
            ring.locate(b"543b8e0ef09346689eb33adbbbee452a").unwrap().as_str(),
            "node3#3"
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = HashRing::with_members(RingConfig::default(), numbered(5)).unwrap();
        let mut backward = HashRing::new(RingConfig::default()).unwrap();
        for member in numbered(5).into_iter().rev() {
            assert!(backward.add(member).unwrap());
        }
        for i in 0..2_000 {
            let key = format!("key-{i}");
            assert_eq!(
                forward.locate(key.as_bytes()).unwrap(),
                backward.locate(key.as_bytes()).unwrap()
            );
        }
    }

    #[test]
    fn custom_hasher_is_used() {
        let config = RingConfig { partition_count: 4, replication_factor: 1, load: 4.0 };
        // Everything lands on partition 0, whose hash 0 maps to the first vnode.
        let ring = HashRing::build(config, |_: &[u8]| 0u64, tokens(&["a", "b"])).unwrap();
        assert_eq!(ring.partition_id(b"whatever"), 0);
        assert_eq!(ring.locate(b"whatever").unwrap().as_str(), "a");
    }

    // -----------------------------------------------------------------------
    // Load bound
    // -----------------------------------------------------------------------

    #[test]
    fn loads_respect_the_bound() {
        for n in 1..=12 {
            let ring = HashRing::with_members(RingConfig::default(), numbered(n)).unwrap();
            let total: usize = ring.loads().values().sum();
            assert_eq!(total, 271);
            assert_eq!(ring.loads().len(), n);
            for load in ring.loads().values() {
                assert!((*load as f64) <= ring.average_load());
            }
        }
    }

    #[test]
    fn average_load_formula() {
        let ring = three_nodes();
        // floor(271 / 3) = 90, 90 * 1.25 = 112.5 -> 113
        assert_eq!(ring.average_load(), 113.0);
        assert_eq!(average_load(271, 0, 1.25), 0.0);
        // floor(2 / 3) = 0, raised to ceil(2 / 3) = 1
        assert_eq!(average_load(2, 3, 1.25), 1.0);
        // floor(5 / 3) * 1.0 = 1, raised to ceil(5 / 3) = 2
        assert_eq!(average_load(5, 3, 1.0), 2.0);
    }

    #[test]
    fn more_members_than_partitions() {
        let ring = HashRing::with_members(RingConfig::default(), numbered(272)).unwrap();
        assert_eq!(ring.average_load(), 1.0);
        assert_eq!(ring.loads().values().sum::<usize>(), 271);
        assert!(ring.loads().values().all(|load| *load <= 1));
        for i in 0..500 {
            let key = format!("key-{i}");
            let owner = ring.locate(key.as_bytes()).unwrap();
            assert!(ring.contains(owner.as_str()));
        }

        let small = RingConfig { partition_count: 7, ..Default::default() };
        let ring = HashRing::with_members(small, numbered(10)).unwrap();
        assert_eq!(ring.loads().values().sum::<usize>(), 7);
        assert!(ring.locate(b"object-1").is_ok());
    }

    #[test]
    fn tight_load_still_places_everything() {
        let config = RingConfig { partition_count: 5, load: 1.0, ..Default::default() };
        let ring = HashRing::with_members(config, numbered(3)).unwrap();
        assert_eq!(ring.loads().values().sum::<usize>(), 5);
        assert!(ring.loads().values().all(|load| *load <= 2));
    }

    #[test]
    fn insufficient_capacity_is_an_error() {
        // Every virtual node collides at 0, so only "a" is reachable and it
        // can hold just two of the four partitions.
        let config = RingConfig { partition_count: 4, replication_factor: 1, load: 1.0 };
        let err = HashRing::build(config, |_: &[u8]| 0u64, tokens(&["a", "b"])).unwrap_err();
        assert!(matches!(err, RingError::InsufficientCapacity { partition: 2, .. }));
    }

    #[test]
    fn failed_add_leaves_ring_unchanged() {
        let config = RingConfig { partition_count: 4, replication_factor: 1, load: 1.0 };
        let mut ring = HashRing::build(config, |_: &[u8]| 0u64, tokens(&["a"])).unwrap();
        let before: Vec<_> = (0..4).map(|p| ring.partition_owner(p).cloned()).collect();

        assert!(ring.add(MemberToken::from("b")).is_err());
        assert_eq!(ring.len(), 1);
        assert!(!ring.contains("b"));
        let after: Vec<_> = (0..4).map(|p| ring.partition_owner(p).cloned()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RingConfig { replication_factor: 0, ..Default::default() };
        assert!(matches!(HashRing::new(config), Err(RingError::InvalidConfig(_))));
    }

    // -----------------------------------------------------------------------
    // Membership changes
    // -----------------------------------------------------------------------

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut ring = three_nodes();
        assert!(!ring.add(MemberToken::from("node1#1")).unwrap());
        assert!(!ring.remove("missing#0").unwrap());
        assert!(ring.remove("node1#1").unwrap());
        assert!(!ring.contains("node1#1"));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn removed_member_is_never_located() {
        let mut ring = three_nodes();
        ring.remove("node2#2").unwrap();
        for i in 0..1_000 {
            let key = format!("key-{i}");
            assert_ne!(ring.locate(key.as_bytes()).unwrap().as_str(), "node2#2");
        }
    }

    #[test]
    fn removing_last_member_empties_ring() {
        let mut ring = HashRing::with_members(RingConfig::default(), tokens(&["a#1"])).unwrap();
        ring.remove("a#1").unwrap();
        assert_eq!(ring.locate(b"k"), Err(RingError::NoMembers));
        assert!(ring.loads().is_empty());
    }

    fn moved_fraction(before: usize) -> f64 {
        let old = HashRing::with_members(RingConfig::default(), numbered(before)).unwrap();
        let mut new = HashRing::with_members(RingConfig::default(), numbered(before)).unwrap();
        new.add(MemberToken::new(format!("node-{before}"))).unwrap();

        let samples = 10_000;
        let moved = (0..samples)
            .filter(|i| {
                let key = format!("key-{i}");
                old.locate(key.as_bytes()).unwrap() != new.locate(key.as_bytes()).unwrap()
            })
            .count();
        moved as f64 / samples as f64
    }

    #[test]
    fn adding_a_member_moves_few_keys() {
        for before in [4, 9] {
            let ideal = 1.0 / (before + 1) as f64;
            let moved = moved_fraction(before);
            assert!(moved > 0.0, "new member received no keys");
            assert!(
                moved < 2.0 * ideal,
                "{before} -> {}: moved {moved}, ideal {ideal}",
                before + 1
            );
        }
    }

    proptest! {
        #[test]
        fn located_member_is_always_a_member(
            names in proptest::collection::btree_set("[a-z0-9]{1,12}#[0-9]{1,3}", 1..8),
            key in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let members: Vec<MemberToken> = names.iter().map(|n| MemberToken::new(n.clone())).collect();
            let ring = HashRing::with_members(RingConfig::default(), members).unwrap();
            let owner = ring.locate(&key).unwrap();
            prop_assert!(names.contains(owner.as_str()));
        }

        #[test]
        fn separately_built_rings_agree(
            names in proptest::collection::vec("[a-z]{1,8}", 1..6),
            key in "[A-Za-z0-9]{1,32}",
        ) {
            let members: Vec<MemberToken> = names.iter().map(|n| MemberToken::new(n.clone())).collect();
            let a = HashRing::with_members(RingConfig::default(), members.clone()).unwrap();
            let b = HashRing::with_members(RingConfig::default(), members).unwrap();
            prop_assert_eq!(a.locate(key.as_bytes()).unwrap(), b.locate(key.as_bytes()).unwrap());
        }
    }
}
