/// Deterministic key -> node index for simple (non-cluster) sharding (§2).
///
/// Builds a hash ring with a configurable number of virtual nodes per real
/// node so that adding or removing a node only reshuffles a small fraction
/// of keys, rather than a naive `hash(key) % node_count` where every node
/// addition/removal reshuffles almost everything.
use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

pub struct ConsistentHashLocator {
    ring: BTreeMap<u64, usize>,
    nodes: Vec<String>,
}

impl ConsistentHashLocator {
    /// `virtual_nodes_per_node` controls distribution smoothness; 100-200 is
    /// a reasonable default for a handful of real nodes.
    pub fn new(nodes: Vec<String>, virtual_nodes_per_node: usize) -> Self {
        let mut ring = BTreeMap::new();
        for (index, node) in nodes.iter().enumerate() {
            for vnode in 0..virtual_nodes_per_node {
                let point = Self::hash(&format!("{}#{}", node, vnode));
                ring.insert(point, index);
            }
        }
        ConsistentHashLocator { ring, nodes }
    }

    fn hash(input: &str) -> u64 {
        let digest = Sha256::digest(input.as_bytes());
        u64::from_be_bytes(digest[0..8].try_into().unwrap())
    }

    /// Returns the node index responsible for `key`, or `None` if the ring
    /// is empty.
    pub fn locate(&self, key: &str) -> Option<usize> {
        if self.ring.is_empty() {
            return None;
        }
        let point = Self::hash(key);
        let index = self
            .ring
            .range(point..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, idx)| *idx);
        index
    }

    pub fn node(&self, key: &str) -> Option<&str> {
        self.locate(key).map(|idx| self.nodes[idx].as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_locates_nothing() {
        let locator = ConsistentHashLocator::new(vec![], 10);
        assert_eq!(locator.locate("anything"), None);
    }

    #[test]
    fn same_key_always_maps_to_same_node() {
        let locator = ConsistentHashLocator::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            100,
        );
        let first = locator.locate("user:1234");
        for _ in 0..10 {
            assert_eq!(locator.locate("user:1234"), first);
        }
    }

    #[test]
    fn distribution_uses_every_node_over_many_keys() {
        let locator = ConsistentHashLocator::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            200,
        );
        let mut seen = std::collections::HashSet::new();
        for i in 0..1000 {
            seen.insert(locator.locate(&format!("key-{}", i)).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn adding_a_node_only_remaps_a_minority_of_keys() {
        let before = ConsistentHashLocator::new(vec!["a".to_string(), "b".to_string()], 200);
        let after = ConsistentHashLocator::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            200,
        );
        let keys: Vec<String> = (0..1000).map(|i| format!("key-{}", i)).collect();
        let moved = keys
            .iter()
            .filter(|k| before.node(k) != after.node(k))
            .count();
        // A perfectly smooth ring moves close to 1/3; allow generous slack.
        assert!(moved < 600, "moved {} of 1000 keys", moved);
    }
}
