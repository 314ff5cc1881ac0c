//! Clustering of sparse vectors.
//!
//! Both algorithms operate on a slice of vectors (the arena) and return
//! integer handles into that slice, so callers can map results back to their
//! own document structures without identity-keyed lookups.

pub mod hierarchical;
pub mod kmeans;

pub use hierarchical::hierarchical;
pub use kmeans::{k_means, KMeansOptions, Seeding};

/// A node of a hierarchical clustering: either a vector handle or a nested
/// cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Leaf(usize),
    Cluster(Cluster),
}

/// A recursively nested, ordered sequence of vector handles. Depth and
/// flattening are derived, not stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cluster {
    items: Vec<Item>,
}

impl Cluster {
    pub fn new(items: Vec<Item>) -> Self {
        Cluster { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum nesting depth: a cluster of plain leaves has depth 0.
    pub fn depth(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                Item::Leaf(_) => 0,
                Item::Cluster(c) => 1 + c.depth(),
            })
            .max()
            .unwrap_or(0)
    }

    /// Flattens nested clusters down to the given depth; deeper clusters are
    /// kept intact as items.
    pub fn flatten(&self, depth: usize) -> Vec<Item> {
        let mut out = Vec::new();
        for item in &self.items {
            match item {
                Item::Cluster(c) if depth > 0 => out.extend(c.flatten(depth - 1)),
                other => out.push(other.clone()),
            }
        }
        out
    }

    /// Every leaf handle in the subtree, in order.
    pub fn leaves(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<usize>) {
        for item in &self.items {
            match item {
                Item::Leaf(i) => out.push(*i),
                Item::Cluster(c) => c.collect_leaves(out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Cluster {
        // (1, (2, (3, 4)))
        Cluster::new(vec![
            Item::Leaf(1),
            Item::Cluster(Cluster::new(vec![
                Item::Leaf(2),
                Item::Cluster(Cluster::new(vec![Item::Leaf(3), Item::Leaf(4)])),
            ])),
        ])
    }

    #[test]
    fn depth_counts_nesting() {
        assert_eq!(nested().depth(), 2);
        assert_eq!(Cluster::new(vec![Item::Leaf(0)]).depth(), 0);
    }

    #[test]
    fn flatten_respects_depth() {
        let c = nested();
        let flat = c.flatten(1);
        assert_eq!(flat.len(), 3);
        assert!(matches!(flat[2], Item::Cluster(_)));
        assert_eq!(c.leaves(), vec![1, 2, 3, 4]);
    }
}
