//! Logical union of member graphs sharing one node space.

use crate::error::{BasaltError, Result};
use crate::graph::{Graph, GraphView};
use crate::types::NodeId;

/// Presents several member graphs as one, fanning every operation out in
/// member order.
///
/// Members may store the same pair independently, so the union always
/// reports itself as a multigraph.
#[derive(Debug)]
pub struct UnionGraph {
    members: Vec<Graph>,
}

impl UnionGraph {
    /// Fails with [`BasaltError::Config`] when `members` is empty or the
    /// members disagree on node count.
    pub fn new(members: Vec<Graph>) -> Result<Self> {
        let Some(first) = members.first() else {
            return Err(BasaltError::Config(
                "union graph needs at least one member".into(),
            ));
        };
        let node_count = first.node_count();
        if members.iter().any(|member| member.node_count() != node_count) {
            return Err(BasaltError::Config(
                "union graph members disagree on node count".into(),
            ));
        }
        Ok(UnionGraph { members })
    }

    pub fn members(&self) -> &[Graph] {
        &self.members
    }
}

impl GraphView for UnionGraph {
    fn node_count(&self) -> u64 {
        self.members[0].node_count()
    }

    fn relationship_count(&self) -> u64 {
        self.members.iter().map(Graph::relationship_count).sum()
    }

    /// Conservative: members may store the same pair.
    fn is_multigraph(&self) -> bool {
        true
    }

    fn has_relationship_properties(&self) -> bool {
        self.members.iter().any(Graph::has_relationship_properties)
    }

    fn degree(&self, node: u64) -> usize {
        self.members.iter().map(|member| member.degree(node)).sum()
    }

    fn to_mapped(&self, original: NodeId) -> Option<u64> {
        self.members[0].to_mapped(original)
    }

    fn to_original(&self, mapped: u64) -> NodeId {
        self.members[0].to_original(mapped)
    }

    fn concurrent_copy(&self) -> Self {
        UnionGraph {
            members: self.members.iter().map(Graph::concurrent_copy).collect(),
        }
    }

    fn for_each_relationship<F>(&self, node: u64, mut consumer: F)
    where
        F: FnMut(u64, u64) -> bool,
    {
        let mut live = true;
        for member in &self.members {
            if !live {
                return;
            }
            member.for_each_relationship(node, |source, target| {
                live = consumer(source, target);
                live
            });
        }
    }

    fn for_each_relationship_with_property<F>(&self, node: u64, fallback: f64, mut consumer: F)
    where
        F: FnMut(u64, u64, f64) -> bool,
    {
        let mut live = true;
        for member in &self.members {
            if !live {
                return;
            }
            member.for_each_relationship_with_property(node, fallback, |source, target, value| {
                live = consumer(source, target, value);
                live
            });
        }
    }

    fn exists(&self, source: u64, target: u64) -> bool {
        self.members.iter().any(|member| member.exists(source, target))
    }
}
