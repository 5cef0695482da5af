//! Graph views over frozen storage.
//!
//! A [`Graph`] binds an id map, compressed topology, and optional property
//! columns into one read surface. Views are cheap to copy for worker
//! threads; only the originating view may release the shared storage.

mod composite;
mod union;

/// Composite adjacency over several relationship types.
pub use composite::{CompositeAdjacencyList, CompositeCursor};

/// Logical union of member graphs.
pub use union::UnionGraph;

use std::sync::Arc;

use tracing::debug;

use crate::error::{BasaltError, Result};
use crate::storage::{
    AdjacencyList, AdjacencyOffsets, BuiltRelationships, IdMap, NodePropertyStore,
    RelationshipProperties,
};
use crate::types::NodeId;

/// Read access to a frozen graph, keyed by dense mapped node ids.
///
/// Relationship enumeration hands each `(source, target)` pair to a consumer
/// that returns `true` to keep going and `false` to stop. Lookups by pair
/// cost one adjacency scan.
pub trait GraphView: Send + Sync {
    /// Number of nodes in the mapped id space.
    fn node_count(&self) -> u64;

    /// Stored relationships, after import aggregation.
    fn relationship_count(&self) -> u64;

    /// Whether parallel relationships may remain.
    fn is_multigraph(&self) -> bool;

    /// Whether a relationship property column is attached.
    fn has_relationship_properties(&self) -> bool;

    /// Outgoing degree of `node`.
    fn degree(&self, node: u64) -> usize;

    /// Mapped id of an original id, if it was imported.
    fn to_mapped(&self, original: NodeId) -> Option<u64>;

    /// Original id behind a mapped id.
    fn to_original(&self, mapped: u64) -> NodeId;

    /// Independent view over the same storage for another thread. Copies
    /// cannot release the shared storage.
    fn concurrent_copy(&self) -> Self
    where
        Self: Sized;

    /// Visits `node`'s outgoing relationships in stored order.
    fn for_each_relationship<F>(&self, node: u64, consumer: F)
    where
        F: FnMut(u64, u64) -> bool;

    /// Visits `node`'s outgoing relationships with their property value;
    /// relationships without a stored value yield `fallback`.
    fn for_each_relationship_with_property<F>(&self, node: u64, fallback: f64, consumer: F)
    where
        F: FnMut(u64, u64, f64) -> bool;

    /// Whether `source -> target` is stored.
    fn exists(&self, source: u64, target: u64) -> bool {
        let mut found = false;
        self.for_each_relationship(source, |_, target_seen| {
            if target_seen == target {
                found = true;
                return false;
            }
            true
        });
        found
    }

    /// Property value of the first stored `source -> target` relationship,
    /// or `fallback` when the pair is absent.
    fn relationship_property(&self, source: u64, target: u64, fallback: f64) -> f64 {
        let mut value = fallback;
        self.for_each_relationship_with_property(source, fallback, |_, target_seen, seen| {
            if target_seen == target {
                value = seen;
                return false;
            }
            true
        });
        value
    }
}

#[derive(Debug, Clone)]
enum Topology {
    Single {
        list: Arc<AdjacencyList>,
        offsets: Arc<AdjacencyOffsets>,
    },
    Composite(Arc<CompositeAdjacencyList>),
}

impl Topology {
    fn unique_byte_size(&self) -> usize {
        match self {
            Topology::Single { list, offsets } => {
                let mut freed = 0;
                if Arc::strong_count(list) == 1 {
                    freed += list.byte_size();
                }
                if Arc::strong_count(offsets) == 1 {
                    freed += offsets.byte_size();
                }
                freed
            }
            Topology::Composite(composite) => {
                if Arc::strong_count(composite) == 1 {
                    composite.unique_byte_size()
                } else {
                    0
                }
            }
        }
    }
}

/// In-memory graph over frozen storage.
#[derive(Debug)]
pub struct Graph {
    id_map: Arc<IdMap>,
    topology: Option<Topology>,
    properties: Option<Arc<RelationshipProperties>>,
    node_properties: Arc<NodePropertyStore>,
    relationship_count: u64,
    multigraph: bool,
    can_release: bool,
}

impl Graph {
    /// Graph over a single adjacency list.
    pub fn new(
        id_map: Arc<IdMap>,
        adjacency: AdjacencyList,
        offsets: AdjacencyOffsets,
        relationship_count: u64,
    ) -> Self {
        Graph {
            id_map,
            topology: Some(Topology::Single {
                list: Arc::new(adjacency),
                offsets: Arc::new(offsets),
            }),
            properties: None,
            node_properties: Arc::new(NodePropertyStore::new()),
            relationship_count,
            multigraph: false,
            can_release: true,
        }
    }

    /// Graph whose topology fans out over several relationship types.
    /// Relationship property reads on such a graph yield the fallback.
    pub fn with_composite(
        id_map: Arc<IdMap>,
        composite: CompositeAdjacencyList,
        relationship_count: u64,
    ) -> Self {
        Graph {
            id_map,
            topology: Some(Topology::Composite(Arc::new(composite))),
            properties: None,
            node_properties: Arc::new(NodePropertyStore::new()),
            relationship_count,
            multigraph: false,
            can_release: true,
        }
    }

    /// Graph over a finished import, attaching the first property column
    /// when one was declared. Remaining columns stay with the caller.
    pub fn from_import(id_map: Arc<IdMap>, built: BuiltRelationships) -> Self {
        let BuiltRelationships {
            adjacency,
            offsets,
            mut properties,
            relationship_count,
            multigraph,
            ..
        } = built;
        let mut graph = Graph::new(id_map, adjacency, offsets, relationship_count);
        graph.multigraph = multigraph;
        if !properties.is_empty() {
            graph.properties = Some(Arc::new(properties.remove(0)));
        }
        graph
    }

    /// Attaches a relationship property column.
    pub fn relationship_properties(mut self, properties: RelationshipProperties) -> Self {
        self.properties = Some(Arc::new(properties));
        self
    }

    /// Attaches named node property arrays.
    pub fn node_properties(mut self, store: NodePropertyStore) -> Self {
        self.node_properties = Arc::new(store);
        self
    }

    /// Marks the graph as possibly holding parallel relationships.
    pub fn multigraph(mut self, multigraph: bool) -> Self {
        self.multigraph = multigraph;
        self
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    /// Value of node property `name` for `node`, or `fallback`.
    pub fn node_property(&self, name: &str, node: u64, fallback: f64) -> f64 {
        self.node_properties.value(name, node, fallback)
    }

    /// Whether this view is allowed to release shared storage.
    pub fn can_release(&self) -> bool {
        self.can_release
    }

    fn topology(&self) -> &Topology {
        match &self.topology {
            Some(topology) => topology,
            None => panic!("graph used after topology release"),
        }
    }

    pub(crate) fn single_topology(&self) -> Result<(&AdjacencyList, &AdjacencyOffsets)> {
        match self.topology() {
            Topology::Single { list, offsets } => Ok((list, offsets)),
            Topology::Composite(_) => Err(BasaltError::Config(
                "operation requires a single adjacency list, not a composite".into(),
            )),
        }
    }

    /// Drops the topology and reports the bytes this view uniquely held.
    /// No-op on views that may not release.
    pub fn release_topology(&mut self) -> usize {
        if !self.can_release {
            debug!("graph.release.denied");
            return 0;
        }
        let Some(topology) = self.topology.take() else {
            return 0;
        };
        let freed = topology.unique_byte_size();
        drop(topology);
        debug!(freed, "graph.topology.released");
        freed
    }

    /// Drops the relationship property column, reporting bytes uniquely
    /// held. No-op on views that may not release.
    pub fn release_properties(&mut self) -> usize {
        if !self.can_release {
            debug!("graph.release.denied");
            return 0;
        }
        let Some(properties) = self.properties.take() else {
            return 0;
        };
        let freed = if Arc::strong_count(&properties) == 1 {
            properties.byte_size()
        } else {
            0
        };
        drop(properties);
        debug!(freed, "graph.properties.released");
        freed
    }

    /// Releases topology and properties, returning the bytes freed.
    pub fn release(&mut self) -> usize {
        self.release_topology() + self.release_properties()
    }
}

impl GraphView for Graph {
    fn node_count(&self) -> u64 {
        self.id_map.node_count()
    }

    fn relationship_count(&self) -> u64 {
        self.relationship_count
    }

    fn is_multigraph(&self) -> bool {
        self.multigraph
    }

    fn has_relationship_properties(&self) -> bool {
        self.properties.is_some()
    }

    fn degree(&self, node: u64) -> usize {
        match self.topology() {
            Topology::Single { list, offsets } => offsets
                .get(node)
                .map_or(0, |offset| list.degree(offset)),
            Topology::Composite(composite) => composite.degree(node),
        }
    }

    fn to_mapped(&self, original: NodeId) -> Option<u64> {
        self.id_map.to_mapped(original)
    }

    fn to_original(&self, mapped: u64) -> NodeId {
        self.id_map.to_original(mapped)
    }

    fn concurrent_copy(&self) -> Self {
        Graph {
            id_map: Arc::clone(&self.id_map),
            topology: self.topology.clone(),
            properties: self.properties.clone(),
            node_properties: Arc::clone(&self.node_properties),
            relationship_count: self.relationship_count,
            multigraph: self.multigraph,
            can_release: false,
        }
    }

    fn for_each_relationship<F>(&self, node: u64, mut consumer: F)
    where
        F: FnMut(u64, u64) -> bool,
    {
        match self.topology() {
            Topology::Single { list, offsets } => {
                let Some(offset) = offsets.get(node) else {
                    return;
                };
                let mut cursor = list.cursor(offset);
                while let Some(target) = cursor.next() {
                    if !consumer(node, target) {
                        return;
                    }
                }
            }
            Topology::Composite(composite) => {
                composite.for_each(node, |target| consumer(node, target));
            }
        }
    }

    fn for_each_relationship_with_property<F>(&self, node: u64, fallback: f64, mut consumer: F)
    where
        F: FnMut(u64, u64, f64) -> bool,
    {
        let (list, offsets) = match (&self.properties, self.topology()) {
            (Some(_), Topology::Single { list, offsets }) => (list, offsets),
            _ => {
                self.for_each_relationship(node, |source, target| {
                    consumer(source, target, fallback)
                });
                return;
            }
        };
        let Some(offset) = offsets.get(node) else {
            return;
        };
        let mut values = match &self.properties {
            Some(properties) => properties.cursor(node),
            None => None,
        };
        let mut targets = list.cursor(offset);
        while let Some(target) = targets.next() {
            let value = values
                .as_mut()
                .and_then(|cursor| cursor.next_value())
                .unwrap_or(fallback);
            if !consumer(node, target, value) {
                return;
            }
        }
    }

    fn exists(&self, source: u64, target: u64) -> bool {
        match self.topology() {
            Topology::Single { list, offsets } => match offsets.get(source) {
                None => false,
                Some(offset) => {
                    let mut cursor = list.cursor(offset);
                    cursor.advance(target) == Some(target)
                }
            },
            Topology::Composite(composite) => composite.exists(source, target),
        }
    }
}
