//! Shared identifier and policy types.

use std::fmt;

/// Original node identifier as supplied by the importing system.
///
/// Original ids are arbitrary and possibly sparse. All adjacency and property
/// storage is indexed by dense mapped ids in `[0, node_count)`; the
/// [`IdMap`](crate::storage::IdMap) owns the bijection between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// Duplicate-relationship handling policy for one property column.
///
/// `None` keeps parallel relationships; every other policy collapses
/// duplicate `(source, target)` pairs and folds their property values.
/// Mixing `None` with a collapsing policy across columns of one projection
/// is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Keep parallel relationships as imported.
    None,
    /// Keep the first value seen for a duplicate pair, drop the rest.
    Single,
    /// Sum the property values of duplicate pairs.
    Sum,
    /// Keep the minimum property value of duplicate pairs.
    Min,
    /// Keep the maximum property value of duplicate pairs.
    Max,
}

impl Aggregation {
    /// Whether this policy collapses duplicate `(source, target)` pairs.
    pub fn reduces(self) -> bool {
        !matches!(self, Aggregation::None)
    }

    /// Folds one duplicate's property value into the surviving slot.
    pub fn merge(self, current: f64, next: f64) -> f64 {
        match self {
            Aggregation::None | Aggregation::Single => current,
            Aggregation::Sum => current + next,
            Aggregation::Min => current.min(next),
            Aggregation::Max => current.max(next),
        }
    }
}
