//! Composite adjacency over several relationship types.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::storage::{AdjacencyCursor, AdjacencyList, AdjacencyOffsets};

/// Fans degree and cursor construction out over member adjacency lists that
/// share one node-id space.
///
/// Members keep their own target order, so iteration yields each member's
/// targets sorted but the concatenation is not globally sorted.
#[derive(Debug, Clone)]
pub struct CompositeAdjacencyList {
    members: Vec<CompositeMember>,
}

#[derive(Debug, Clone)]
struct CompositeMember {
    list: Arc<AdjacencyList>,
    offsets: Arc<AdjacencyOffsets>,
}

impl CompositeAdjacencyList {
    pub fn new(members: Vec<(Arc<AdjacencyList>, Arc<AdjacencyOffsets>)>) -> Self {
        CompositeAdjacencyList {
            members: members
                .into_iter()
                .map(|(list, offsets)| CompositeMember { list, offsets })
                .collect(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Total degree of `node` across all members.
    pub fn degree(&self, node: u64) -> usize {
        self.members
            .iter()
            .map(|member| {
                member
                    .offsets
                    .get(node)
                    .map_or(0, |offset| member.list.degree(offset))
            })
            .sum()
    }

    /// Visits `node`'s targets member by member until `consumer` returns
    /// `false`.
    pub fn for_each(&self, node: u64, mut consumer: impl FnMut(u64) -> bool) {
        for member in &self.members {
            let Some(offset) = member.offsets.get(node) else {
                continue;
            };
            let mut cursor = member.list.cursor(offset);
            while let Some(target) = cursor.next() {
                if !consumer(target) {
                    return;
                }
            }
        }
    }

    /// Whether any member stores `node -> target`.
    pub fn exists(&self, node: u64, target: u64) -> bool {
        self.members.iter().any(|member| match member.offsets.get(node) {
            None => false,
            Some(offset) => {
                let mut cursor = member.list.cursor(offset);
                cursor.advance(target) == Some(target)
            }
        })
    }

    /// Chained cursor over `node`'s runs in member order.
    pub fn cursor(&self, node: u64) -> CompositeCursor<'_> {
        let cursors = self
            .members
            .iter()
            .filter_map(|member| {
                member
                    .offsets
                    .get(node)
                    .map(|offset| member.list.cursor(offset))
            })
            .collect();
        CompositeCursor {
            cursors,
            current: 0,
        }
    }

    pub(crate) fn byte_size(&self) -> usize {
        self.members
            .iter()
            .map(|member| member.list.byte_size() + member.offsets.byte_size())
            .sum()
    }

    pub(crate) fn unique_byte_size(&self) -> usize {
        self.members
            .iter()
            .map(|member| {
                let mut freed = 0;
                if Arc::strong_count(&member.list) == 1 {
                    freed += member.list.byte_size();
                }
                if Arc::strong_count(&member.offsets) == 1 {
                    freed += member.offsets.byte_size();
                }
                freed
            })
            .sum()
    }
}

/// Cursor chaining one member cursor after another.
pub struct CompositeCursor<'a> {
    cursors: SmallVec<[AdjacencyCursor<'a>; 4]>,
    current: usize,
}

impl CompositeCursor<'_> {
    /// Values left across all remaining member cursors.
    pub fn remaining(&self) -> usize {
        self.cursors.iter().map(AdjacencyCursor::remaining).sum()
    }

    pub fn has_next(&self) -> bool {
        self.remaining() > 0
    }

    /// Next target, moving to the following member when one drains.
    pub fn next(&mut self) -> Option<u64> {
        while self.current < self.cursors.len() {
            if let Some(value) = self.cursors[self.current].next() {
                return Some(value);
            }
            self.current += 1;
        }
        None
    }
}
