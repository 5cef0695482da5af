//! Parallel relationship import.
//!
//! Producers buffer `(source, target, values...)` tuples into per-page
//! builders, each guarded by its own lock; sources land in the page that
//! owns their id range, so concurrent producers working disjoint ranges
//! rarely contend. [`RelationshipsBuilder::build`] then flushes one task per
//! import page: sort by target, fold duplicates per the aggregation policy,
//! delta-compress, and write the run through a thread-local bump allocator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::error::{BasaltError, Result};
use crate::metrics::{default_metrics, CoreMetrics};
use crate::primitives::codec::{delta, fixed};
use crate::primitives::concurrency::{
    run_with_concurrency, RunParams, TerminationFlag, WorkerPool,
};
use crate::storage::adjacency::{AdjacencyList, AdjacencyOffsets};
use crate::storage::pages::{LocalAllocator, PageArena};
use crate::storage::properties::RelationshipProperties;
use crate::types::Aggregation;

/// Source nodes per import page.
const IMPORT_PAGE_SHIFT: u32 = 12;
const IMPORT_PAGE_SIZE: usize = 1 << IMPORT_PAGE_SHIFT;
const IMPORT_PAGE_MASK: u64 = (IMPORT_PAGE_SIZE as u64) - 1;

/// Options for [`RelationshipsBuilder`].
#[derive(Clone)]
pub struct ImportOptions {
    /// Aggregation applied per property column, in declaration order.
    pub properties: Vec<Aggregation>,
    /// Duplicate handling for topology-only imports; ignored once property
    /// columns are declared.
    pub aggregation: Aggregation,
    /// Flush fan-out across import pages.
    pub concurrency: usize,
    /// Sink for import counters.
    pub metrics: Arc<dyn CoreMetrics>,
}

impl std::fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOptions")
            .field("properties", &self.properties)
            .field("aggregation", &self.aggregation)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        ImportOptions {
            properties: Vec::new(),
            aggregation: Aggregation::None,
            concurrency: 1,
            metrics: default_metrics(),
        }
    }

    /// Declares one property column with its duplicate-folding policy.
    pub fn property(mut self, aggregation: Aggregation) -> Self {
        self.properties.push(aggregation);
        self
    }

    /// Duplicate handling for topology-only imports.
    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn CoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(BasaltError::Config(
                "import concurrency must be at least 1".into(),
            ));
        }
        let keeps = self.properties.iter().any(|policy| !policy.reduces());
        let folds = self.properties.iter().any(|policy| policy.reduces());
        if keeps && folds {
            return Err(BasaltError::Config(
                "NONE aggregation cannot be combined with reducing aggregations".into(),
            ));
        }
        Ok(())
    }

    /// Whether duplicates get folded rather than kept as parallel edges.
    fn reduces(&self) -> bool {
        match self.properties.first() {
            Some(policy) => policy.reduces(),
            None => self.aggregation.reduces(),
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffered relationships for one source node.
#[derive(Debug, Default)]
struct NodeBuffer {
    targets: Vec<u64>,
    /// One parallel value vector per property column.
    values: Vec<Vec<f64>>,
}

/// Buffered relationships for one import page of source nodes.
#[derive(Debug)]
struct PageBuilder {
    nodes: Vec<Option<Box<NodeBuffer>>>,
    buffered: usize,
}

impl PageBuilder {
    fn new() -> Self {
        PageBuilder {
            nodes: Vec::new(),
            buffered: 0,
        }
    }

    fn append(&mut self, index: usize, target: u64, values: &[f64], columns: usize) {
        if index >= self.nodes.len() {
            self.nodes.resize_with(index + 1, || None);
        }
        let buffer = self.nodes[index].get_or_insert_with(|| {
            Box::new(NodeBuffer {
                targets: Vec::new(),
                values: vec![Vec::new(); columns],
            })
        });
        buffer.targets.push(target);
        for (column, &value) in buffer.values.iter_mut().zip(values.iter()) {
            column.push(value);
        }
        self.buffered += 1;
    }
}

/// Shared state of one flush pass.
struct FlushContext {
    adjacency: PageArena,
    adjacency_offsets: AdjacencyOffsets,
    columns: Vec<ColumnArena>,
    policies: Vec<Aggregation>,
    topology_policy: Aggregation,
    relationships: AtomicU64,
    aggregated: AtomicU64,
    bytes: AtomicU64,
}

struct ColumnArena {
    arena: PageArena,
    offsets: AdjacencyOffsets,
}

/// Counters from one [`RelationshipsBuilder::build`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportStats {
    /// Relationships stored after aggregation.
    pub relationships: u64,
    /// Duplicate relationships folded away by aggregation.
    pub aggregated: u64,
    /// Compressed adjacency and property bytes written.
    pub bytes_written: u64,
    /// Byte pages allocated across all arenas.
    pub pages_allocated: u64,
}

/// Frozen output of one import.
#[derive(Debug)]
pub struct BuiltRelationships {
    /// Compressed topology.
    pub adjacency: AdjacencyList,
    /// Per-node offsets into the topology.
    pub offsets: AdjacencyOffsets,
    /// Property columns in declaration order.
    pub properties: Vec<RelationshipProperties>,
    /// Stored relationship count, after aggregation.
    pub relationship_count: u64,
    /// Whether parallel relationships may remain.
    pub multigraph: bool,
    /// Import counters.
    pub stats: ImportStats,
}

/// Thread-safe accumulator for relationships of one type.
///
/// `add` may be called from any number of threads; `build` consumes the
/// builder and produces the frozen, compressed form.
#[derive(Debug)]
pub struct RelationshipsBuilder {
    options: ImportOptions,
    node_count: u64,
    pages: Vec<Mutex<PageBuilder>>,
}

impl RelationshipsBuilder {
    /// Fails with [`BasaltError::Config`] when the options are
    /// inconsistent.
    pub fn new(node_count: u64, options: ImportOptions) -> Result<Self> {
        options.validate()?;
        let page_count = (node_count as usize + IMPORT_PAGE_SIZE - 1) >> IMPORT_PAGE_SHIFT;
        let pages = (0..page_count).map(|_| Mutex::new(PageBuilder::new())).collect();
        Ok(RelationshipsBuilder {
            options,
            node_count,
            pages,
        })
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Buffers one relationship. `values` must carry one entry per
    /// configured property column.
    pub fn add(&self, source: u64, target: u64, values: &[f64]) {
        self.check_ids(source, target);
        assert_eq!(
            values.len(),
            self.options.properties.len(),
            "expected {} property values, got {}",
            self.options.properties.len(),
            values.len()
        );
        let page = (source >> IMPORT_PAGE_SHIFT) as usize;
        let index = (source & IMPORT_PAGE_MASK) as usize;
        self.pages[page]
            .lock()
            .append(index, target, values, self.options.properties.len());
    }

    /// Buffers a batch, locking each owning page once per contiguous group
    /// of sources. `columns` holds one slice per property column, each
    /// aligned with `relationships`.
    pub fn add_batch(&self, relationships: &[(u64, u64)], columns: &[&[f64]]) {
        assert_eq!(
            columns.len(),
            self.options.properties.len(),
            "expected {} property columns, got {}",
            self.options.properties.len(),
            columns.len()
        );
        for column in columns {
            assert_eq!(column.len(), relationships.len(), "column not aligned with batch");
        }
        let column_count = columns.len();
        let mut values: SmallVec<[f64; 4]> = SmallVec::from_elem(0.0, column_count);
        let mut current_page = usize::MAX;
        let mut guard = None;
        for (row, &(source, target)) in relationships.iter().enumerate() {
            self.check_ids(source, target);
            let page = (source >> IMPORT_PAGE_SHIFT) as usize;
            if page != current_page || guard.is_none() {
                // release the previous page before taking the next one
                guard = None;
                guard = Some(self.pages[page].lock());
                current_page = page;
            }
            for (slot, column) in values.iter_mut().zip(columns.iter()) {
                *slot = column[row];
            }
            if let Some(builder) = guard.as_mut() {
                let index = (source & IMPORT_PAGE_MASK) as usize;
                builder.append(index, target, &values, column_count);
            }
        }
    }

    fn check_ids(&self, source: u64, target: u64) {
        assert!(
            source < self.node_count && target < self.node_count,
            "relationship ({source})-({target}) outside node space of {}",
            self.node_count
        );
    }

    /// Sorts, folds, compresses, and writes every buffered run, one flush
    /// task per import page.
    pub fn build(
        self,
        pool: Option<&WorkerPool>,
        termination: &TerminationFlag,
    ) -> Result<BuiltRelationships> {
        let RelationshipsBuilder {
            options,
            node_count,
            pages,
        } = self;
        let column_count = options.properties.len();
        let multigraph = !options.reduces();

        let context = Arc::new(FlushContext {
            adjacency: PageArena::new(),
            adjacency_offsets: AdjacencyOffsets::new(node_count as usize),
            columns: (0..column_count)
                .map(|_| ColumnArena {
                    arena: PageArena::new(),
                    offsets: AdjacencyOffsets::new(node_count as usize),
                })
                .collect(),
            policies: options.properties.clone(),
            topology_policy: options.aggregation,
            relationships: AtomicU64::new(0),
            aggregated: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        });

        let tasks: Vec<_> = pages
            .into_iter()
            .enumerate()
            .filter_map(|(page_index, page)| {
                let page = page.into_inner();
                if page.buffered == 0 {
                    return None;
                }
                let context = Arc::clone(&context);
                Some(move || flush_page(page_index, page, &context))
            })
            .collect();

        let mut params = RunParams::new(options.concurrency, tasks)
            .termination(termination.clone())
            .metrics(Arc::clone(&options.metrics));
        if let Some(pool) = pool {
            params = params.pool(pool);
        }
        run_with_concurrency(params)?;

        let Ok(context) = Arc::try_unwrap(context) else {
            unreachable!("flush context still shared after batch settled")
        };
        let adjacency_pages = context.adjacency.freeze();
        let mut pages_allocated = adjacency_pages.page_count() as u64;
        let properties: Vec<RelationshipProperties> = context
            .columns
            .into_iter()
            .map(|column| {
                let pages = column.arena.freeze();
                pages_allocated += pages.page_count() as u64;
                RelationshipProperties::new(pages, column.offsets)
            })
            .collect();

        let stats = ImportStats {
            relationships: context.relationships.into_inner(),
            aggregated: context.aggregated.into_inner(),
            bytes_written: context.bytes.into_inner(),
            pages_allocated,
        };
        options.metrics.record_relationships(stats.relationships);
        options.metrics.record_adjacency_bytes(stats.bytes_written);
        options.metrics.record_pages(stats.pages_allocated);
        info!(
            relationships = stats.relationships,
            aggregated = stats.aggregated,
            bytes = stats.bytes_written,
            pages = stats.pages_allocated,
            "import.finished"
        );

        Ok(BuiltRelationships {
            adjacency: AdjacencyList::new(adjacency_pages),
            offsets: context.adjacency_offsets,
            properties,
            relationship_count: stats.relationships,
            multigraph,
            stats,
        })
    }
}

fn flush_page(page_index: usize, page: PageBuilder, context: &FlushContext) -> Result<()> {
    let mut adjacency_alloc = LocalAllocator::new(&context.adjacency);
    let mut column_allocs: Vec<LocalAllocator<'_>> = context
        .columns
        .iter()
        .map(|column| LocalAllocator::new(&column.arena))
        .collect();
    let mut encode_buf: Vec<u8> = Vec::new();
    let mut order: Vec<u32> = Vec::new();
    let base = (page_index as u64) << IMPORT_PAGE_SHIFT;
    let mut stored = 0u64;
    let mut folded = 0u64;
    let mut written = 0u64;
    let mut flushed_nodes = 0u64;

    for (index, slot) in page.nodes.into_iter().enumerate() {
        let Some(buffer) = slot else { continue };
        flushed_nodes += 1;
        let node = base + index as u64;
        let NodeBuffer {
            mut targets,
            mut values,
        } = *buffer;

        if values.is_empty() {
            targets.sort_unstable();
            if context.topology_policy.reduces() {
                let before = targets.len();
                targets.dedup();
                folded += (before - targets.len()) as u64;
            }
        } else {
            sort_with_permutation(&mut targets, &mut values, &mut order);
            if context.policies[0].reduces() {
                folded += fold_duplicates(&mut targets, &mut values, &context.policies) as u64;
            }
        }

        let degree = targets.len();
        stored += degree as u64;

        encode_buf.clear();
        encode_buf.resize(4, 0);
        fixed::put_u32_le(&mut encode_buf, 0, degree as u32);
        delta::compress(&targets, &mut encode_buf);
        written += encode_buf.len() as u64;
        let offset = adjacency_alloc.append(&encode_buf);
        context.adjacency_offsets.set(node, offset);

        for ((column_values, alloc), column) in
            values.iter().zip(column_allocs.iter_mut()).zip(&context.columns)
        {
            encode_buf.clear();
            encode_buf.resize(4 + 8 * degree, 0);
            fixed::put_u32_le(&mut encode_buf, 0, degree as u32);
            for (i, value) in column_values.iter().enumerate() {
                fixed::put_u64_le(&mut encode_buf, 4 + 8 * i, value.to_bits());
            }
            written += encode_buf.len() as u64;
            let offset = alloc.append(&encode_buf);
            column.offsets.set(node, offset);
        }
    }

    context.relationships.fetch_add(stored, Ordering::Relaxed);
    context.aggregated.fetch_add(folded, Ordering::Relaxed);
    context.bytes.fetch_add(written, Ordering::Relaxed);
    debug!(
        page = page_index,
        nodes = flushed_nodes,
        relationships = stored,
        "import.page.flushed"
    );
    Ok(())
}

/// Sorts targets ascending and reorders every value column through the same
/// permutation; buffer order is preserved between equal targets.
fn sort_with_permutation(targets: &mut Vec<u64>, values: &mut [Vec<f64>], order: &mut Vec<u32>) {
    order.clear();
    order.extend(0..targets.len() as u32);
    order.sort_by_key(|&i| targets[i as usize]);
    *targets = order.iter().map(|&i| targets[i as usize]).collect();
    for column in values.iter_mut() {
        *column = order.iter().map(|&i| column[i as usize]).collect();
    }
}

/// Folds runs of equal targets using each column's policy; the first
/// occurrence survives. Returns how many duplicates were folded away.
fn fold_duplicates(
    targets: &mut Vec<u64>,
    values: &mut [Vec<f64>],
    policies: &[Aggregation],
) -> usize {
    let mut write = 0usize;
    for read in 0..targets.len() {
        if write > 0 && targets[read] == targets[write - 1] {
            for (column, policy) in values.iter_mut().zip(policies.iter()) {
                column[write - 1] = policy.merge(column[write - 1], column[read]);
            }
        } else {
            targets[write] = targets[read];
            for column in values.iter_mut() {
                column[write] = column[read];
            }
            write += 1;
        }
    }
    let folded = targets.len() - write;
    targets.truncate(write);
    for column in values.iter_mut() {
        column.truncate(write);
    }
    folded
}
