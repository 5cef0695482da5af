#![forbid(unsafe_code)]

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use basalt::graph::Graph;
use basalt::primitives::concurrency::{TerminationFlag, WorkerPool};
use basalt::storage::{IdMap, ImportOptions, RelationshipsBuilder};

/// Synthetic edge list with a fixed seed, shared by the benchmark targets.
pub struct SyntheticGraph {
    pub node_count: u64,
    pub edges: Vec<(u64, u64, f64)>,
}

impl SyntheticGraph {
    pub fn generate(node_count: u64, edge_count: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5151_5151);
        let edges = (0..edge_count)
            .map(|_| {
                let src = rng.gen_range(0..node_count);
                let mut dst = rng.gen_range(0..node_count);
                if dst == src {
                    dst = (dst + 1) % node_count;
                }
                let weight = rng.gen_range(1..1000) as f64;
                (src, dst, weight)
            })
            .collect();
        Self { node_count, edges }
    }

    /// Imports the edge list under `options`; the weight column is passed
    /// only when the options declare a property column.
    pub fn import(&self, options: ImportOptions, pool: Option<&WorkerPool>) -> Graph {
        let with_weights = !options.properties.is_empty();
        let builder = RelationshipsBuilder::new(self.node_count, options).expect("builder");
        for &(src, dst, weight) in &self.edges {
            if with_weights {
                builder.add(src, dst, &[weight]);
            } else {
                builder.add(src, dst, &[]);
            }
        }
        let built = builder.build(pool, &TerminationFlag::new()).expect("import");
        Graph::from_import(Arc::new(IdMap::identity(self.node_count)), built)
    }
}
