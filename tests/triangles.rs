use std::collections::BTreeSet;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use basalt::algo::{triangle_count, TriangleCountConfig};
use basalt::graph::Graph;
use basalt::primitives::concurrency::{TerminationFlag, WorkerPool};
use basalt::storage::{IdMap, ImportOptions, RelationshipsBuilder};

fn undirected(node_count: u64, edges: &BTreeSet<(u64, u64)>) -> Graph {
    let builder = RelationshipsBuilder::new(node_count, ImportOptions::new()).unwrap();
    for &(a, b) in edges {
        builder.add(a, b, &[]);
        builder.add(b, a, &[]);
    }
    let built = builder.build(None, &TerminationFlag::new()).unwrap();
    Graph::from_import(Arc::new(IdMap::identity(node_count)), built)
}

fn random_edges(node_count: u64, attempts: usize, seed: u64) -> BTreeSet<(u64, u64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut edges = BTreeSet::new();
    for _ in 0..attempts {
        let a = rng.gen_range(0..node_count);
        let b = rng.gen_range(0..node_count);
        if a != b {
            edges.insert((a.min(b), a.max(b)));
        }
    }
    edges
}

/// Per-node triangle membership counted the slow, obvious way.
fn brute_force(
    node_count: u64,
    edges: &BTreeSet<(u64, u64)>,
    max_degree: Option<usize>,
) -> (u64, Vec<u64>) {
    let mut neighbors = vec![BTreeSet::new(); node_count as usize];
    for &(a, b) in edges {
        neighbors[a as usize].insert(b);
        neighbors[b as usize].insert(a);
    }
    let allowed = |node: u64| {
        max_degree.map_or(true, |limit| neighbors[node as usize].len() <= limit)
    };
    let mut total = 0;
    let mut local = vec![0u64; node_count as usize];
    for a in 0..node_count {
        for b in a + 1..node_count {
            if !neighbors[a as usize].contains(&b) {
                continue;
            }
            for c in b + 1..node_count {
                if neighbors[a as usize].contains(&c)
                    && neighbors[b as usize].contains(&c)
                    && allowed(a)
                    && allowed(b)
                    && allowed(c)
                {
                    total += 1;
                    local[a as usize] += 1;
                    local[b as usize] += 1;
                    local[c as usize] += 1;
                }
            }
        }
    }
    (total, local)
}

#[test]
fn complete_graph_has_every_possible_triangle() {
    let mut edges = BTreeSet::new();
    for a in 0..10u64 {
        for b in a + 1..10 {
            edges.insert((a, b));
        }
    }
    let graph = undirected(10, &edges);
    let result = triangle_count(
        &graph,
        TriangleCountConfig::new(),
        None,
        &TerminationFlag::new(),
    )
    .unwrap();
    // C(10, 3) triples, each node on C(9, 2) of them
    assert_eq!(result.total, 120);
    for node in 0..10 {
        assert_eq!(result.local.get(node), 36);
    }
}

#[test]
fn bipartite_graph_has_none() {
    let mut edges = BTreeSet::new();
    for left in 0..5u64 {
        for right in 5..10u64 {
            edges.insert((left, right));
        }
    }
    let graph = undirected(10, &edges);
    let result = triangle_count(
        &graph,
        TriangleCountConfig::new().concurrency(2),
        None,
        &TerminationFlag::new(),
    )
    .unwrap();
    assert_eq!(result.total, 0);
    for node in 0..10 {
        assert_eq!(result.local.get(node), 0);
    }
}

#[test]
fn random_graph_matches_brute_force() {
    let edges = random_edges(60, 420, 0xBEE5);
    let graph = undirected(60, &edges);
    let (expected_total, expected_local) = brute_force(60, &edges, None);
    assert!(expected_total > 0);

    let pool = WorkerPool::new(4);
    let result = triangle_count(
        &graph,
        TriangleCountConfig::new().concurrency(4),
        Some(&pool),
        &TerminationFlag::new(),
    )
    .unwrap();
    assert_eq!(result.total, expected_total);
    for node in 0..60usize {
        assert_eq!(result.local.get(node), expected_local[node]);
    }
}

#[test]
fn degree_cap_matches_a_filtered_brute_force() {
    let edges = random_edges(60, 420, 0xBEE5);
    let graph = undirected(60, &edges);
    let (expected_total, expected_local) = brute_force(60, &edges, Some(10));

    let result = triangle_count(
        &graph,
        TriangleCountConfig::new().max_degree(10).concurrency(3),
        None,
        &TerminationFlag::new(),
    )
    .unwrap();
    assert_eq!(result.total, expected_total);
    for node in 0..60usize {
        assert_eq!(result.local.get(node), expected_local[node]);
    }
}
