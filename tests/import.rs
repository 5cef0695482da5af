use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use basalt::error::BasaltError;
use basalt::graph::{Graph, GraphView};
use basalt::primitives::concurrency::{TerminationFlag, WorkerPool};
use basalt::storage::{IdMap, ImportOptions, RelationshipsBuilder};
use basalt::types::Aggregation;

const NODE_COUNT: u64 = 10_000;
const EDGE_COUNT: usize = 60_000;

fn synthetic_edges(seed: u64) -> Vec<(u64, u64, f64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..EDGE_COUNT)
        .map(|_| {
            let src = rng.gen_range(0..NODE_COUNT);
            let mut dst = rng.gen_range(0..NODE_COUNT);
            if dst == src {
                dst = (dst + 1) % NODE_COUNT;
            }
            let weight = rng.gen_range(1..100) as f64;
            (src, dst, weight)
        })
        .collect()
}

#[test]
fn summed_import_matches_reference_model() {
    let edges = synthetic_edges(0x5151_5151);
    let mut model: BTreeMap<(u64, u64), f64> = BTreeMap::new();
    for &(src, dst, weight) in &edges {
        *model.entry((src, dst)).or_insert(0.0) += weight;
    }

    let pool = WorkerPool::new(4);
    let builder = RelationshipsBuilder::new(
        NODE_COUNT,
        ImportOptions::new()
            .property(Aggregation::Sum)
            .concurrency(4),
    )
    .unwrap();
    for &(src, dst, weight) in &edges {
        builder.add(src, dst, &[weight]);
    }
    let built = builder.build(Some(&pool), &TerminationFlag::new()).unwrap();
    assert_eq!(built.relationship_count, model.len() as u64);
    assert_eq!(
        built.stats.aggregated,
        (EDGE_COUNT - model.len()) as u64
    );
    assert!(!built.multigraph);

    let graph = Graph::from_import(Arc::new(IdMap::identity(NODE_COUNT)), built);
    for node in 0..NODE_COUNT {
        let expected: Vec<(u64, f64)> = model
            .range((node, 0)..(node + 1, 0))
            .map(|(&(_, dst), &weight)| (dst, weight))
            .collect();
        assert_eq!(graph.degree(node), expected.len());

        let mut seen = Vec::with_capacity(expected.len());
        graph.for_each_relationship_with_property(node, 0.0, |_, target, weight| {
            seen.push((target, weight));
            true
        });
        // integer-valued weights sum exactly no matter the fold order
        assert_eq!(seen, expected);
    }
}

#[test]
fn concurrent_adders_share_one_builder() {
    let edges = synthetic_edges(0xA0A0_1234);
    let mut model: BTreeMap<(u64, u64), f64> = BTreeMap::new();
    for &(src, dst, weight) in &edges {
        *model.entry((src, dst)).or_insert(0.0) += weight;
    }

    let builder = RelationshipsBuilder::new(
        NODE_COUNT,
        ImportOptions::new().property(Aggregation::Sum),
    )
    .unwrap();
    thread::scope(|scope| {
        for chunk in edges.chunks(EDGE_COUNT / 8) {
            let builder = &builder;
            scope.spawn(move || {
                let pairs: Vec<(u64, u64)> =
                    chunk.iter().map(|&(src, dst, _)| (src, dst)).collect();
                let weights: Vec<f64> = chunk.iter().map(|&(_, _, weight)| weight).collect();
                builder.add_batch(&pairs, &[&weights]);
            });
        }
    });
    let built = builder.build(None, &TerminationFlag::new()).unwrap();
    assert_eq!(built.relationship_count, model.len() as u64);

    let graph = Graph::from_import(Arc::new(IdMap::identity(NODE_COUNT)), built);
    let mut total = 0.0;
    for node in 0..NODE_COUNT {
        graph.for_each_relationship_with_property(node, 0.0, |_, target, weight| {
            assert_eq!(model.get(&(node, target)), Some(&weight));
            total += weight;
            true
        });
    }
    let expected: f64 = model.values().sum();
    assert_eq!(total, expected);
}

#[test]
fn unaggregated_import_keeps_parallel_relationships() {
    let builder = RelationshipsBuilder::new(100, ImportOptions::new()).unwrap();
    for _ in 0..3 {
        builder.add(7, 9, &[]);
    }
    builder.add(7, 3, &[]);
    let built = builder.build(None, &TerminationFlag::new()).unwrap();
    assert!(built.multigraph);
    assert_eq!(built.relationship_count, 4);

    let graph = Graph::from_import(Arc::new(IdMap::identity(100)), built);
    assert_eq!(graph.degree(7), 4);
    let mut targets = Vec::new();
    graph.for_each_relationship(7, |_, target| {
        targets.push(target);
        true
    });
    assert_eq!(targets, vec![3, 9, 9, 9]);
}

#[test]
fn import_counters_track_folded_duplicates() {
    let builder = RelationshipsBuilder::new(
        50,
        ImportOptions::new().property(Aggregation::Single),
    )
    .unwrap();
    for _ in 0..4 {
        builder.add(1, 2, &[8.0]);
    }
    builder.add(1, 4, &[2.5]);
    builder.add(3, 2, &[1.0]);
    let built = builder.build(None, &TerminationFlag::new()).unwrap();

    assert_eq!(built.stats.relationships, 3);
    assert_eq!(built.stats.aggregated, 3);
    assert!(built.stats.bytes_written > 0);
    assert!(built.stats.pages_allocated >= 2);
}

#[test]
fn mixing_none_with_reducing_columns_is_rejected() {
    let options = ImportOptions::new()
        .property(Aggregation::None)
        .property(Aggregation::Sum);
    let err = RelationshipsBuilder::new(10, options).unwrap_err();
    assert!(matches!(err, BasaltError::Config(_)));
}

#[test]
fn hub_node_spans_a_dedicated_property_page() {
    const HUB_DEGREE: u64 = 40_000;
    let builder = RelationshipsBuilder::new(
        HUB_DEGREE + 1,
        ImportOptions::new().property(Aggregation::Single),
    )
    .unwrap();
    for target in 1..=HUB_DEGREE {
        builder.add(0, target, &[target as f64]);
    }
    let built = builder.build(None, &TerminationFlag::new()).unwrap();
    let graph = Graph::from_import(Arc::new(IdMap::identity(HUB_DEGREE + 1)), built);

    assert_eq!(graph.degree(0), HUB_DEGREE as usize);
    let mut expected = 1u64;
    graph.for_each_relationship_with_property(0, 0.0, |_, target, weight| {
        assert_eq!(target, expected);
        assert_eq!(weight, expected as f64);
        expected += 1;
        true
    });
    assert_eq!(expected, HUB_DEGREE + 1);
}
