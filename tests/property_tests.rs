use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;

use basalt::algo::{degree_partitions, PageRank, PageRankConfig};
use basalt::graph::{Graph, GraphView, UnionGraph};
use basalt::primitives::concurrency::TerminationFlag;
use basalt::storage::{IdMap, ImportOptions, RelationshipsBuilder};
use basalt::types::Aggregation;

const MAX_NODES: u64 = 64;

fn arb_edges() -> impl Strategy<Value = Vec<(u64, u64, f64)>> {
    prop::collection::vec(
        (0..MAX_NODES, 0..MAX_NODES, 1i32..100).prop_map(|(a, b, weight)| (a, b, weight as f64)),
        0..400,
    )
}

fn import_weighted(edges: &[(u64, u64, f64)], aggregation: Aggregation) -> Graph {
    let builder =
        RelationshipsBuilder::new(MAX_NODES, ImportOptions::new().property(aggregation)).unwrap();
    for &(src, dst, weight) in edges {
        builder.add(src, dst, &[weight]);
    }
    let built = builder.build(None, &TerminationFlag::new()).unwrap();
    Graph::from_import(Arc::new(IdMap::identity(MAX_NODES)), built)
}

fn import_topology(edges: &[(u64, u64, f64)]) -> Graph {
    let builder = RelationshipsBuilder::new(
        MAX_NODES,
        ImportOptions::new().aggregation(Aggregation::Single),
    )
    .unwrap();
    for &(src, dst, _) in edges {
        builder.add(src, dst, &[]);
    }
    let built = builder.build(None, &TerminationFlag::new()).unwrap();
    Graph::from_import(Arc::new(IdMap::identity(MAX_NODES)), built)
}

proptest! {
    #[test]
    fn prop_summed_import_matches_model(edges in arb_edges()) {
        let mut model: BTreeMap<(u64, u64), f64> = BTreeMap::new();
        for &(src, dst, weight) in &edges {
            *model.entry((src, dst)).or_insert(0.0) += weight;
        }

        let graph = import_weighted(&edges, Aggregation::Sum);
        prop_assert_eq!(graph.relationship_count(), model.len() as u64);
        for node in 0..MAX_NODES {
            let expected: Vec<(u64, f64)> = model
                .range((node, 0)..(node + 1, 0))
                .map(|(&(_, dst), &weight)| (dst, weight))
                .collect();
            prop_assert_eq!(graph.degree(node), expected.len());
            let mut seen = Vec::new();
            graph.for_each_relationship_with_property(node, 0.0, |_, target, weight| {
                seen.push((target, weight));
                true
            });
            // integer-valued weights make the folded sums exact
            prop_assert_eq!(seen, expected);
        }
    }

    #[test]
    fn prop_max_import_keeps_the_largest_weight(edges in arb_edges()) {
        let mut model: BTreeMap<(u64, u64), f64> = BTreeMap::new();
        for &(src, dst, weight) in &edges {
            model
                .entry((src, dst))
                .and_modify(|current| *current = current.max(weight))
                .or_insert(weight);
        }

        let graph = import_weighted(&edges, Aggregation::Max);
        for node in 0..MAX_NODES {
            let mut seen = Vec::new();
            graph.for_each_relationship_with_property(node, 0.0, |_, target, weight| {
                seen.push((target, weight));
                true
            });
            for (target, weight) in seen {
                prop_assert_eq!(model.get(&(node, target)), Some(&weight));
            }
        }
    }

    #[test]
    fn prop_membership_matches_a_set_model(
        edges in arb_edges(),
        probes in prop::collection::vec((0..MAX_NODES, 0..MAX_NODES), 1..64),
    ) {
        let model: BTreeSet<(u64, u64)> = edges
            .iter()
            .map(|&(src, dst, _)| (src, dst))
            .collect();
        let graph = import_topology(&edges);
        prop_assert_eq!(graph.relationship_count(), model.len() as u64);
        for (source, target) in probes {
            prop_assert_eq!(graph.exists(source, target), model.contains(&(source, target)));
        }
    }

    #[test]
    fn prop_union_sums_member_degrees(first in arb_edges(), second in arb_edges()) {
        let a = import_topology(&first);
        let b = import_topology(&second);
        let expected_relationships = a.relationship_count() + b.relationship_count();
        let degrees: Vec<usize> = (0..MAX_NODES)
            .map(|node| a.degree(node) + b.degree(node))
            .collect();

        let union = UnionGraph::new(vec![a, b]).unwrap();
        prop_assert_eq!(union.relationship_count(), expected_relationships);
        for node in 0..MAX_NODES {
            prop_assert_eq!(union.degree(node), degrees[node as usize]);
            let mut visited = 0;
            union.for_each_relationship(node, |_, _| {
                visited += 1;
                true
            });
            prop_assert_eq!(visited, degrees[node as usize]);
        }
    }

    #[test]
    fn prop_degree_partitions_tile_the_node_space(
        edges in arb_edges(),
        concurrency in 1usize..16,
    ) {
        let graph = import_topology(&edges);
        let partitions = degree_partitions(&graph, concurrency);
        prop_assert!(!partitions.is_empty());
        prop_assert!(partitions.len() <= concurrency);
        let mut expected_start = 0;
        for partition in &partitions {
            prop_assert_eq!(partition.start, expected_start);
            prop_assert!(partition.len > 0);
            expected_start = partition.end();
        }
        prop_assert_eq!(expected_start, MAX_NODES);
        let total: u64 = partitions.iter().map(|p| p.degree).sum();
        prop_assert_eq!(total, graph.relationship_count());
    }

    #[test]
    fn prop_rank_mass_stays_bounded(edges in arb_edges()) {
        let graph = import_topology(&edges);
        let result = PageRank::new(PageRankConfig::new())
            .unwrap()
            .run(&graph, None, &TerminationFlag::new())
            .unwrap();

        let mut mass = 0.0;
        for node in 0..MAX_NODES {
            let score = result.score(node);
            prop_assert!(score >= 0.0);
            mass += score;
        }
        // teleport mass is always present; distributed mass never exceeds 1
        prop_assert!(mass >= 0.15 - 1e-9);
        prop_assert!(mass <= 1.0 + 1e-9);
    }
}
