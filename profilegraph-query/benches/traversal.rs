// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Traversal and clustering over generated snapshots
//!
//! Run with: cargo bench -p profilegraph-query --bench traversal

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use profilegraph_core::{
    ids, Edge, EdgeAttributes, EdgeType, EngineConfig, Entity, EntityAttributes, EntityType,
    Occurrence,
};
use profilegraph_query::{Direction, GraphQueryEngine, GraphSnapshot};
use std::sync::Arc;

/// Ring of `size` interests with a chord every seventh node
fn generate_snapshot(size: usize) -> GraphSnapshot {
    let config = EngineConfig::default();
    let occurrence = Occurrence::new("bench", Utc::now(), "generated");

    let entities: Vec<Entity> = (0..size)
        .map(|i| {
            let name = format!("interest {}", i);
            Entity::new(
                ids::entity_id(&name, EntityType::Interest).unwrap_or_default(),
                name,
                EntityAttributes::default_for(EntityType::Interest),
                0.7 + (i % 30) as f64 / 100.0,
                &occurrence,
                &config,
            )
        })
        .collect();

    let mut edges = Vec::new();
    for i in 0..size {
        let mut link = |j: usize, weight: f64| {
            let (a, b) = (&entities[i], &entities[j % size]);
            let (id, source, _) = ids::edge_id(EdgeType::TemporalCooccurrence, &a.id, &b.id);
            let (source, target) = if source == a.id { (a, b) } else { (b, a) };
            edges.push(Edge::new(
                id,
                source.into(),
                target.into(),
                EdgeAttributes::default_for(EdgeType::TemporalCooccurrence),
                weight,
                &occurrence,
                &config,
            ));
        };
        link(i + 1, 0.6 + (i % 4) as f64 / 10.0);
        if i % 7 == 0 {
            link(i + size / 3, 0.75);
        }
    }

    GraphSnapshot::new("bench", entities, edges)
}

fn bench_related_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("related_entities");

    for size in [100usize, 1000, 5000].iter() {
        let engine = GraphQueryEngine::new(
            Arc::new(generate_snapshot(*size)),
            &EngineConfig::default(),
        );
        let start = ids::entity_id("interest 0", EntityType::Interest).unwrap_or_default();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| engine.related_entities(black_box(&start), 3, None, 0.5));
        });
    }

    group.finish();
}

fn bench_clusters(c: &mut Criterion) {
    let mut group = c.benchmark_group("interest_clusters");

    for size in [100usize, 1000, 5000].iter() {
        let engine = GraphQueryEngine::new(
            Arc::new(generate_snapshot(*size)),
            &EngineConfig::default(),
        );

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| engine.interest_clusters(black_box(2), None));
        });
    }

    group.finish();
}

fn bench_neighbors(c: &mut Criterion) {
    let engine = GraphQueryEngine::new(Arc::new(generate_snapshot(5000)), &EngineConfig::default());
    let hub = ids::entity_id("interest 7", EntityType::Interest).unwrap_or_default();

    c.bench_function("neighbors_both", |b| {
        b.iter(|| engine.neighbors(black_box(&hub), None, Direction::Both, None));
    });
}

criterion_group!(benches, bench_related_entities, bench_clusters, bench_neighbors);
criterion_main!(benches);
