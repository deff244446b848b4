//! Performance benchmarks for cycle detection.
//!
//! Run with: `cargo bench --bench reachability`
//!
//! ## Scenarios
//!
//! | Benchmark | What it measures |
//! |-----------|------------------|
//! | `index_chain` | Closure vs search mode on a long chain with back edges |
//! | `engine_stream` | End-to-end engine throughput per policy |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use provenance_versioner::{
    Edge, Element, FilterConfig, PolicyKind, ReachabilityIndex, ReachabilityLimits, Vertex, VersioningEngine,
    VertexIdentity,
};

fn id(n: u64) -> VertexIdentity {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    VertexIdentity::from_bytes(bytes)
}

/// Chain `0 → 1 → ... → n` with a back edge every 16 nodes.
fn chain_edges(n: u64) -> Vec<(u64, u64)> {
    let mut edges: Vec<(u64, u64)> = (0..n).map(|i| (i, i + 1)).collect();
    edges.extend((16..n).step_by(16).map(|i| (i, i - 16)));
    edges
}

fn bench_index_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_chain");

    for n in [256u64, 1024] {
        let edges = chain_edges(n);
        group.throughput(Throughput::Elements(edges.len() as u64));

        for (label, limits) in [
            ("closure", ReachabilityLimits::default()),
            ("search", ReachabilityLimits { closure_limit: 0, search_depth_limit: None }),
            ("bounded_search", ReachabilityLimits { closure_limit: 0, search_depth_limit: Some(32) }),
        ] {
            group.bench_with_input(BenchmarkId::new(label, n), &edges, |b, edges| {
                b.iter(|| {
                    let mut index = ReachabilityIndex::new(limits);
                    let mut cycles = 0usize;
                    for &(child, parent) in edges {
                        if index.will_create_cycle(&id(child), &id(parent)) {
                            cycles += 1;
                        }
                        index.put_edge(&id(child), &id(parent));
                    }
                    black_box(cycles)
                })
            });
        }
    }

    group.finish();
}

fn bench_engine_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_stream");

    let vertices: Vec<Vertex> = (0..512)
        .map(|i| Vertex::new().with("type", "Artifact").with("path", format!("/data/{i}")))
        .collect();
    let edges: Vec<Edge> = chain_edges(511)
        .into_iter()
        .map(|(c, p)| Edge::new(vertices[c as usize].clone(), vertices[p as usize].clone()))
        .collect();
    group.throughput(Throughput::Elements(edges.len() as u64));

    for policy in [PolicyKind::Causal, PolicyKind::Reachability] {
        let config = FilterConfig::new("version", 0).with_policy(policy);
        group.bench_with_input(BenchmarkId::from_parameter(policy), &edges, |b, edges| {
            b.iter(|| {
                let mut emitted = 0usize;
                let mut engine = VersioningEngine::new(&config, |_: Element| emitted += 1)
                    .expect("valid config");
                for edge in edges {
                    engine.put_edge(edge);
                }
                drop(engine);
                black_box(emitted)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_index_chain, bench_engine_stream);
criterion_main!(benches);
