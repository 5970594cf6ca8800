// benches/combined_benchmark.rs
use criterion::measurement::WallTime;
use criterion::{BenchmarkGroup, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use seaopt::ir::entity::EntityTable;
use seaopt::ir::graph::{Graph, NodeId};
use seaopt::ir::mode::Mode;
use seaopt::ir::node::{Opcode, PN_COND_FALSE, PN_COND_TRUE, PN_MEM, Relation};
use seaopt::ir::optimizer::combined::CombinedOptimizer;
use seaopt::ir::tarval::Tarval;
use std::hint::black_box;
use std::time::Duration;

/// Helper function to configure benchmark groups with standard settings
fn configure_benchmark_group(group: &mut BenchmarkGroup<WallTime>, warm_up: u64, measurement: u64) {
    group
        .significance_level(0.01)
        .sample_size(100)
        .confidence_level(0.99)
        .warm_up_time(Duration::from_secs(warm_up))
        .measurement_time(Duration::from_secs(measurement));
}

/// Builds a chain of `n` diamonds, each branching on a comparison of a
/// loop-invariant constant expression and merging two sums back in a Phi.
fn diamond_chain(n: usize) -> Graph {
    let mut g = Graph::new("bench");
    let start = g.start();
    let mem = g.new_proj(start, Mode::M, PN_MEM);
    let arg = g.new_proj(start, Mode::I32, 1);
    let mut block = g.start_block();
    let mut value: NodeId = arg;
    for i in 0..n {
        let c = g.new_const(Tarval::I32(i as i32));
        let lhs = g.new_binop(Opcode::Add, block, Mode::I32, value, c);
        let rhs = g.new_binop(Opcode::Add, block, Mode::I32, c, value);
        let sel = g.new_cmp(block, Relation::Less, value, c);
        let cond = g.new_cond(block, sel);
        let pt = g.new_proj(cond, Mode::X, PN_COND_TRUE);
        let pf = g.new_proj(cond, Mode::X, PN_COND_FALSE);
        let bt = g.new_block(false);
        let bf = g.new_block(false);
        g.add_block_pred(bt, pt);
        g.add_block_pred(bf, pf);
        let jt = g.new_jmp(bt);
        let jf = g.new_jmp(bf);
        let join = g.new_block(false);
        g.add_block_pred(join, jt);
        g.add_block_pred(join, jf);
        let phi = g.new_phi(join, Mode::I32, vec![lhs, rhs]);
        block = join;
        value = phi;
    }
    let ret = g.new_return(block, mem, vec![value]);
    let eb = g.end_block();
    g.add_block_pred(eb, ret);
    g
}

pub fn benchmark_combined(c: &mut Criterion) {
    let mut group = c.benchmark_group("combined-pass");
    configure_benchmark_group(&mut group, 2, 8);

    for size in [4usize, 32, 128] {
        let graph = diamond_chain(size);
        let entities = EntityTable::new();
        group.throughput(Throughput::Elements(graph.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| {
                let mut g = graph.clone();
                let mut opt = CombinedOptimizer::default();
                let changed = opt.optimize_graph(&mut g, &entities).expect("bench graph must verify");
                black_box(changed);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_combined);
criterion_main!(benches);
