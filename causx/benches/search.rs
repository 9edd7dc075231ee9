// CausX - Rust library for constraint-based causal structure search
//         using conditional-independence oracles
// Copyright (C) 2021 - Aleks Kissinger
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use causx::fas::FasMode;
use causx::indep::DSeparationTest;
use causx::random_graph::RandomDagBuilder;
use causx::search::{Fci, GraphSearch, Pc, SearchParams};
use causx::Graph;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn truth(nodes: usize) -> Graph {
    RandomDagBuilder::new()
        .seed(1337)
        .nodes(nodes)
        .edges(nodes * 3 / 2)
        .build()
        .unwrap()
}

fn bench_pc(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc");
    for nodes in [10, 20, 40] {
        let test = DSeparationTest::new(truth(nodes));
        for mode in [FasMode::Stable, FasMode::Concurrent] {
            let params = SearchParams::default().with_fas_mode(mode);
            group.bench_with_input(BenchmarkId::new(format!("{mode:?}"), nodes), &params, |b, params| {
                b.iter(|| {
                    let res = Pc::new(&test).with_params(params.clone()).search().unwrap();
                    std::hint::black_box(res.graph);
                });
            });
        }
    }
    group.finish();
}

fn bench_fci(c: &mut Criterion) {
    let mut group = c.benchmark_group("fci");
    group.sample_size(20);
    for nodes in [10, 20] {
        let test = DSeparationTest::new(truth(nodes));
        group.bench_function(BenchmarkId::from_parameter(nodes), |b| {
            b.iter(|| {
                let res = Fci::new(&test).search().unwrap();
                std::hint::black_box(res.graph);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pc, bench_fci);
criterion_main!(benches);
