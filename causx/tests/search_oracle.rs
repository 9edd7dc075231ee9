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

//! Searches driven by the d-separation oracle of random DAGs, where the
//! right answer is known.

use causx::ccd::Ccd;
use causx::compare::{adjacency_confusion, arrowhead_confusion, Counts};
use causx::fas::FasMode;
use causx::graph::{Endpoint, GraphLike};
use causx::indep::DSeparationTest;
use causx::knowledge::Knowledge;
use causx::meek::pattern_from_dag;
use causx::random_graph::RandomDagBuilder;
use causx::search::{Fci, GraphSearch, Pc, SearchParams};
use causx::Graph;
use rstest::rstest;

fn dag(seed: u64) -> Graph {
    RandomDagBuilder::new().seed(seed).nodes(8).edges(11).build().unwrap()
}

fn exact(c: Counts) -> bool {
    c.fp == 0 && c.fn_ == 0
}

#[rstest]
fn pc_recovers_the_pattern(#[values(0, 1, 2, 3, 4, 5)] seed: u64) {
    let truth = dag(seed);
    let res = Pc::new(DSeparationTest::new(truth.clone())).search().unwrap();
    assert!(exact(adjacency_confusion(&res.graph, &truth)));
    assert_eq!(res.graph, pattern_from_dag(&truth).unwrap());
    assert!(res.report.is_clean());
}

#[rstest]
fn adjacency_modes_agree(#[values(0, 1, 2)] seed: u64) {
    let truth = dag(seed);
    let test = DSeparationTest::new(truth.clone());
    let run = |mode| {
        Pc::new(&test)
            .with_params(SearchParams::default().with_fas_mode(mode))
            .search()
            .unwrap()
    };
    let stable = run(FasMode::Stable);
    let concurrent = run(FasMode::Concurrent);
    let sequential = run(FasMode::Sequential);
    assert_eq!(stable.graph, concurrent.graph);
    assert_eq!(stable.sepsets, concurrent.sepsets);
    // with a perfect oracle the order of removals cannot change the skeleton
    assert!(exact(adjacency_confusion(&sequential.graph, &truth)));
}

#[rstest]
fn cpc_agrees_with_pc(#[values(0, 1, 2)] seed: u64) {
    let truth = dag(seed);
    let pc = Pc::new(DSeparationTest::new(truth.clone())).search().unwrap();
    let cpc = Pc::conservative(DSeparationTest::new(truth)).search().unwrap();
    assert_eq!(pc.graph, cpc.graph);
    assert!(cpc.report.ambiguous.is_empty());
}

#[rstest]
fn full_tiers_orient_everything(#[values(0, 1, 2)] seed: u64) {
    let truth = dag(seed);
    let mut k = Knowledge::new(truth.nodes().map(|v| truth.name(v).to_string()));
    for v in truth.nodes() {
        k.add_to_tier(v, truth.name(v)).unwrap();
    }
    let res = Pc::new(DSeparationTest::new(truth.clone()))
        .with_knowledge(k.clone())
        .search()
        .unwrap();
    assert_eq!(res.graph, truth);
    assert!(!k.is_violated_by(&res.graph));
}

#[rstest]
fn fci_arrowheads_are_sound(#[values(0, 1, 2, 3)] seed: u64) {
    let truth = dag(seed);
    let pattern = pattern_from_dag(&truth).unwrap();
    let res = Fci::new(DSeparationTest::new(truth.clone())).search().unwrap();
    assert!(exact(adjacency_confusion(&res.graph, &truth)));
    assert_eq!(arrowhead_confusion(&res.graph, &pattern).fp, 0);
    assert!(res.graph.edges().all(|e| !e.is_bidirected()));
}

#[test]
fn fci_with_latents_keeps_measured_adjacencies() {
    let truth: Graph = RandomDagBuilder::new().seed(42).nodes(9).edges(12).latents(2).build().unwrap();
    let res = Fci::new(DSeparationTest::new(truth.clone())).search().unwrap();
    // every edge between measured nodes of the truth survives
    for e in truth.edges() {
        let (a, b) = (truth.name(e.node1), truth.name(e.node2));
        if let (Some(x), Some(y)) = (res.graph.node_by_name(a), res.graph.node_by_name(b)) {
            assert!(res.graph.is_adjacent_to(x, y), "{a} - {b} missing");
        }
    }
    assert!(res.graph.edges().all(|e| e.endpoint1 != Endpoint::Null && e.endpoint2 != Endpoint::Null));
}

#[rstest]
fn ccd_on_dags_finds_the_skeleton(#[values(0, 1, 2)] seed: u64) {
    let truth = dag(seed);
    let ccd = Ccd::new(DSeparationTest::new(truth.clone()));
    let res = ccd.search().unwrap();
    assert!(exact(adjacency_confusion(&res.graph, &truth)));
    assert!(ccd.test().hits() > 0);
}
