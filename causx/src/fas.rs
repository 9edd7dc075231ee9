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

//! Fast adjacency search.
//!
//! Starting from the complete undirected graph over the oracle's variables,
//! every adjacency `x - y` is tested against conditioning sets of growing size
//! `d = 0, 1, ...` drawn from the possible parents of `x` (and then of `y`).
//! The first independence found removes the edge and its conditioning set is
//! recorded as the sepset of the pair.

use crate::choose::{select, ChoiceGenerator};
use crate::graph::{GraphLike, V};
use crate::indep::IndependenceTest;
use crate::knowledge::Knowledge;
use crate::search::{SearchError, SearchReport};
use crate::sepset::SepsetMap;
use crate::vec_graph::Graph;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How removals within one depth interact.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FasMode {
    /// Remove edges as soon as they are found independent. Later tests at
    /// the same depth see the smaller neighbourhoods, so the result depends
    /// on the variable order.
    Sequential,
    /// Test every edge of a depth against the neighbourhoods as they stood at
    /// the start of the depth, and apply the removals afterwards.
    #[default]
    Stable,
    /// As `Stable`, with the edges of a depth tested in parallel.
    Concurrent,
}

/// The skeleton under construction.
struct State {
    g: Graph,
    sepsets: SepsetMap,
    /// Pairs found independent but kept for knowledge. They are not tested again.
    vetoed: FxHashSet<(V, V)>,
}

impl State {
    /// Adjacencies still open to testing, sorted.
    fn candidate_edges(&self) -> Vec<(V, V)> {
        let mut es: Vec<(V, V)> = self
            .g
            .edges()
            .map(|e| (e.node1, e.node2))
            .filter(|p| !self.vetoed.contains(p))
            .collect();
        es.sort_unstable();
        es
    }
}

/// Skeleton and sepsets produced by [`Fas::search`].
#[derive(Debug, Clone)]
pub struct FasResult {
    pub graph: Graph,
    pub sepsets: SepsetMap,
}

enum Verdict {
    Keep,
    Remove(Vec<V>),
    Vetoed(Vec<V>),
}

/// What testing a single adjacency produced.
struct Outcome {
    x: V,
    y: V,
    verdict: Verdict,
    tests: usize,
    undetermined: Vec<(V, V, Vec<V>)>,
}

pub struct Fas<'a, T: IndependenceTest> {
    test: &'a T,
    knowledge: Option<&'a Knowledge>,
    depth: Option<usize>,
    mode: FasMode,
    timeout: Option<Duration>,
}

impl<'a, T: IndependenceTest> Fas<'a, T> {
    pub fn new(test: &'a T) -> Self {
        Fas {
            test,
            knowledge: None,
            depth: None,
            mode: FasMode::default(),
            timeout: None,
        }
    }

    /// Largest conditioning set to try. `None` means no limit.
    pub fn depth(&mut self, depth: Option<usize>) -> &mut Self {
        self.depth = depth;
        self
    }

    pub fn mode(&mut self, mode: FasMode) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn knowledge(&mut self, knowledge: &'a Knowledge) -> &mut Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Stop starting new depths once this much time has passed.
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    fn name(&self, v: V) -> &str {
        &self.test.variables()[v]
    }

    fn forbidden_both_ways(&self, x: V, y: V) -> bool {
        self.knowledge.is_some_and(|k| {
            k.is_forbidden(self.name(x), self.name(y)) && k.is_forbidden(self.name(y), self.name(x))
        })
    }

    fn no_edge_required(&self, x: V, y: V) -> bool {
        self.knowledge
            .map_or(true, |k| k.no_edge_required(self.name(x), self.name(y)))
    }

    fn possible_parents(&self, x: V, y: V, adj_x: &[V]) -> Vec<V> {
        adj_x
            .iter()
            .copied()
            .filter(|&z| z != y)
            .filter(|&z| {
                self.knowledge
                    .map_or(true, |k| k.possible_parent_of(self.name(z), self.name(x)))
            })
            .collect()
    }

    /// Test the adjacency `x - y` with conditioning sets of size `d` taken
    /// from the given neighbourhoods.
    fn test_edge(&self, x: V, y: V, adj_x: &[V], adj_y: &[V], d: usize) -> Outcome {
        let mut out = Outcome {
            x,
            y,
            verdict: Verdict::Keep,
            tests: 0,
            undetermined: Vec::new(),
        };
        for (a, b, adj) in [(x, y, adj_x), (y, x, adj_y)] {
            let ppa = self.possible_parents(a, b, adj);
            if ppa.len() < d {
                continue;
            }
            let mut cg = ChoiceGenerator::new(ppa.len(), d);
            while let Some(choice) = cg.next_choice() {
                let z = select(choice, &ppa);
                match self.test.check_independence(x, y, &z) {
                    Ok(r) => {
                        out.tests += 1;
                        if r.independent {
                            out.verdict = if self.no_edge_required(x, y) {
                                Verdict::Remove(z)
                            } else {
                                Verdict::Vetoed(z)
                            };
                            return out;
                        }
                    }
                    Err(e) => {
                        log::warn!("fas: {e}; keeping {} - {}", self.name(x), self.name(y));
                        out.undetermined.push((x, y, z));
                    }
                }
            }
        }
        out
    }

    /// Fold one outcome into the graph, sepsets and report.
    fn apply(&self, out: Outcome, st: &mut State, report: &mut SearchReport) {
        report.tests_performed += out.tests;
        report.undetermined_tests.extend(out.undetermined);
        match out.verdict {
            Verdict::Keep => {}
            Verdict::Remove(z) => {
                log::debug!(
                    "fas: removing {} - {} given {:?}",
                    self.name(out.x),
                    self.name(out.y),
                    z.iter().map(|&v| self.name(v)).collect::<Vec<_>>()
                );
                st.g.remove_edge(out.x, out.y);
                st.sepsets.set(out.x, out.y, z);
            }
            Verdict::Vetoed(z) => {
                log::warn!(
                    "fas: {} and {} test independent given {:?}, but an edge is required",
                    self.name(out.x),
                    self.name(out.y),
                    z.iter().map(|&v| self.name(v)).collect::<Vec<_>>()
                );
                if st.vetoed.insert((out.x, out.y)) {
                    report.vetoed_removals.push((out.x, out.y));
                }
            }
        }
    }

    fn adjacency_snapshot(g: &Graph) -> Vec<Vec<V>> {
        let n = g.nodes().max().map_or(0, |v| v + 1);
        let mut adj = vec![Vec::new(); n];
        for v in g.nodes() {
            adj[v] = g.neighbor_vec(v);
            adj[v].sort_unstable();
        }
        adj
    }

    fn search_at_depth_eager(&self, st: &mut State, d: usize, report: &mut SearchReport) {
        for (x, y) in st.candidate_edges() {
            if !st.g.is_adjacent_to(x, y) {
                continue;
            }
            let mut adj_x = st.g.neighbor_vec(x);
            let mut adj_y = st.g.neighbor_vec(y);
            adj_x.sort_unstable();
            adj_y.sort_unstable();
            let out = self.test_edge(x, y, &adj_x, &adj_y, d);
            self.apply(out, st, report);
        }
    }

    fn search_at_depth_stable(&self, st: &mut State, d: usize, report: &mut SearchReport) {
        let adj = Self::adjacency_snapshot(&st.g);
        let edges = st.candidate_edges();
        let outcomes: Vec<Outcome> = if self.mode == FasMode::Concurrent {
            edges
                .into_par_iter()
                .map(|(x, y)| self.test_edge(x, y, &adj[x], &adj[y], d))
                .collect()
        } else {
            edges
                .into_iter()
                .map(|(x, y)| self.test_edge(x, y, &adj[x], &adj[y], d))
                .collect()
        };
        for out in outcomes {
            self.apply(out, st, report);
        }
    }

    /// Largest number of candidates any adjacency could still draw from.
    fn free_degree(g: &Graph) -> usize {
        g.nodes().map(|v| g.degree(v).saturating_sub(1)).max().unwrap_or(0)
    }

    pub fn search(&self, report: &mut SearchReport) -> Result<FasResult, SearchError> {
        let start = Instant::now();
        let mut st = State {
            g: Graph::complete(self.test.variables())?,
            sepsets: SepsetMap::new(),
            vetoed: FxHashSet::default(),
        };

        for (x, y) in st.candidate_edges() {
            if self.forbidden_both_ways(x, y) {
                if self.no_edge_required(x, y) {
                    st.g.remove_edge(x, y);
                    st.sepsets.set(x, y, Vec::new());
                } else {
                    log::warn!(
                        "fas: edge between {} and {} is both required and forbidden",
                        self.name(x),
                        self.name(y)
                    );
                    report.knowledge_conflicts.push((x, y));
                }
            }
        }

        let mut d = 0;
        loop {
            if self.depth.is_some_and(|max| d > max) {
                break;
            }
            if self.timeout.is_some_and(|t| start.elapsed() > t) {
                log::warn!("fas: timed out before depth {d}");
                report.truncated = true;
                break;
            }
            log::info!("fas: depth {d}, {} edges", st.g.num_edges());
            match self.mode {
                FasMode::Sequential => self.search_at_depth_eager(&mut st, d, report),
                FasMode::Stable | FasMode::Concurrent => self.search_at_depth_stable(&mut st, d, report),
            }
            report.depth_reached = Some(d);
            if Self::free_degree(&st.g) <= d {
                break;
            }
            d += 1;
        }

        log::info!("fas: done, {} edges, {} tests", st.g.num_edges(), report.tests_performed);
        Ok(FasResult {
            graph: st.g,
            sepsets: st.sepsets,
        })
    }
}
