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

use crate::choose::{select, ChoiceGenerator};
use crate::graph::{GraphLike, V};
use crate::indep::IndependenceTest;
use crate::knowledge::Knowledge;
use crate::search::{SearchError, SearchReport};
use crate::sepset::SepsetMap;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Nodes reachable from `x` along paths whose every inner node is a definite
/// collider or sits in a triangle with its two path neighbours.
///
/// Paths longer than `max_len` edges are not followed. The result is sorted
/// and never contains `x`.
pub fn possible_d_sep(g: &impl GraphLike, x: V, max_len: Option<usize>) -> Vec<V> {
    let mut found = FxHashSet::default();
    let mut seen = FxHashSet::default();
    let mut queue = VecDeque::new();
    for b in g.neighbors(x) {
        found.insert(b);
        seen.insert((x, b));
        queue.push_back((x, b, 1));
    }

    while let Some((a, b, len)) = queue.pop_front() {
        if max_len.is_some_and(|m| len >= m) {
            continue;
        }
        for c in g.neighbors(b) {
            if c == a || c == x {
                continue;
            }
            if !(g.is_def_collider(a, b, c) || g.is_adjacent_to(a, c)) {
                continue;
            }
            found.insert(c);
            if seen.insert((b, c)) {
                queue.push_back((b, c, len + 1));
            }
        }
    }

    let mut out: Vec<V> = found.into_iter().filter(|&v| v != x).collect();
    out.sort_unstable();
    out
}

/// Removes adjacencies that are separated by a subset of Possible-D-Sep.
pub struct PossibleDsep<'a, T: IndependenceTest> {
    test: &'a T,
    knowledge: &'a Knowledge,
    depth: Option<usize>,
    max_path_length: Option<usize>,
}

impl<'a, T: IndependenceTest> PossibleDsep<'a, T> {
    pub fn new(test: &'a T, knowledge: &'a Knowledge) -> Self {
        PossibleDsep {
            test,
            knowledge,
            depth: None,
            max_path_length: None,
        }
    }

    /// Largest conditioning set to try. With no limit only the whole
    /// Possible-D-Sep set is tested.
    pub fn depth(&mut self, depth: Option<usize>) -> &mut Self {
        self.depth = depth;
        self
    }

    pub fn max_path_length(&mut self, max_path_length: Option<usize>) -> &mut Self {
        self.max_path_length = max_path_length;
        self
    }

    /// Test every adjacency of `g` against Possible-D-Sep of either end,
    /// removing it on the first independence found. Removals happen straight
    /// away, so later edges see the thinner graph.
    ///
    /// Returns the number of edges removed.
    pub fn search(
        &self,
        g: &mut impl GraphLike,
        sepsets: &mut SepsetMap,
        report: &mut SearchReport,
    ) -> Result<usize, SearchError> {
        let mut removed = 0;
        for e in g.edge_vec() {
            let (x, y) = (e.node1, e.node2);
            for from in [x, y] {
                let Some(sepset) = self.find_sepset(g, from, x, y, report) else {
                    continue;
                };
                if !self.knowledge.no_edge_required(g.name(x), g.name(y)) {
                    log::warn!("possible-dsep: keeping required edge {} - {}", g.name(x), g.name(y));
                    report.vetoed_removals.push((x, y));
                    break;
                }
                log::debug!("possible-dsep: removed {} - {} given {:?}", g.name(x), g.name(y), sepset);
                g.remove_edge(x, y);
                sepsets.set(x, y, sepset);
                removed += 1;
                break;
            }
        }
        log::info!("possible-dsep: removed {removed} edges");
        Ok(removed)
    }

    fn find_sepset(&self, g: &impl GraphLike, from: V, x: V, y: V, report: &mut SearchReport) -> Option<Vec<V>> {
        let pds: Vec<V> = possible_d_sep(g, from, self.max_path_length)
            .into_iter()
            .filter(|&v| v != x && v != y)
            .collect();
        if pds.is_empty() {
            return None;
        }
        let sizes = match self.depth {
            Some(d) => 1..=d.min(pds.len()),
            None => pds.len()..=pds.len(),
        };
        for k in sizes {
            let mut cg = ChoiceGenerator::new(pds.len(), k);
            while let Some(choice) = cg.next_choice() {
                let s = select(choice, &pds);
                match self.test.check_independence(x, y, &s) {
                    Ok(r) => {
                        report.tests_performed += 1;
                        if r.independent {
                            return Some(s);
                        }
                    }
                    Err(err) => {
                        log::warn!("possible-dsep: {err}");
                        report.undetermined_tests.push((x, y, s));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indep::DSeparationTest;
    use crate::vec_graph::Graph;
    use rstest::{fixture, rstest};

    /// X o-o Y, X o-> A <-o W, with the truth X <- W -> Y, X -> A <- W
    #[fixture]
    fn setup() -> (Graph, DSeparationTest<Graph>) {
        let mut pag = Graph::with_nodes(["X", "Y", "A", "W"]).unwrap();
        pag.add_nondirected_edge(0, 1).unwrap();
        pag.add_partially_oriented_edge(0, 2).unwrap();
        pag.add_partially_oriented_edge(3, 2).unwrap();

        let mut truth = Graph::with_nodes(["X", "Y", "A", "W"]).unwrap();
        truth.add_directed_edge(3, 0).unwrap();
        truth.add_directed_edge(3, 1).unwrap();
        truth.add_directed_edge(0, 2).unwrap();
        truth.add_directed_edge(3, 2).unwrap();
        (pag, DSeparationTest::new(truth))
    }

    #[rstest]
    fn reachability(setup: (Graph, DSeparationTest<Graph>)) {
        let (pag, _) = setup;
        assert_eq!(possible_d_sep(&pag, 0, None), vec![1, 2, 3]);
        assert_eq!(possible_d_sep(&pag, 0, Some(1)), vec![1, 2]);
        // X is not a collider on Y - X - A
        assert_eq!(possible_d_sep(&pag, 1, None), vec![0]);
    }

    #[rstest]
    #[case(Some(1), vec![3])]
    #[case(None, vec![2, 3])]
    fn removes_separated_edge(
        setup: (Graph, DSeparationTest<Graph>),
        #[case] depth: Option<usize>,
        #[case] expected: Vec<V>,
    ) {
        let (mut pag, t) = setup;
        let k = Knowledge::default();
        let mut sepsets = SepsetMap::new();
        let mut report = SearchReport::default();
        let removed = PossibleDsep::new(&t, &k)
            .depth(depth)
            .search(&mut pag, &mut sepsets, &mut report)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!pag.is_adjacent_to(0, 1));
        assert_eq!(sepsets.get(0, 1), Some(&expected[..]));
    }

    #[rstest]
    fn required_edge_is_kept(setup: (Graph, DSeparationTest<Graph>)) {
        let (mut pag, t) = setup;
        let mut k = Knowledge::new(["X", "Y", "A", "W"]);
        k.set_required("X", "Y").unwrap();
        let mut sepsets = SepsetMap::new();
        let mut report = SearchReport::default();
        let removed = PossibleDsep::new(&t, &k)
            .search(&mut pag, &mut sepsets, &mut report)
            .unwrap();
        assert_eq!(removed, 0);
        assert!(pag.is_adjacent_to(0, 1));
        assert_eq!(report.vetoed_removals, vec![(0, 1)]);
        assert!(sepsets.is_empty());
    }
}
