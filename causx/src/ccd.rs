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

//! Cyclic causal discovery.
//!
//! The search tolerates feedback loops in the true model, so no rule ever
//! checks for directed cycles. Besides the usual underline triples it marks
//! dotted-underline triples: colliders `a *-> b <-* c` where `a` and `c` are
//! separated by a superset of their sepset that contains `b`.

use crate::colliders::{knowledge_conflict, unshielded_triples};
use crate::graph::{Endpoint, GraphLike, Triple, V};
use crate::indep::{CachingTest, IndependenceTest};
use crate::knowledge::Knowledge;
use crate::search::{adjacency_search, GraphSearch, SearchError, SearchParams, SearchReport, SearchResult};
use crate::sepset::{SepsetProducer, SepsetsMaxP};
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

/// Orient `u --> v`, replacing whatever edge joins them, unless knowledge
/// forbids it.
fn add_directed_if_allowed(
    g: &mut impl GraphLike,
    u: V,
    v: V,
    knowledge: &Knowledge,
    report: &mut SearchReport,
) -> Result<bool, SearchError> {
    if knowledge.is_forbidden(g.name(u), g.name(v)) {
        knowledge_conflict(g, u, v, report);
        return Ok(false);
    }
    g.remove_edge(u, v);
    g.add_directed_edge(u, v)?;
    Ok(true)
}

/// Propagate `a --> b` onwards: every `b o-o c` with `a - b - c` underlined
/// becomes `b --> c`, and so on from `c`.
fn orient_away_from_arrow(
    g: &mut impl GraphLike,
    a: V,
    b: V,
    knowledge: &Knowledge,
    report: &mut SearchReport,
) -> Result<(), SearchError> {
    let mut stack = vec![(a, b)];
    while let Some((a, b)) = stack.pop() {
        for c in g.neighbor_vec(b) {
            if c == a || !g.edge(b, c).is_some_and(|e| e.is_nondirected()) {
                continue;
            }
            if !g.is_underline_triple(a, b, c) {
                continue;
            }
            if add_directed_if_allowed(g, b, c, knowledge, report)? {
                log::debug!("ccd: away from arrow {} --> {}", g.name(b), g.name(c));
                stack.push((b, c));
            }
        }
    }
    Ok(())
}

/// `adj(x)` together with every `z` such that `x *-> y <-* z`.
fn local(g: &impl GraphLike, x: V) -> Vec<V> {
    let mut out: FxHashSet<V> = g.neighbors(x).collect();
    for y in g.neighbor_vec(x) {
        for z in g.neighbors(y) {
            if z != x && g.is_def_collider(x, y, z) {
                out.insert(z);
            }
        }
    }
    let mut out: Vec<V> = out.into_iter().collect();
    out.sort_unstable();
    out
}

/// State carried between the orientation steps.
struct Steps<'a, S: SepsetProducer> {
    sepsets: &'a S,
    knowledge: &'a Knowledge,
    depth: Option<usize>,
    sup_sepsets: FxHashMap<Triple, Vec<V>>,
}

impl<S: SepsetProducer> Steps<'_, S> {
    fn independent(&self, x: V, y: V, z: &[V], report: &mut SearchReport) -> Option<bool> {
        match self.sepsets.is_independent(x, y, z) {
            Ok(b) => {
                report.tests_performed += 1;
                Some(b)
            }
            Err(e) => {
                log::warn!("ccd: {e}");
                report.undetermined_tests.push((x, y, z.to_vec()));
                None
            }
        }
    }

    /// Underlines and colliders on unshielded triples.
    fn step_b(&mut self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<(), SearchError> {
        for (a, b, c) in unshielded_triples(g) {
            let t = Triple::new(a, b, c);
            match self.sepsets.sepset(a, c) {
                None => {
                    g.add_ambiguous_triple(a, b, c);
                    report.ambiguous.push(t);
                }
                Some(s) if s.contains(&b) => {
                    g.add_underline_triple(a, b, c);
                    report.noncolliders.push(t);
                }
                Some(_) => {
                    let ok1 = add_directed_if_allowed(g, a, b, self.knowledge, report)?;
                    let ok2 = add_directed_if_allowed(g, c, b, self.knowledge, report)?;
                    if ok1 && ok2 {
                        log::debug!("ccd: collider {} --> {} <-- {}", g.name(a), g.name(b), g.name(c));
                        report.colliders.push(t);
                    } else {
                        report.skipped_colliders.push(t);
                    }
                }
            }
        }
        Ok(())
    }

    /// `y o-? x` becomes `y --> x` when some `a`, adjacent to neither, has
    /// `x` outside its sepset with `y` and is still dependent on `x` given
    /// that sepset.
    fn step_c(&mut self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<(), SearchError> {
        let max_passes = 2 * g.num_edges() + 1;
        for _ in 0..max_passes {
            let mut changed = false;
            for e in g.edge_vec() {
                for (x, y) in [(e.node1, e.node2), (e.node2, e.node1)] {
                    if self.step_c_edge(g, x, y, report)? {
                        changed = true;
                        break;
                    }
                }
            }
            if !changed {
                return Ok(());
            }
        }
        log::warn!("ccd: step C did not settle after {max_passes} passes");
        report.truncated = true;
        Ok(())
    }

    fn step_c_edge(&mut self, g: &mut impl GraphLike, x: V, y: V, report: &mut SearchReport) -> Result<bool, SearchError> {
        if g.endpoint(y, x) != Endpoint::Circle || !matches!(g.endpoint(x, y), Endpoint::Circle | Endpoint::Tail) {
            return Ok(false);
        }
        let blocked = g
            .neighbors(x)
            .any(|n| g.endpoint(n, x) == Endpoint::Arrow && g.is_underline_triple(y, x, n));
        if blocked {
            return Ok(false);
        }
        for a in g.node_vec() {
            if a == x || a == y || g.is_adjacent_to(a, x) || g.is_adjacent_to(a, y) {
                continue;
            }
            let Some(s) = self.sepsets.sepset(a, y) else {
                continue;
            };
            if s.contains(&x) {
                continue;
            }
            if self.independent(a, x, &s, report) == Some(false) {
                if add_directed_if_allowed(g, y, x, self.knowledge, report)? {
                    log::debug!("ccd: step C {} --> {}", g.name(y), g.name(x));
                    orient_away_from_arrow(g, y, x, self.knowledge, report)?;
                    return Ok(true);
                }
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Dotted underlines and their super-sepsets.
    fn step_d(&mut self, g: &mut impl GraphLike, report: &mut SearchReport) {
        let locals: FxHashMap<V, Vec<V>> = g.nodes().map(|v| (v, local(g, v))).collect();
        for b in g.node_vec() {
            let adj = g.neighbor_vec(b);
            for (&a, &c) in adj.iter().tuple_combinations() {
                if !g.is_def_collider(a, b, c) {
                    continue;
                }
                let Some(s) = self.sepsets.sepset(a, c) else {
                    continue;
                };
                let tt: Vec<V> = locals[&a]
                    .iter()
                    .copied()
                    .filter(|v| !s.contains(v) && *v != b && *v != c)
                    .collect();
                for t in crate::choose::DepthChoiceGenerator::new(tt.len(), self.depth) {
                    let mut sup: Vec<V> = crate::choose::select(&t, &tt);
                    sup.extend(s.iter().copied());
                    sup.push(b);
                    sup.sort_unstable();
                    if self.independent(a, c, &sup, report) == Some(true) {
                        log::debug!("ccd: dotted underline {} - {} - {}", g.name(a), g.name(b), g.name(c));
                        g.add_dotted_underline_triple(a, b, c);
                        self.sup_sepsets.insert(Triple::new(a, b, c), sup);
                        break;
                    }
                }
            }
        }
    }

    fn dotted_triples(g: &impl GraphLike) -> Vec<Triple> {
        let mut ts: Vec<Triple> = g.triples().dotted_underline.iter().copied().collect();
        ts.sort_unstable();
        ts
    }

    /// Orient out of `b` towards the neighbours of `a` and `c`, using the
    /// super-sepset of each dotted triple.
    fn step_e(&mut self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<(), SearchError> {
        for t in Self::dotted_triples(g) {
            let Some(sup) = self.sup_sepsets.get(&t) else {
                continue;
            };
            let b = t.y;
            for end in [t.x, t.z] {
                for d in g.neighbor_vec(end) {
                    if d == b || g.endpoint(b, d) != Endpoint::Circle {
                        continue;
                    }
                    if sup.contains(&d) {
                        g.set_endpoint(b, d, Endpoint::Tail)?;
                    } else if g.endpoint(d, b) != Endpoint::Arrow {
                        add_directed_if_allowed(g, b, d, self.knowledge, report)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// `b o-? d` becomes `b --> d` when adding `d` to the super-sepset makes
    /// `a` and `c` dependent.
    fn step_f(&mut self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<(), SearchError> {
        for t in Self::dotted_triples(g) {
            let Some(sup) = self.sup_sepsets.get(&t).cloned() else {
                continue;
            };
            let (a, b, c) = (t.x, t.y, t.z);
            let candidates: Vec<V> = g.neighbors(a).chain(g.neighbors(c)).sorted().dedup().collect();
            for d in candidates {
                if g.endpoint(b, d) != Endpoint::Circle || g.endpoint(d, b) == Endpoint::Arrow {
                    continue;
                }
                if g.is_adjacent_to(a, d) && g.is_adjacent_to(c, d) {
                    continue;
                }
                let mut z = sup.clone();
                z.push(d);
                if self.independent(a, c, &z, report) == Some(false)
                    && add_directed_if_allowed(g, b, d, self.knowledge, report)?
                {
                    log::debug!("ccd: step F {} --> {}", g.name(b), g.name(d));
                    orient_away_from_arrow(g, b, d, self.knowledge, report)?;
                }
            }
        }
        Ok(())
    }

    /// Push away from every directed edge.
    fn away_from_arrows(&mut self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<(), SearchError> {
        for e in g.edge_vec() {
            let Some(cur) = g.edge(e.node1, e.node2) else {
                continue;
            };
            if cur.points_towards(e.node1) {
                orient_away_from_arrow(g, e.node2, e.node1, self.knowledge, report)?;
            } else if cur.points_towards(e.node2) {
                orient_away_from_arrow(g, e.node1, e.node2, self.knowledge, report)?;
            }
        }
        Ok(())
    }
}

/// Cyclic causal discovery over the measured variables.
///
/// Queries go through a [`CachingTest`], since the later steps ask the same
/// questions as the sepset search many times over. Required edges are not
/// supported.
pub struct Ccd<T: IndependenceTest> {
    test: CachingTest<T>,
    knowledge: Knowledge,
    params: SearchParams,
}

impl<T: IndependenceTest> Ccd<T> {
    pub fn new(test: T) -> Self {
        Ccd {
            test: CachingTest::new(test),
            knowledge: Knowledge::default(),
            params: SearchParams::default(),
        }
    }

    pub fn with_knowledge(&mut self, knowledge: Knowledge) -> &mut Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_params(&mut self, params: SearchParams) -> &mut Self {
        self.params = params;
        self
    }

    pub fn test(&self) -> &CachingTest<T> {
        &self.test
    }
}

impl<T: IndependenceTest> GraphSearch for Ccd<T> {
    fn search(&self) -> Result<SearchResult, SearchError> {
        let knowledge = self.knowledge.for_variables(self.test.variables())?;
        if !knowledge.required_edges().is_empty() {
            return Err(SearchError::Unsupported("required edges in knowledge for CCD".into()));
        }
        let mut report = SearchReport::default();
        let (mut g, sepsets) = adjacency_search(&self.test, &knowledge, &self.params, &mut report)?;
        g.reorient_all_with(Endpoint::Circle)?;

        let producer = SepsetsMaxP::new(&g, &self.test, self.params.depth);
        let mut steps = Steps {
            sepsets: &producer,
            knowledge: &knowledge,
            depth: self.params.depth,
            sup_sepsets: FxHashMap::default(),
        };

        log::info!("ccd: step B");
        steps.step_b(&mut g, &mut report)?;
        log::info!("ccd: step C");
        steps.step_c(&mut g, &mut report)?;
        log::info!("ccd: step D");
        steps.step_d(&mut g, &mut report);
        log::info!("ccd: steps E and F");
        steps.step_e(&mut g, &mut report)?;
        steps.step_f(&mut g, &mut report)?;
        steps.away_from_arrows(&mut g, &mut report)?;
        log::info!("ccd: done, {} edges, {} cached tests", g.num_edges(), self.test.len());

        Ok(SearchResult {
            graph: g,
            sepsets,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::indep::DSeparationTest;
    use crate::vec_graph::Graph;
    use rstest::{fixture, rstest};

    /// A -> C <- B, C -> D
    #[fixture]
    fn collider() -> Graph {
        let mut g = Graph::with_nodes(["A", "B", "C", "D"]).unwrap();
        g.add_directed_edge(0, 2).unwrap();
        g.add_directed_edge(1, 2).unwrap();
        g.add_directed_edge(2, 3).unwrap();
        g
    }

    #[rstest]
    fn orients_collider_and_away(collider: Graph) {
        let res = Ccd::new(DSeparationTest::new(collider.clone())).search().unwrap();
        assert_eq!(res.graph, collider);
        assert!(res.graph.is_underline_triple(0, 2, 3));
        assert_eq!(res.report.colliders, vec![Triple::new(0, 2, 1)]);
    }

    #[rstest]
    fn rejects_required_edges(collider: Graph) {
        let mut k = Knowledge::new(["A", "B", "C", "D"]);
        k.set_required("A", "C").unwrap();
        let err = Ccd::new(DSeparationTest::new(collider)).with_knowledge(k).search().unwrap_err();
        assert!(matches!(err, SearchError::Unsupported(_)));
    }

    #[rstest]
    fn knowledge_vetoes_half_collider(collider: Graph) {
        let mut k = Knowledge::new(["A", "B", "C", "D"]);
        k.set_forbidden("B", "C").unwrap();
        let res = Ccd::new(DSeparationTest::new(collider)).with_knowledge(k).search().unwrap();
        assert!(res.graph.is_parent_of(0, 2));
        assert_eq!(res.graph.edge(1, 2), Some(Edge::nondirected(1, 2)));
        assert_eq!(res.report.skipped_colliders, vec![Triple::new(0, 2, 1)]);
        assert!(res.report.knowledge_conflicts.contains(&(1, 2)));
    }

    #[test]
    fn no_dotted_underline_without_feedback() {
        // A -> B <- C, B -> D: A and C are only separated by the empty set
        let mut g = Graph::with_nodes(["A", "B", "C", "D"]).unwrap();
        g.add_directed_edge(0, 1).unwrap();
        g.add_directed_edge(2, 1).unwrap();
        g.add_directed_edge(1, 3).unwrap();
        let res = Ccd::new(DSeparationTest::new(g.clone())).search().unwrap();
        assert!(res.graph.triples().dotted_underline.is_empty());
        assert_eq!(res.graph, g);
        assert!(!res.report.truncated);
    }

    #[test]
    fn feedback_loop_gets_dotted_underline() {
        // A -> X, B -> Z, X -> Y -> Z -> X
        let mut truth = Graph::with_nodes(["A", "B", "X", "Y", "Z"]).unwrap();
        let (a, b, x, y, z) = (0, 1, 2, 3, 4);
        truth.add_directed_edge(a, x).unwrap();
        truth.add_directed_edge(b, z).unwrap();
        truth.add_directed_edge(x, y).unwrap();
        truth.add_directed_edge(y, z).unwrap();
        truth.add_directed_edge(z, x).unwrap();
        let res = Ccd::new(DSeparationTest::new(truth)).search().unwrap();
        let g = &res.graph;

        // parents of the loop are dependent on the loop node feeding their child
        assert_eq!(g.num_edges(), 7);
        assert!(g.is_adjacent_to(a, z));
        assert!(g.is_adjacent_to(b, y));
        for (u, v) in [(a, b), (a, y), (b, x)] {
            assert!(!g.is_adjacent_to(u, v));
        }

        assert_eq!(res.report.colliders, vec![Triple::new(a, z, b)]);
        assert!(g.is_parent_of(a, z) && g.is_parent_of(b, z));
        // A and B are also separated by {X, Z}, which holds the collider
        assert!(g.is_dotted_underline_triple(a, z, b));
        assert_eq!(g.triples().dotted_underline.len(), 1);

        // step C, then away from the arrow along the underlines
        assert!(g.is_parent_of(a, x));
        assert!(g.is_parent_of(x, y));
        assert!(g.is_parent_of(y, b));

        // X is in the super-sepset, Y is not
        assert_eq!(g.endpoint(z, x), Endpoint::Tail);
        assert_eq!(g.endpoint(x, z), Endpoint::Circle);
        assert!(g.is_parent_of(z, y));
        assert!(!res.report.truncated);
    }

    #[test]
    fn caching_is_used() {
        let mut g = Graph::with_nodes(["A", "B", "C", "D", "E"]).unwrap();
        g.add_directed_edge(0, 2).unwrap();
        g.add_directed_edge(1, 2).unwrap();
        g.add_directed_edge(2, 3).unwrap();
        g.add_directed_edge(3, 4).unwrap();
        let ccd = Ccd::new(DSeparationTest::new(g));
        ccd.search().unwrap();
        assert!(ccd.test().hits() > 0);
    }
}
