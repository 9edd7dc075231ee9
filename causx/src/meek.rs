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

//! Orientation rules for patterns.
//!
//! Only undirected edges are ever touched here, so the rules can be run on a
//! graph that already carries colliders and they can be run again without
//! changing anything.

use crate::colliders::{knowledge_conflict, unshielded_triples};
use crate::graph::{Endpoint, GraphLike, V};
use crate::knowledge::Knowledge;
use crate::search::{SearchError, SearchReport};

fn is_undirected(g: &impl GraphLike, a: V, b: V) -> bool {
    g.endpoint(a, b) == Endpoint::Tail && g.endpoint(b, a) == Endpoint::Tail
}

/// Orient undirected edges as knowledge dictates.
///
/// A required `x --> y` or a forbidden `y --> x` orients `x --> y`. An edge
/// pulled both ways is left alone and reported.
pub fn orient_bk(g: &mut impl GraphLike, knowledge: &Knowledge, report: &mut SearchReport) -> Result<(), SearchError> {
    if knowledge.is_empty() {
        return Ok(());
    }
    for e in g.edge_vec() {
        if !e.is_undirected() {
            continue;
        }
        let (a, b) = (e.node1, e.node2);
        let (na, nb) = (g.name(a), g.name(b));
        let a_to_b = knowledge.is_required(na, nb) || knowledge.is_forbidden(nb, na);
        let b_to_a = knowledge.is_required(nb, na) || knowledge.is_forbidden(na, nb);
        match (a_to_b, b_to_a) {
            (true, false) => {
                log::debug!("knowledge: {na} --> {nb}");
                g.orient(a, b)?;
            }
            (false, true) => {
                log::debug!("knowledge: {nb} --> {na}");
                g.orient(b, a)?;
            }
            (true, true) => knowledge_conflict(g, a, b, report),
            (false, false) => {}
        }
    }
    Ok(())
}

/// The Meek rules, run to a fixed point.
#[derive(Debug, Clone)]
pub struct MeekRules<'a> {
    knowledge: &'a Knowledge,
}

impl<'a> MeekRules<'a> {
    pub fn new(knowledge: &'a Knowledge) -> Self {
        MeekRules { knowledge }
    }

    /// Orient every undirected edge implied by the rules.
    ///
    /// Returns the number of edges oriented. Gives up after `2|E| + 1`
    /// passes and flags the report as truncated.
    pub fn orient_implied(&self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<usize, SearchError> {
        let max_passes = 2 * g.num_edges() + 1;
        let mut oriented = 0;
        for _ in 0..max_passes {
            let mut changed = false;
            for e in g.edge_vec() {
                for (a, b) in [(e.node1, e.node2), (e.node2, e.node1)] {
                    if !is_undirected(g, a, b) {
                        break;
                    }
                    let Some(rule) = self.implied(g, a, b) else {
                        continue;
                    };
                    if !self.is_arrowpoint_allowed(g, a, b) {
                        knowledge_conflict(g, a, b, report);
                        continue;
                    }
                    log::debug!("meek {rule}: {} --> {}", g.name(a), g.name(b));
                    g.orient(a, b)?;
                    oriented += 1;
                    changed = true;
                }
            }
            if !changed {
                return Ok(oriented);
            }
        }
        log::warn!("meek rules did not settle after {max_passes} passes");
        report.truncated = true;
        Ok(oriented)
    }

    fn is_arrowpoint_allowed(&self, g: &impl GraphLike, a: V, b: V) -> bool {
        let (na, nb) = (g.name(a), g.name(b));
        !self.knowledge.is_forbidden(na, nb) && !self.knowledge.is_required(nb, na)
    }

    /// Name of the first rule that forces the undirected edge `a --- b` to
    /// become `a --> b`.
    fn implied(&self, g: &impl GraphLike, a: V, b: V) -> Option<&'static str> {
        if self.r1(g, a, b) {
            Some("R1")
        } else if self.r2(g, a, b) {
            Some("R2")
        } else if self.r3(g, a, b) {
            Some("R3")
        } else if self.r4(g, a, b) {
            Some("R4")
        } else {
            None
        }
    }

    /// `c --> a --- b`, with `c` and `b` not adjacent
    fn r1(&self, g: &impl GraphLike, a: V, b: V) -> bool {
        g.parents(a)
            .into_iter()
            .any(|c| c != b && !g.is_adjacent_to(c, b) && !g.is_ambiguous_triple(c, a, b))
    }

    /// `a --> c --> b` and `a --- b`
    fn r2(&self, g: &impl GraphLike, a: V, b: V) -> bool {
        g.children(a).into_iter().any(|c| g.is_parent_of(c, b))
    }

    /// `c --> b <-- d` with `a --- c`, `a --- d` and `c`, `d` not adjacent
    fn r3(&self, g: &impl GraphLike, a: V, b: V) -> bool {
        let cands: Vec<V> = g
            .parents(b)
            .into_iter()
            .filter(|&c| is_undirected(g, a, c))
            .collect();
        cands.iter().enumerate().any(|(i, &c)| {
            cands[i + 1..]
                .iter()
                .any(|&d| !g.is_adjacent_to(c, d) && !g.is_ambiguous_triple(c, a, d))
        })
    }

    /// `d --> c --> b` with `a --- d`, `a` adjacent to `c` and `b`, `d` not
    /// adjacent
    fn r4(&self, g: &impl GraphLike, a: V, b: V) -> bool {
        g.parents(b).into_iter().any(|c| {
            c != a
                && g.is_adjacent_to(a, c)
                && g.parents(c)
                    .into_iter()
                    .any(|d| d != a && d != b && is_undirected(g, a, d) && !g.is_adjacent_to(b, d))
        })
    }
}

/// Knowledge orientation followed by the Meek rules.
pub fn orient_pattern(g: &mut impl GraphLike, knowledge: &Knowledge, report: &mut SearchReport) -> Result<(), SearchError> {
    orient_bk(g, knowledge, report)?;
    MeekRules::new(knowledge).orient_implied(g, report)?;
    Ok(())
}

/// The pattern of the Markov equivalence class of a DAG: its skeleton, its
/// unshielded colliders, and everything the Meek rules then force.
pub fn pattern_from_dag<G: GraphLike>(dag: &G) -> Result<G, SearchError> {
    let mut g = dag.clone();
    g.triples_mut().clear();
    g.reorient_all_with(Endpoint::Tail)?;
    for (x, y, z) in unshielded_triples(dag) {
        if dag.is_def_collider(x, y, z) {
            g.set_endpoint(x, y, Endpoint::Arrow)?;
            g.set_endpoint(z, y, Endpoint::Arrow)?;
        }
    }
    let knowledge = Knowledge::default();
    let mut report = SearchReport::default();
    MeekRules::new(&knowledge).orient_implied(&mut g, &mut report)?;
    Ok(g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec_graph::Graph;
    use rstest::rstest;

    fn graph(names: &[&str], directed: &[(V, V)], undirected: &[(V, V)]) -> Graph {
        let mut g = Graph::with_nodes(names.iter().copied()).unwrap();
        for &(a, b) in directed {
            g.add_directed_edge(a, b).unwrap();
        }
        for &(a, b) in undirected {
            g.add_undirected_edge(a, b).unwrap();
        }
        g
    }

    fn run(g: &mut Graph) -> usize {
        let k = Knowledge::default();
        let mut report = SearchReport::default();
        let n = MeekRules::new(&k).orient_implied(g, &mut report).unwrap();
        assert!(!report.truncated);
        n
    }

    #[test]
    fn rule1() {
        // C --> A --- B
        let mut g = graph(&["A", "B", "C"], &[(2, 0)], &[(0, 1)]);
        assert_eq!(run(&mut g), 1);
        assert!(g.is_parent_of(0, 1));
    }

    #[test]
    fn rule1_blocked_by_ambiguity() {
        let mut g = graph(&["A", "B", "C"], &[(2, 0)], &[(0, 1)]);
        g.add_ambiguous_triple(2, 0, 1);
        assert_eq!(run(&mut g), 0);
    }

    #[test]
    fn rule2() {
        // A --> C --> B, A --- B
        let mut g = graph(&["A", "B", "C"], &[(0, 2), (2, 1)], &[(0, 1)]);
        assert_eq!(run(&mut g), 1);
        assert!(g.is_parent_of(0, 1));
    }

    #[test]
    fn rule3() {
        // C --> B <-- D, A --- B, A --- C, A --- D
        let mut g = graph(&["A", "B", "C", "D"], &[(2, 1), (3, 1)], &[(0, 1), (0, 2), (0, 3)]);
        run(&mut g);
        assert!(g.is_parent_of(0, 1));
        assert!(is_undirected(&g, 0, 2));
        assert!(is_undirected(&g, 0, 3));
    }

    #[test]
    fn rule4() {
        // D --> C --> B, A --- D, A --- C, A --- B
        let mut g = graph(&["A", "B", "C", "D"], &[(3, 2), (2, 1)], &[(0, 3), (0, 2), (0, 1)]);
        run(&mut g);
        assert!(g.is_parent_of(0, 1));
    }

    #[test]
    fn diamond_pattern() {
        // X1 -> X2, X1 -> X3, X2 -> X4, X3 -> X4
        let dag = graph(&["X1", "X2", "X3", "X4"], &[(0, 1), (0, 2), (1, 3), (2, 3)], &[]);
        let p = pattern_from_dag(&dag).unwrap();
        assert!(is_undirected(&p, 0, 1));
        assert!(is_undirected(&p, 0, 2));
        assert!(p.is_parent_of(1, 3));
        assert!(p.is_parent_of(2, 3));
    }

    #[test]
    fn chain_below_collider() {
        // A -> C <- B, C -> D: D is forced by R1
        let dag = graph(&["A", "B", "C", "D"], &[(0, 2), (1, 2), (2, 3)], &[]);
        let p = pattern_from_dag(&dag).unwrap();
        assert_eq!(p, dag);
    }

    #[rstest]
    #[case(&[(0, 1), (1, 2)])]
    #[case(&[(0, 1), (0, 2), (1, 2)])]
    #[case(&[(0, 2), (1, 2), (2, 3), (3, 4), (1, 4)])]
    fn idempotent(#[case] edges: &[(V, V)]) {
        let dag = graph(&["A", "B", "C", "D", "E"], edges, &[]);
        let mut p = pattern_from_dag(&dag).unwrap();
        let before = p.clone();
        assert_eq!(run(&mut p), 0);
        assert_eq!(p, before);
    }

    #[test]
    fn knowledge_orients_and_blocks() {
        let mut g = graph(&["A", "B", "C"], &[], &[(0, 1), (1, 2)]);
        let mut k = Knowledge::new(["A", "B", "C"]);
        k.set_forbidden("B", "A").unwrap();
        let mut report = SearchReport::default();
        orient_pattern(&mut g, &k, &mut report).unwrap();
        // A --> B, and then R1 gives B --> C
        assert!(g.is_parent_of(0, 1));
        assert!(g.is_parent_of(1, 2));

        let mut g = graph(&["A", "B", "C"], &[], &[(0, 1), (1, 2)]);
        let mut k = Knowledge::new(["A", "B", "C"]);
        k.set_required("A", "B").unwrap();
        k.set_forbidden("B", "C").unwrap();
        k.set_forbidden("C", "B").unwrap();
        let mut report = SearchReport::default();
        orient_pattern(&mut g, &k, &mut report).unwrap();
        assert!(g.is_parent_of(0, 1));
        assert!(is_undirected(&g, 1, 2));
        assert_eq!(report.knowledge_conflicts, vec![(1, 2)]);
    }
}
