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

//! Comparing an estimated graph with a reference graph.
//!
//! Nodes are matched by name throughout, so the two graphs may number their
//! nodes differently.

use crate::graph::{structurally_equal, Edge, Endpoint, GraphLike, Triple, V};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::fmt;

/// True positives, false positives and false negatives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl Counts {
    /// `tp / (tp + fp)`, or NaN if nothing was predicted.
    pub fn precision(&self) -> f64 {
        self.tp as f64 / (self.tp + self.fp) as f64
    }

    /// `tp / (tp + fn)`, or NaN if there was nothing to find.
    pub fn recall(&self) -> f64 {
        self.tp as f64 / (self.tp + self.fn_) as f64
    }
}

/// An unordered pair of names.
fn name_pair(g: &impl GraphLike, a: V, b: V) -> (String, String) {
    let (x, y) = (g.name(a).to_string(), g.name(b).to_string());
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

fn adjacencies(g: &impl GraphLike) -> FxHashSet<(String, String)> {
    g.edges().map(|e| name_pair(g, e.node1, e.node2)).collect()
}

/// Arrowheads as `(from, into)` name pairs.
fn arrowheads(g: &impl GraphLike) -> FxHashSet<(String, String)> {
    let mut out = FxHashSet::default();
    for e in g.edges() {
        let (n1, n2) = (g.name(e.node1).to_string(), g.name(e.node2).to_string());
        if e.endpoint2 == Endpoint::Arrow {
            out.insert((n1.clone(), n2.clone()));
        }
        if e.endpoint1 == Endpoint::Arrow {
            out.insert((n2, n1));
        }
    }
    out
}

fn confusion<T: Eq + std::hash::Hash>(est: &FxHashSet<T>, truth: &FxHashSet<T>) -> Counts {
    let tp = est.intersection(truth).count();
    Counts {
        tp,
        fp: est.len() - tp,
        fn_: truth.len() - tp,
    }
}

/// Adjacency errors of `est` against `truth`.
pub fn adjacency_confusion(est: &impl GraphLike, truth: &impl GraphLike) -> Counts {
    confusion(&adjacencies(est), &adjacencies(truth))
}

/// Arrowhead errors of `est` against `truth`. Each end of an edge counts
/// separately, so a bidirected edge carries two arrowheads.
pub fn arrowhead_confusion(est: &impl GraphLike, truth: &impl GraphLike) -> Counts {
    confusion(&arrowheads(est), &arrowheads(truth))
}

fn edge_by_name(g: &impl GraphLike, a: &str, b: &str) -> Option<Edge> {
    let (a, b) = (g.node_by_name(a)?, g.node_by_name(b)?);
    let e = g.edge(a, b)?;
    Some(Edge::new(a, b, e.endpoint_at(a)?, e.endpoint_at(b)?))
}

/// Structural Hamming distance.
///
/// Over every pair of names: an edge in both graphs with different marks
/// costs 1, an undirected edge present in only one graph costs 1, and any
/// other edge present in only one graph costs 2. Symmetric, and zero exactly
/// when the graphs are structurally equal.
pub fn structural_hamming_distance(g1: &impl GraphLike, g2: &impl GraphLike) -> usize {
    let mut pairs = adjacencies(g1);
    pairs.extend(adjacencies(g2));
    pairs
        .iter()
        .map(|(a, b)| match (edge_by_name(g1, a, b), edge_by_name(g2, a, b)) {
            (Some(e1), Some(e2)) => {
                if (e1.endpoint1, e1.endpoint2) == (e2.endpoint1, e2.endpoint2) {
                    0
                } else {
                    1
                }
            }
            (Some(e), None) | (None, Some(e)) if e.is_undirected() => 1,
            (Some(_), None) | (None, Some(_)) => 2,
            (None, None) => 0,
        })
        .sum()
}

fn named_triples(g: &impl GraphLike, ts: &FxHashSet<Triple>) -> FxHashSet<(String, String, String)> {
    ts.iter()
        .map(|t| {
            let (x, z) = name_pair(g, t.x, t.z);
            (x, g.name(t.y).to_string(), z)
        })
        .collect()
}

/// Same nodes and edges by name, and, if `with_triples` is set, the same
/// ambiguous, underline and dotted-underline triples.
pub fn equivalent_patterns(g1: &impl GraphLike, g2: &impl GraphLike, with_triples: bool) -> bool {
    if !structurally_equal(g1, g2) {
        return false;
    }
    if !with_triples {
        return true;
    }
    let (t1, t2) = (g1.triples(), g2.triples());
    named_triples(g1, &t1.ambiguous) == named_triples(g2, &t2.ambiguous)
        && named_triples(g1, &t1.underline) == named_triples(g2, &t2.underline)
        && named_triples(g1, &t1.dotted_underline) == named_triples(g2, &t2.dotted_underline)
}

/// Summary statistics of an estimated graph against a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphComparison {
    pub adjacencies: Counts,
    pub arrowheads: Counts,
    pub shd: usize,
}

impl GraphComparison {
    pub fn new(est: &impl GraphLike, truth: &impl GraphLike) -> Self {
        GraphComparison {
            adjacencies: adjacency_confusion(est, truth),
            arrowheads: arrowhead_confusion(est, truth),
            shd: structural_hamming_distance(est, truth),
        }
    }
}

impl fmt::Display for GraphComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, h) = (&self.adjacencies, &self.arrowheads);
        writeln!(
            f,
            "adjacencies: tp {} fp {} fn {} precision {:.3} recall {:.3}",
            a.tp,
            a.fp,
            a.fn_,
            a.precision(),
            a.recall()
        )?;
        writeln!(
            f,
            "arrowheads:  tp {} fp {} fn {} precision {:.3} recall {:.3}",
            h.tp,
            h.fp,
            h.fn_,
            h.precision(),
            h.recall()
        )?;
        write!(f, "shd: {}", self.shd)
    }
}
