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

//! Collider orientation on unshielded triples.

use crate::choose::{select, DepthChoiceGenerator};
use crate::graph::{Endpoint, GraphLike, Triple, V};
use crate::indep::IndependenceTest;
use crate::knowledge::Knowledge;
use crate::search::{SearchError, SearchReport};
use crate::sepset::SepsetProducer;
use serde::{Deserialize, Serialize};

/// How the collider status of an unshielded triple is decided.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColliderRule {
    /// Look the middle node up in the sepset found by the adjacency search.
    #[default]
    Sepsets,
    /// Test every conditioning set drawn from the neighbours of either end,
    /// and only commit when all separating sets agree.
    Conservative,
}

/// Which family of marks the graph is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    /// Tails and arrows only.
    Pattern,
    /// Circles stand for undetermined marks.
    Pag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripleClass {
    Collider,
    NonCollider,
    Ambiguous,
}

/// All unshielded triples `(x, y, z)` with `x < z`, sorted.
pub fn unshielded_triples(g: &impl GraphLike) -> Vec<(V, V, V)> {
    let mut out = Vec::new();
    for y in g.nodes() {
        let mut adj = g.neighbor_vec(y);
        if adj.len() < 2 {
            continue;
        }
        adj.sort_unstable();
        for (i, &x) in adj.iter().enumerate() {
            for &z in &adj[i + 1..] {
                if !g.is_adjacent_to(x, z) {
                    out.push((x, y, z));
                }
            }
        }
    }
    out.sort_unstable();
    out
}

/// May the mark at `to` on the edge `from - to` become an arrowhead?
pub fn is_arrowpoint_allowed(g: &impl GraphLike, from: V, to: V, knowledge: &Knowledge, kind: GraphKind) -> bool {
    match g.endpoint(from, to) {
        Endpoint::Arrow => return true,
        Endpoint::Null => return false,
        Endpoint::Tail if kind == GraphKind::Pag => return false,
        _ => {}
    }
    let (f, t) = (g.name(from), g.name(to));
    if knowledge.is_required(t, f) {
        return false;
    }
    match kind {
        GraphKind::Pattern => !knowledge.is_forbidden(f, t),
        GraphKind::Pag => true,
    }
}

/// Record that knowledge stopped an orientation of the edge `from - to`.
pub(crate) fn knowledge_conflict(g: &impl GraphLike, from: V, to: V, report: &mut SearchReport) {
    if !report.knowledge_conflicts.contains(&(from, to)) {
        log::warn!(
            "knowledge blocks orienting {} *-> {}, leaving the edge as it is",
            g.name(from),
            g.name(to)
        );
        report.knowledge_conflicts.push((from, to));
    }
}

/// Classify every unshielded triple by the sepset of its ends.
///
/// A pair with no recorded sepset leaves the triple ambiguous.
pub fn classify_by_sepsets(g: &impl GraphLike, sepsets: &impl SepsetProducer) -> Vec<((V, V, V), TripleClass)> {
    unshielded_triples(g)
        .into_iter()
        .map(|(x, y, z)| {
            let class = match sepsets.sepset(x, z) {
                None => TripleClass::Ambiguous,
                Some(s) if s.contains(&y) => TripleClass::NonCollider,
                Some(_) => TripleClass::Collider,
            };
            ((x, y, z), class)
        })
        .collect()
}

/// Classify every unshielded triple by testing all conditioning sets taken
/// from the neighbours of `x` and of `z`.
pub fn classify_conservatively<T: IndependenceTest>(
    g: &impl GraphLike,
    test: &T,
    depth: Option<usize>,
    report: &mut SearchReport,
) -> Vec<((V, V, V), TripleClass)> {
    let mut out = Vec::new();
    for (x, y, z) in unshielded_triples(g) {
        let (mut with_y, mut without_y) = (0, 0);
        for (a, b) in [(x, z), (z, x)] {
            let mut adj: Vec<V> = g.neighbors(a).filter(|&w| w != b).collect();
            adj.sort_unstable();
            let mut cg = DepthChoiceGenerator::new(adj.len(), depth);
            while let Some(choice) = cg.next_choice() {
                let s = select(choice, &adj);
                match test.check_independence(x, z, &s) {
                    Ok(r) => {
                        report.tests_performed += 1;
                        if r.independent {
                            if s.contains(&y) {
                                with_y += 1;
                            } else {
                                without_y += 1;
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("collider test: {e}");
                        report.undetermined_tests.push((x, z, s));
                    }
                }
            }
        }
        let class = match (with_y, without_y) {
            (0, 0) => TripleClass::Ambiguous,
            (0, _) => TripleClass::Collider,
            (_, 0) => TripleClass::NonCollider,
            _ => TripleClass::Ambiguous,
        };
        out.push(((x, y, z), class));
    }
    out
}

/// Apply a triple classification to the graph.
///
/// Colliders get arrowheads at the middle node when knowledge allows. In a
/// pattern a collider that would create a bidirected edge is skipped.
/// Non-colliders are underlined and ambiguous triples are marked as such.
pub fn apply_classification(
    g: &mut impl GraphLike,
    triples: &[((V, V, V), TripleClass)],
    knowledge: &Knowledge,
    kind: GraphKind,
    report: &mut SearchReport,
) -> Result<(), SearchError> {
    for &((x, y, z), class) in triples {
        let t = Triple::new(x, y, z);
        match class {
            TripleClass::Ambiguous => {
                log::debug!("ambiguous triple {} - {} - {}", g.name(x), g.name(y), g.name(z));
                g.add_ambiguous_triple(x, y, z);
                report.ambiguous.push(t);
            }
            TripleClass::NonCollider => {
                g.add_underline_triple(x, y, z);
                report.noncolliders.push(t);
            }
            TripleClass::Collider => {
                if kind == GraphKind::Pattern
                    && (g.endpoint(y, x) == Endpoint::Arrow || g.endpoint(y, z) == Endpoint::Arrow)
                {
                    log::debug!(
                        "skipping collider {} -> {} <- {}, it would create a bidirected edge",
                        g.name(x),
                        g.name(y),
                        g.name(z)
                    );
                    report.skipped_colliders.push(t);
                    continue;
                }
                let mut allowed = true;
                for a in [x, z] {
                    if !is_arrowpoint_allowed(g, a, y, knowledge, kind) {
                        knowledge_conflict(g, a, y, report);
                        allowed = false;
                    }
                }
                if !allowed {
                    report.skipped_colliders.push(t);
                    continue;
                }
                log::debug!("collider {} *-> {} <-* {}", g.name(x), g.name(y), g.name(z));
                g.set_endpoint(x, y, Endpoint::Arrow)?;
                g.set_endpoint(z, y, Endpoint::Arrow)?;
                report.colliders.push(t);
            }
        }
    }
    Ok(())
}

/// Orient colliders on every unshielded triple using recorded sepsets.
pub fn orient_colliders(
    g: &mut impl GraphLike,
    sepsets: &impl SepsetProducer,
    knowledge: &Knowledge,
    kind: GraphKind,
    report: &mut SearchReport,
) -> Result<(), SearchError> {
    let triples = classify_by_sepsets(g, sepsets);
    apply_classification(g, &triples, knowledge, kind, report)
}
