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

//! Orientation rules for partial ancestral graphs.
//!
//! Rules only ever replace circles, so every pass either changes a circle or
//! leaves the graph alone. R1-R4 are the arrowhead rules, R5-R10 the tail
//! rules of the complete rule set.

use crate::colliders::{is_arrowpoint_allowed, knowledge_conflict, orient_colliders, GraphKind};
use crate::graph::{Endpoint, GraphError, GraphLike, V};
use crate::knowledge::Knowledge;
use crate::search::{SearchError, SearchReport};
use crate::sepset::SepsetProducer;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Replace the mark at `to` on the edge `from *-* to` if it is a circle.
fn set_circle(g: &mut impl GraphLike, from: V, to: V, ep: Endpoint) -> Result<bool, GraphError> {
    if g.endpoint(from, to) == Endpoint::Circle {
        g.set_endpoint(from, to, ep)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Every uncovered potentially directed path from `from` to `to`.
///
/// Paths are returned as node lists, both ends included. A path of
/// `max_len` edges is the longest considered.
pub fn uncovered_pd_paths(g: &impl GraphLike, from: V, to: V, max_len: Option<usize>) -> Vec<Vec<V>> {
    let mut out = Vec::new();
    let mut path = vec![from];
    let mut on_path = FxHashSet::default();
    on_path.insert(from);
    pd_paths_from(g, to, max_len, &mut path, &mut on_path, &mut out);
    out
}

fn pd_paths_from(
    g: &impl GraphLike,
    to: V,
    max_len: Option<usize>,
    path: &mut Vec<V>,
    on_path: &mut FxHashSet<V>,
    out: &mut Vec<Vec<V>>,
) {
    if max_len.is_some_and(|m| path.len() > m) {
        return;
    }
    let prev = path[path.len() - 1];
    for cur in g.neighbor_vec(prev) {
        if on_path.contains(&cur) {
            continue;
        }
        if g.endpoint(prev, cur) == Endpoint::Tail || g.endpoint(cur, prev) == Endpoint::Arrow {
            continue;
        }
        if path.len() >= 2 && g.is_adjacent_to(path[path.len() - 2], cur) {
            continue;
        }
        path.push(cur);
        if cur == to {
            out.push(path.clone());
        } else {
            on_path.insert(cur);
            pd_paths_from(g, to, max_len, path, on_path, out);
            on_path.remove(&cur);
        }
        path.pop();
    }
}

fn is_circle_path(g: &impl GraphLike, path: &[V]) -> bool {
    path.iter()
        .tuple_windows()
        .all(|(&a, &b)| g.endpoint(a, b) == Endpoint::Circle && g.endpoint(b, a) == Endpoint::Circle)
}

/// Orients a PAG from a skeleton and its sepsets.
#[derive(Debug, Clone)]
pub struct FciOrient<'a> {
    knowledge: &'a Knowledge,
    complete_rule_set: bool,
    max_path_length: Option<usize>,
}

impl<'a> FciOrient<'a> {
    pub fn new(knowledge: &'a Knowledge) -> Self {
        FciOrient {
            knowledge,
            complete_rule_set: true,
            max_path_length: None,
        }
    }

    /// Also run the tail rules R5-R10.
    pub fn complete_rule_set(&mut self, complete: bool) -> &mut Self {
        self.complete_rule_set = complete;
        self
    }

    /// Longest discriminating or uncovered path to look for, in edges.
    pub fn max_path_length(&mut self, max_path_length: Option<usize>) -> &mut Self {
        self.max_path_length = max_path_length;
        self
    }

    /// Reset every mark to a circle, then apply knowledge and R0.
    pub fn skeleton_to_pag(
        &self,
        g: &mut impl GraphLike,
        sepsets: &impl SepsetProducer,
        report: &mut SearchReport,
    ) -> Result<(), SearchError> {
        g.reorient_all_with(Endpoint::Circle)?;
        g.triples_mut().clear();
        self.orient_bk(g, report)?;
        orient_colliders(g, sepsets, self.knowledge, GraphKind::Pag, report)
    }

    /// R0 followed by the final orientation rules.
    pub fn orient(
        &self,
        g: &mut impl GraphLike,
        sepsets: &impl SepsetProducer,
        report: &mut SearchReport,
    ) -> Result<(), SearchError> {
        self.skeleton_to_pag(g, sepsets, report)?;
        self.final_orientation(g, sepsets, report)
    }

    /// A forbidden `x --> y` puts an arrowhead at `x`; a required `x --> y`
    /// orients the edge that way. An edge both required and forbidden keeps
    /// its marks and is reported.
    pub fn orient_bk(&self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<(), SearchError> {
        if self.knowledge.is_empty() {
            return Ok(());
        }
        for e in g.edge_vec() {
            for (x, y) in [(e.node1, e.node2), (e.node2, e.node1)] {
                let required = self.knowledge.is_required(g.name(x), g.name(y));
                let forbidden = self.knowledge.is_forbidden(g.name(x), g.name(y));
                if required && forbidden {
                    knowledge_conflict(g, x, y, report);
                } else if required {
                    let at_x = g.endpoint(y, x);
                    let at_y = g.endpoint(x, y);
                    if matches!(at_x, Endpoint::Circle | Endpoint::Tail) && matches!(at_y, Endpoint::Circle | Endpoint::Arrow) {
                        log::debug!("knowledge: {} --> {}", g.name(x), g.name(y));
                        g.orient(x, y)?;
                    } else {
                        knowledge_conflict(g, x, y, report);
                    }
                } else if forbidden {
                    if set_circle(g, y, x, Endpoint::Arrow)? {
                        log::debug!("knowledge: {} <-* {}", g.name(x), g.name(y));
                    } else if g.endpoint(y, x) == Endpoint::Tail {
                        knowledge_conflict(g, y, x, report);
                    }
                }
            }
        }
        Ok(())
    }

    /// R1-R4 to a fixed point, then, with the complete rule set, R5 once
    /// and R6-R10 to fixed points.
    pub fn final_orientation(
        &self,
        g: &mut impl GraphLike,
        sepsets: &impl SepsetProducer,
        report: &mut SearchReport,
    ) -> Result<(), SearchError> {
        let max_passes = 2 * g.num_edges() + 1;
        self.fixed_point(g, max_passes, report, |o, g, r| {
            let mut changed = o.rules_r1_r2(g, r)?;
            changed |= o.rule_r3(g, r)?;
            changed |= o.rule_r4(g, sepsets, r)?;
            Ok(changed)
        })?;
        if self.complete_rule_set {
            self.rule_r5(g)?;
            self.fixed_point(g, max_passes, report, |o, g, _| o.rules_r6_r7(g))?;
            self.fixed_point(g, max_passes, report, |o, g, _| o.rules_r8_r9_r10(g))?;
        }
        Ok(())
    }

    fn fixed_point<G, F>(&self, g: &mut G, max_passes: usize, report: &mut SearchReport, mut pass: F) -> Result<(), SearchError>
    where
        G: GraphLike,
        F: FnMut(&Self, &mut G, &mut SearchReport) -> Result<bool, SearchError>,
    {
        for _ in 0..max_passes {
            if !pass(self, g, report)? {
                return Ok(());
            }
        }
        log::warn!("orientation rules did not settle after {max_passes} passes");
        report.truncated = true;
        Ok(())
    }

    fn arrow_allowed(&self, g: &impl GraphLike, from: V, to: V, report: &mut SearchReport) -> bool {
        if is_arrowpoint_allowed(g, from, to, self.knowledge, GraphKind::Pag) {
            true
        } else {
            if g.endpoint(from, to) == Endpoint::Circle {
                knowledge_conflict(g, from, to, report);
            }
            false
        }
    }

    /// R1: `a *-> b o-* c`, `a`, `c` not adjacent gives `b --> c`.
    /// R2: `a --> b *-> c` or `a *-> b --> c`, with `a *-o c`, gives `a *-> c`.
    fn rules_r1_r2(&self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<bool, SearchError> {
        let mut changed = false;
        for b in g.node_vec() {
            let adj = g.neighbor_vec(b);
            for (&x, &y) in adj.iter().tuple_combinations() {
                for (a, c) in [(x, y), (y, x)] {
                    changed |= self.rule_r1(g, a, b, c, report)?;
                    changed |= self.rule_r2(g, a, b, c, report)?;
                }
            }
        }
        Ok(changed)
    }

    fn rule_r1(&self, g: &mut impl GraphLike, a: V, b: V, c: V, report: &mut SearchReport) -> Result<bool, SearchError> {
        if g.is_adjacent_to(a, c)
            || g.endpoint(a, b) != Endpoint::Arrow
            || g.endpoint(c, b) != Endpoint::Circle
            || g.is_ambiguous_triple(a, b, c)
        {
            return Ok(false);
        }
        if !self.arrow_allowed(g, b, c, report) {
            return Ok(false);
        }
        log::debug!("R1: {} --> {}", g.name(b), g.name(c));
        g.set_endpoint(c, b, Endpoint::Tail)?;
        g.set_endpoint(b, c, Endpoint::Arrow)?;
        Ok(true)
    }

    fn rule_r2(&self, g: &mut impl GraphLike, a: V, b: V, c: V, report: &mut SearchReport) -> Result<bool, SearchError> {
        if !g.is_adjacent_to(a, c) || g.endpoint(a, c) != Endpoint::Circle {
            return Ok(false);
        }
        if g.endpoint(a, b) != Endpoint::Arrow || g.endpoint(b, c) != Endpoint::Arrow {
            return Ok(false);
        }
        if g.endpoint(b, a) != Endpoint::Tail && g.endpoint(c, b) != Endpoint::Tail {
            return Ok(false);
        }
        if !self.arrow_allowed(g, a, c, report) {
            return Ok(false);
        }
        log::debug!("R2: {} *-> {}", g.name(a), g.name(c));
        g.set_endpoint(a, c, Endpoint::Arrow)?;
        Ok(true)
    }

    /// R3: `a *-> b <-* c`, `a *-o d o-* c`, `a`, `c` not adjacent and
    /// `d *-o b` gives `d *-> b`.
    fn rule_r3(&self, g: &mut impl GraphLike, report: &mut SearchReport) -> Result<bool, SearchError> {
        let mut changed = false;
        for b in g.node_vec() {
            let arrows = g.nodes_into(b, Endpoint::Arrow);
            if arrows.len() < 2 {
                continue;
            }
            for d in g.nodes_into(b, Endpoint::Circle) {
                let fires = arrows.iter().tuple_combinations().any(|(&a, &c)| {
                    !g.is_adjacent_to(a, c)
                        && g.endpoint(a, d) == Endpoint::Circle
                        && g.endpoint(c, d) == Endpoint::Circle
                        && !g.is_ambiguous_triple(a, d, c)
                });
                if fires && self.arrow_allowed(g, d, b, report) {
                    log::debug!("R3: {} *-> {}", g.name(d), g.name(b));
                    g.set_endpoint(d, b, Endpoint::Arrow)?;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    /// R4: discriminating paths for `b` on `a <-* b o-> c` with `a --> c`.
    fn rule_r4(
        &self,
        g: &mut impl GraphLike,
        sepsets: &impl SepsetProducer,
        report: &mut SearchReport,
    ) -> Result<bool, SearchError> {
        let mut changed = false;
        for b in g.node_vec() {
            for a in g.nodes_out_of(b, Endpoint::Arrow) {
                for c in g.nodes_into(b, Endpoint::Circle) {
                    if c == a || !g.is_parent_of(a, c) || g.endpoint(b, c) != Endpoint::Arrow {
                        continue;
                    }
                    changed |= self.ddp_orient(g, a, b, c, sepsets, report)?;
                }
            }
        }
        Ok(changed)
    }

    /// Search back from `a` for the far end `d` of a discriminating path
    /// `<d, ..., a, b, c>` and orient `b` by the sepset of `d` and `c`.
    ///
    /// Every node strictly between `d` and `b` is a collider on the path and
    /// a parent of `c`.
    fn ddp_orient(
        &self,
        g: &mut impl GraphLike,
        a: V,
        b: V,
        c: V,
        sepsets: &impl SepsetProducer,
        report: &mut SearchReport,
    ) -> Result<bool, SearchError> {
        let c_parents: FxHashSet<V> = g.parents(c).into_iter().collect();
        let mut visited = FxHashSet::default();
        visited.insert(a);
        visited.insert(b);
        let mut previous = FxHashMap::default();
        previous.insert(a, b);
        let mut queue = VecDeque::from([(a, 1)]);

        while let Some((t, len)) = queue.pop_front() {
            if self.max_path_length.is_some_and(|m| len + 2 > m) {
                log::debug!("R4: discriminating path search for {} cut at length {len}", g.name(b));
                report.truncated = true;
                return Ok(false);
            }
            let p = previous[&t];
            for d in g.nodes_into(t, Endpoint::Arrow) {
                if visited.contains(&d) || !g.is_def_collider(d, t, p) {
                    continue;
                }
                if d != c && !g.is_adjacent_to(d, c) {
                    return self.ddp_orientation(g, d, a, b, c, sepsets, report);
                }
                if c_parents.contains(&d) {
                    previous.insert(d, t);
                    visited.insert(d);
                    queue.push_back((d, len + 1));
                }
            }
        }
        Ok(false)
    }

    #[allow(clippy::too_many_arguments)]
    fn ddp_orientation(
        &self,
        g: &mut impl GraphLike,
        d: V,
        a: V,
        b: V,
        c: V,
        sepsets: &impl SepsetProducer,
        report: &mut SearchReport,
    ) -> Result<bool, SearchError> {
        let Some(sepset) = sepsets.sepset(d, c) else {
            log::debug!("R4: no sepset for {} and {}", g.name(d), g.name(c));
            return Ok(false);
        };
        if sepset.contains(&b) {
            if !set_circle(g, c, b, Endpoint::Tail)? {
                return Ok(false);
            }
            log::debug!("R4: {} --> {} (from {})", g.name(b), g.name(c), g.name(d));
            Ok(true)
        } else {
            if !self.arrow_allowed(g, a, b, report) || !self.arrow_allowed(g, c, b, report) {
                return Ok(false);
            }
            let changed = set_circle(g, a, b, Endpoint::Arrow)? | set_circle(g, c, b, Endpoint::Arrow)?;
            if changed {
                log::debug!("R4: {} <-> {} <-> {} (from {})", g.name(a), g.name(b), g.name(c), g.name(d));
            }
            Ok(changed)
        }
    }

    /// R5: `a o-o b` closed off by an uncovered circle path `a, c, ..., d, b`
    /// with `a`, `d` and `b`, `c` not adjacent makes the edge and the path
    /// undirected.
    fn rule_r5(&self, g: &mut impl GraphLike) -> Result<bool, SearchError> {
        let mut changed = false;
        for a in g.node_vec() {
            for b in g.nodes_into(a, Endpoint::Circle) {
                if g.endpoint(a, b) != Endpoint::Circle {
                    continue;
                }
                let path = uncovered_pd_paths(g, a, b, self.max_path_length)
                    .into_iter()
                    .filter(|u| u.len() >= 4 && is_circle_path(g, u))
                    .find(|u| !g.is_adjacent_to(a, u[u.len() - 2]) && !g.is_adjacent_to(b, u[1]));
                if let Some(u) = path {
                    log::debug!("R5: {} --- {}", g.name(a), g.name(b));
                    g.set_edge_endpoints(a, b, Endpoint::Tail, Endpoint::Tail)?;
                    for (&x, &y) in u.iter().tuple_windows() {
                        g.set_edge_endpoints(x, y, Endpoint::Tail, Endpoint::Tail)?;
                    }
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    /// R6: `a --- b o-* c` gives `b --* c`.
    /// R7: `a --o b o-* c` with `a`, `c` not adjacent gives `b --* c`.
    fn rules_r6_r7(&self, g: &mut impl GraphLike) -> Result<bool, SearchError> {
        let mut changed = false;
        for b in g.node_vec() {
            let adj = g.neighbor_vec(b);
            for (&x, &y) in adj.iter().tuple_combinations() {
                for (a, c) in [(x, y), (y, x)] {
                    if g.endpoint(b, a) != Endpoint::Tail || g.endpoint(c, b) != Endpoint::Circle {
                        continue;
                    }
                    let fires = match g.endpoint(a, b) {
                        Endpoint::Tail => true,
                        Endpoint::Circle => !g.is_adjacent_to(a, c),
                        _ => false,
                    };
                    if fires {
                        log::debug!("R6/R7: {} --* {}", g.name(b), g.name(c));
                        g.set_endpoint(c, b, Endpoint::Tail)?;
                        changed = true;
                    }
                }
            }
        }
        Ok(changed)
    }

    /// R8-R10 on each `a o-> c`, stopping at the first rule that applies.
    fn rules_r8_r9_r10(&self, g: &mut impl GraphLike) -> Result<bool, SearchError> {
        let mut changed = false;
        for c in g.node_vec() {
            for a in g.nodes_into(c, Endpoint::Arrow) {
                if g.endpoint(c, a) != Endpoint::Circle {
                    continue;
                }
                let rule = if self.r8(g, a, c) {
                    "R8"
                } else if self.r9(g, a, c) {
                    "R9"
                } else if self.r10(g, a, c) {
                    "R10"
                } else {
                    continue;
                };
                log::debug!("{rule}: {} --> {}", g.name(a), g.name(c));
                g.set_endpoint(c, a, Endpoint::Tail)?;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// `a --> b --> c` or `a --o b --> c`
    fn r8(&self, g: &impl GraphLike, a: V, c: V) -> bool {
        g.parents(c).into_iter().any(|b| {
            b != a && g.is_adjacent_to(a, b) && g.endpoint(b, a) == Endpoint::Tail && g.endpoint(a, b) != Endpoint::Tail
        })
    }

    /// An uncovered p.d. path `a, b, ..., c` with `b`, `c` not adjacent.
    fn r9(&self, g: &impl GraphLike, a: V, c: V) -> bool {
        uncovered_pd_paths(g, a, c, self.max_path_length)
            .iter()
            .any(|u| u[1] != c && !g.is_adjacent_to(u[1], c))
    }

    /// `b --> c <-- d` with uncovered p.d. paths from `a` to `b` and to `d`
    /// leaving `a` through distinct, non-adjacent nodes.
    fn r10(&self, g: &impl GraphLike, a: V, c: V) -> bool {
        let parents: Vec<V> = g.parents(c).into_iter().filter(|&b| b != a).collect();
        for (&b, &d) in parents.iter().tuple_combinations() {
            let to_b = uncovered_pd_paths(g, a, b, self.max_path_length);
            let to_d = uncovered_pd_paths(g, a, d, self.max_path_length);
            for u1 in &to_b {
                for u2 in &to_d {
                    let (m, n) = (u1[1], u2[1]);
                    if m != n && !g.is_adjacent_to(m, n) {
                        return true;
                    }
                }
            }
        }
        false
    }
}
