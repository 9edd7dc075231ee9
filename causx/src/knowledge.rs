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

//! Background knowledge: temporal tiers plus forbidden and required edges.
//!
//! Tier entries and edge rules may be given as patterns where `*` matches
//! any run of characters, e.g. `X*`. Patterns are expanded against the known
//! variables whenever rules or variables change, so lookups are plain set
//! membership. A name placed in a tier explicitly wins over any pattern.
//!
//! Knowledge read from text knows only the names it mentions. Searches call
//! [`Knowledge::for_variables`] with the oracle's variables before using it.
//!
//! The text form reads
//!
//! ```text
//! /knowledge
//! addtemporal
//! 0 A B
//! 1* C D
//! forbiddirect
//! D A
//! requiredirect
//! A C
//! ```
//!
//! where a `*` after a tier index forbids edges within that tier.

use crate::graph::{Endpoint, GraphLike};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KnowledgeError {
    #[error("`{0}` is not a valid variable name or pattern")]
    BadPattern(String),
    #[error("the edge {0} --> {1} is both required and forbidden")]
    Inconsistent(String, String),
    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },
}

type Pair = (String, String);

#[derive(Debug, Clone, Default)]
pub struct Knowledge {
    variables: Vec<String>,
    known: FxHashSet<String>,
    tier_specs: Vec<(usize, String)>,
    untiered: FxHashSet<String>,
    tiers: Vec<Vec<String>>,
    forbidden_within: Vec<bool>,
    tier_index: FxHashMap<String, usize>,
    forbidden_specs: Vec<Pair>,
    required_specs: Vec<Pair>,
    forbidden: FxHashSet<Pair>,
    required: FxHashSet<Pair>,
    common_causes: FxHashSet<Pair>,
}

fn is_wildcard(spec: &str) -> bool {
    spec.contains('*')
}

fn check_spec(spec: &str) -> Result<(), KnowledgeError> {
    if spec.is_empty() || spec.chars().any(|c| c.is_whitespace() || c == ',') {
        Err(KnowledgeError::BadPattern(spec.to_string()))
    } else {
        Ok(())
    }
}

fn pattern_regex(spec: &str) -> Result<Regex, KnowledgeError> {
    let body = spec.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
    Regex::new(&format!("^{body}$")).map_err(|_| KnowledgeError::BadPattern(spec.to_string()))
}

fn ordered(x: &str, y: &str) -> Pair {
    if x <= y {
        (x.to_string(), y.to_string())
    } else {
        (y.to_string(), x.to_string())
    }
}

impl Knowledge {
    /// Empty knowledge over the given variables.
    pub fn new<I, S>(variables: I) -> Knowledge
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut k = Knowledge::default();
        for v in variables {
            k.insert_variable(v.as_ref());
        }
        k
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Register a variable, re-expanding any wildcard rules.
    pub fn add_variable(&mut self, name: &str) -> Result<(), KnowledgeError> {
        check_spec(name)?;
        if is_wildcard(name) {
            return Err(KnowledgeError::BadPattern(name.to_string()));
        }
        if self.insert_variable(name) {
            self.expand()?;
        }
        Ok(())
    }

    /// A copy with every one of `variables` registered and all patterns
    /// expanded over them.
    pub fn for_variables<S: AsRef<str>>(&self, variables: &[S]) -> Result<Knowledge, KnowledgeError> {
        let mut k = self.clone();
        for v in variables {
            let v = v.as_ref();
            check_spec(v)?;
            if is_wildcard(v) {
                return Err(KnowledgeError::BadPattern(v.to_string()));
            }
            k.insert_variable(v);
        }
        k.expand()?;
        Ok(k)
    }

    fn insert_variable(&mut self, name: &str) -> bool {
        if self.known.insert(name.to_string()) {
            self.variables.push(name.to_string());
            true
        } else {
            false
        }
    }

    /// No tiers and no edge rules.
    pub fn is_empty(&self) -> bool {
        self.tier_specs.is_empty()
            && self.forbidden_specs.is_empty()
            && self.required_specs.is_empty()
            && self.common_causes.is_empty()
    }

    /// The variables matched by `spec`. Plain names are registered on the fly.
    fn extent(&mut self, spec: &str) -> Result<Vec<String>, KnowledgeError> {
        check_spec(spec)?;
        if is_wildcard(spec) {
            let re = pattern_regex(spec)?;
            Ok(self.variables.iter().filter(|v| re.is_match(v)).cloned().collect())
        } else {
            self.insert_variable(spec);
            Ok(vec![spec.to_string()])
        }
    }

    fn extent_of(&self, spec: &str) -> Result<Vec<String>, KnowledgeError> {
        if is_wildcard(spec) {
            let re = pattern_regex(spec)?;
            Ok(self.variables.iter().filter(|v| re.is_match(v)).cloned().collect())
        } else {
            Ok(vec![spec.to_string()])
        }
    }

    /// Rebuild the tiers and the expanded edge sets from the stored specs.
    fn expand(&mut self) -> Result<(), KnowledgeError> {
        let (patterns, names): (Vec<_>, Vec<_>) = self.tier_specs.iter().partition(|(_, s)| is_wildcard(s));
        let mut tier_index = FxHashMap::default();
        for (tier, spec) in patterns.into_iter().chain(names) {
            for name in self.extent_of(spec)? {
                if !self.untiered.contains(&name) {
                    tier_index.insert(name, *tier);
                }
            }
        }
        for tier in self.tiers.iter_mut() {
            tier.clear();
        }
        for v in &self.variables {
            if let Some(&t) = tier_index.get(v) {
                self.tiers[t].push(v.clone());
            }
        }
        self.tier_index = tier_index;

        let mut forbidden = FxHashSet::default();
        for (s1, s2) in &self.forbidden_specs {
            let to = self.extent_of(s2)?;
            for x in self.extent_of(s1)? {
                forbidden.extend(to.iter().filter(|y| **y != x).map(|y| (x.clone(), y.clone())));
            }
        }
        let mut required = FxHashSet::default();
        for (s1, s2) in &self.required_specs {
            let to = self.extent_of(s2)?;
            for x in self.extent_of(s1)? {
                required.extend(to.iter().filter(|y| **y != x).map(|y| (x.clone(), y.clone())));
            }
        }
        self.forbidden = forbidden;
        self.required = required;
        Ok(())
    }

    fn ensure_tiers(&mut self, tier: usize) {
        if self.tiers.len() <= tier {
            self.tiers.resize(tier + 1, Vec::new());
            self.forbidden_within.resize(tier + 1, false);
        }
    }

    /// Put the variables matched by `spec` into the given tier, moving them
    /// out of any tier they were in before.
    pub fn add_to_tier(&mut self, tier: usize, spec: &str) -> Result<(), KnowledgeError> {
        self.ensure_tiers(tier);
        for name in self.extent(spec)? {
            self.untiered.remove(&name);
        }
        self.tier_specs.retain(|(_, s)| s != spec);
        self.tier_specs.push((tier, spec.to_string()));
        self.expand()
    }

    /// Take `name` out of the tiers, even where a pattern matches it.
    pub fn remove_from_tiers(&mut self, name: &str) -> Result<(), KnowledgeError> {
        self.tier_specs.retain(|(_, s)| s != name);
        self.untiered.insert(name.to_string());
        self.expand()
    }

    pub fn set_tier_forbidden_within(&mut self, tier: usize, forbidden: bool) {
        self.ensure_tiers(tier);
        self.forbidden_within[tier] = forbidden;
    }

    pub fn is_tier_forbidden_within(&self, tier: usize) -> bool {
        self.forbidden_within.get(tier).copied().unwrap_or(false)
    }

    pub fn num_tiers(&self) -> usize {
        self.tiers.len()
    }

    pub fn tier(&self, tier: usize) -> &[String] {
        self.tiers.get(tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tier_of(&self, name: &str) -> Option<usize> {
        self.tier_index.get(name).copied()
    }

    /// Forbid every edge `x --> y` with `x` matching `from` and `y` matching `to`.
    pub fn set_forbidden(&mut self, from: &str, to: &str) -> Result<(), KnowledgeError> {
        self.extent(from)?;
        self.extent(to)?;
        self.forbidden_specs.push((from.to_string(), to.to_string()));
        self.expand()
    }

    pub fn remove_forbidden(&mut self, from: &str, to: &str) -> Result<(), KnowledgeError> {
        self.forbidden_specs.retain(|(a, b)| !(a == from && b == to));
        self.expand()
    }

    /// Require every edge `x --> y` with `x` matching `from` and `y` matching `to`.
    pub fn set_required(&mut self, from: &str, to: &str) -> Result<(), KnowledgeError> {
        self.extent(from)?;
        self.extent(to)?;
        self.required_specs.push((from.to_string(), to.to_string()));
        self.expand()
    }

    pub fn remove_required(&mut self, from: &str, to: &str) -> Result<(), KnowledgeError> {
        self.required_specs.retain(|(a, b)| !(a == from && b == to));
        self.expand()
    }

    /// Record that `x` and `y` share a latent common cause.
    pub fn set_required_common_cause(&mut self, x: &str, y: &str) -> Result<(), KnowledgeError> {
        self.extent(x)?;
        self.extent(y)?;
        self.common_causes.insert(ordered(x, y));
        Ok(())
    }

    pub fn is_required_common_cause(&self, x: &str, y: &str) -> bool {
        self.common_causes.contains(&ordered(x, y))
    }

    /// `x --> y` is ruled out by the tier ordering: `x` sits in a later tier
    /// than `y`, or both share a tier whose inner edges are forbidden.
    pub fn is_forbidden_by_tiers(&self, x: &str, y: &str) -> bool {
        if x == y {
            return false;
        }
        match (self.tier_of(x), self.tier_of(y)) {
            (Some(tx), Some(ty)) => tx > ty || (tx == ty && self.is_tier_forbidden_within(tx)),
            _ => false,
        }
    }

    pub fn is_explicitly_forbidden(&self, x: &str, y: &str) -> bool {
        self.forbidden.contains(&(x.to_string(), y.to_string()))
    }

    /// Whether the edge `x --> y` is forbidden.
    pub fn is_forbidden(&self, x: &str, y: &str) -> bool {
        self.is_forbidden_by_tiers(x, y) || self.is_explicitly_forbidden(x, y)
    }

    /// Whether the edge `x --> y` is required.
    pub fn is_required(&self, x: &str, y: &str) -> bool {
        self.required.contains(&(x.to_string(), y.to_string()))
    }

    /// True iff nothing forces an adjacency between `x` and `y`.
    pub fn no_edge_required(&self, x: &str, y: &str) -> bool {
        !(self.is_required(x, y) || self.is_required(y, x) || self.is_required_common_cause(x, y))
    }

    /// `z` may be a parent of `x`.
    pub fn possible_parent_of(&self, z: &str, x: &str) -> bool {
        !self.is_forbidden(z, x) && !self.is_required(x, z)
    }

    /// A directed edge of `g` is forbidden, or a required edge is missing
    /// from `g` or points the wrong way.
    pub fn is_violated_by(&self, g: &impl GraphLike) -> bool {
        for e in g.edges() {
            if !e.is_directed() {
                continue;
            }
            let (from, to) = if e.endpoint2 == Endpoint::Arrow {
                (e.node1, e.node2)
            } else {
                (e.node2, e.node1)
            };
            if self.is_forbidden(g.name(from), g.name(to)) {
                return true;
            }
        }
        self.required.iter().any(|(x, y)| {
            match (g.node_by_name(x), g.node_by_name(y)) {
                (Some(a), Some(b)) => !g.is_parent_of(a, b),
                _ => false,
            }
        })
    }

    /// Every forbidden edge between known variables, sorted.
    pub fn forbidden_edges(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = Vec::new();
        for x in &self.variables {
            for y in &self.variables {
                if self.is_forbidden(x, y) {
                    out.push((x.as_str(), y.as_str()));
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Every required edge, sorted.
    pub fn required_edges(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self
            .required
            .iter()
            .map(|(x, y)| (x.as_str(), y.as_str()))
            .collect();
        out.sort_unstable();
        out
    }

    /// Edges that are both required and forbidden.
    pub fn conflicts(&self) -> Vec<(&str, &str)> {
        self.required_edges()
            .into_iter()
            .filter(|(x, y)| self.is_forbidden(x, y))
            .collect()
    }

    /// Fail on the first edge that is both required and forbidden.
    pub fn check_consistency(&self) -> Result<(), KnowledgeError> {
        match self.conflicts().first() {
            Some((x, y)) => Err(KnowledgeError::Inconsistent(x.to_string(), y.to_string())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Tiers,
    Forbidden,
    Required,
}

impl FromStr for Knowledge {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Knowledge, KnowledgeError> {
        let mut k = Knowledge::default();
        let mut section = Section::None;
        for (i, raw) in s.lines().enumerate() {
            let line = raw.trim();
            let err = |msg: String| KnowledgeError::Parse { line: i + 1, msg };
            if line.is_empty() || line.starts_with('#') || line.eq_ignore_ascii_case("/knowledge") {
                continue;
            }
            match line.to_ascii_lowercase().as_str() {
                "addtemporal" => {
                    section = Section::Tiers;
                    continue;
                }
                "forbiddirect" => {
                    section = Section::Forbidden;
                    continue;
                }
                "requiredirect" => {
                    section = Section::Required;
                    continue;
                }
                _ => {}
            }
            let mut tokens = line.split_whitespace();
            match section {
                Section::None => return Err(err(format!("unexpected line `{line}`"))),
                Section::Tiers => {
                    let head = tokens.next().unwrap_or_default();
                    let (num, within) = match head.strip_suffix('*') {
                        Some(n) => (n, true),
                        None => (head, false),
                    };
                    let tier: usize = num
                        .parse()
                        .map_err(|_| err(format!("`{head}` is not a tier index")))?;
                    k.ensure_tiers(tier);
                    if within {
                        k.set_tier_forbidden_within(tier, true);
                    }
                    for name in tokens {
                        k.add_to_tier(tier, name)?;
                    }
                }
                Section::Forbidden | Section::Required => {
                    let pair: Vec<&str> = tokens.collect();
                    if pair.len() != 2 {
                        return Err(err(format!("expected two names, found `{line}`")));
                    }
                    if section == Section::Forbidden {
                        k.set_forbidden(pair[0], pair[1])?;
                    } else {
                        k.set_required(pair[0], pair[1])?;
                    }
                }
            }
        }
        Ok(k)
    }
}

impl fmt::Display for Knowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "/knowledge")?;
        writeln!(f, "addtemporal")?;
        for i in 0..self.tiers.len() {
            let star = if self.is_tier_forbidden_within(i) { "*" } else { "" };
            write!(f, "{i}{star}")?;
            for (_, spec) in self.tier_specs.iter().filter(|(t, _)| *t == i) {
                write!(f, " {spec}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "forbiddirect")?;
        for (x, y) in &self.forbidden_specs {
            writeln!(f, "{x} {y}")?;
        }
        writeln!(f, "requiredirect")?;
        for (x, y) in &self.required_specs {
            writeln!(f, "{x} {y}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec_graph::Graph;
    use rstest::{fixture, rstest};

    #[fixture]
    fn tiered() -> Knowledge {
        let mut k = Knowledge::new(["A", "B", "C", "D"]);
        k.add_to_tier(0, "A").unwrap();
        k.add_to_tier(0, "B").unwrap();
        k.add_to_tier(1, "C").unwrap();
        k.add_to_tier(1, "D").unwrap();
        k
    }

    #[rstest]
    fn tiers_forbid_backwards_edges(tiered: Knowledge) {
        assert!(tiered.is_forbidden("C", "A"));
        assert!(tiered.is_forbidden_by_tiers("D", "B"));
        assert!(!tiered.is_forbidden("A", "C"));
        assert!(!tiered.is_forbidden("A", "B"));
        assert_eq!(tiered.tier_of("D"), Some(1));
        assert_eq!(tiered.tier(0), ["A", "B"]);
        assert_eq!(tiered.num_tiers(), 2);
    }

    #[rstest]
    fn forbidden_within(mut tiered: Knowledge) {
        tiered.set_tier_forbidden_within(1, true);
        assert!(tiered.is_forbidden("C", "D"));
        assert!(tiered.is_forbidden("D", "C"));
        assert!(!tiered.is_forbidden("A", "B"));
        assert!(!tiered.is_forbidden("C", "C"));
    }

    #[rstest]
    fn moving_between_tiers(mut tiered: Knowledge) {
        tiered.add_to_tier(2, "A").unwrap();
        assert_eq!(tiered.tier(0), ["B"]);
        assert!(tiered.is_forbidden("A", "C"));
        tiered.remove_from_tiers("A").unwrap();
        assert!(!tiered.is_forbidden("A", "C"));
    }

    #[test]
    fn wildcard_patterns() {
        let mut k = Knowledge::new(["X1", "X2", "Y1", "Y2"]);
        k.set_forbidden("X*", "Y*").unwrap();
        assert!(k.is_forbidden("X1", "Y2"));
        assert!(k.is_forbidden("X2", "Y1"));
        assert!(!k.is_forbidden("Y1", "X1"));
        assert_eq!(k.forbidden_edges().len(), 4);

        // later variables are picked up by existing patterns
        k.add_variable("X3").unwrap();
        assert!(k.is_forbidden("X3", "Y1"));
    }

    #[test]
    fn wildcard_tiers() {
        let mut k = Knowledge::new(["X1", "X2", "Y"]);
        k.add_to_tier(1, "X*").unwrap();
        k.add_to_tier(0, "Y").unwrap();
        assert_eq!(k.tier(1), ["X1", "X2"]);
        assert!(k.is_forbidden("X2", "Y"));

        // an explicit name beats the pattern, whatever the order
        k.add_to_tier(2, "X2").unwrap();
        assert_eq!(k.tier(1), ["X1"]);
        k.add_variable("X3").unwrap();
        assert_eq!(k.tier_of("X3"), Some(1));
        k.remove_from_tiers("X1").unwrap();
        assert_eq!(k.tier(1), ["X3"]);
    }

    #[test]
    fn text_patterns_expand_over_search_variables() {
        let k: Knowledge = "addtemporal\n0 X*\n1 Y\nforbiddirect\nX* Z\n".parse().unwrap();
        assert_eq!(k.tier_of("X1"), None);

        let k = k.for_variables(&["X1", "X2", "Y", "Z"]).unwrap();
        assert_eq!(k.tier_of("X1"), Some(0));
        assert_eq!(k.tier(0), ["X1", "X2"]);
        assert!(k.is_forbidden("Y", "X1"));
        assert!(k.is_forbidden("X2", "Z"));
        assert!(!k.is_forbidden("Y", "Z"));
        assert_eq!(k.to_string().lines().nth(2), Some("0 X*"));
        assert!(matches!(k.for_variables(&["Q*"]), Err(KnowledgeError::BadPattern(_))));
    }

    #[test]
    fn required_and_conflicts() {
        let mut k = Knowledge::new(["A", "B", "C"]);
        k.set_required("A", "B").unwrap();
        assert!(k.is_required("A", "B"));
        assert!(!k.no_edge_required("B", "A"));
        assert!(k.no_edge_required("A", "C"));
        assert!(!k.possible_parent_of("B", "A"));
        assert!(k.check_consistency().is_ok());

        k.set_forbidden("A", "B").unwrap();
        assert_eq!(k.conflicts(), vec![("A", "B")]);
        assert_eq!(
            k.check_consistency(),
            Err(KnowledgeError::Inconsistent("A".into(), "B".into()))
        );

        k.set_required_common_cause("C", "B").unwrap();
        assert!(!k.no_edge_required("B", "C"));
    }

    #[test]
    fn bad_patterns() {
        let mut k = Knowledge::new(["A"]);
        assert!(matches!(k.set_forbidden("", "A"), Err(KnowledgeError::BadPattern(_))));
        assert!(matches!(k.set_required("A B", "A"), Err(KnowledgeError::BadPattern(_))));
        assert!(matches!(k.add_variable("Q*"), Err(KnowledgeError::BadPattern(_))));
    }

    #[test]
    fn violated_by_graph() {
        let mut k = Knowledge::new(["A", "B", "C"]);
        k.set_forbidden("B", "A").unwrap();
        k.set_required("B", "C").unwrap();

        let mut g = Graph::with_nodes(["A", "B", "C"]).unwrap();
        g.add_directed_edge(0, 1).unwrap();
        g.add_directed_edge(1, 2).unwrap();
        assert!(!k.is_violated_by(&g));

        g.remove_edge(1, 2);
        assert!(k.is_violated_by(&g));
        g.add_undirected_edge(1, 2).unwrap();
        assert!(k.is_violated_by(&g));

        g.remove_edge(1, 2);
        g.add_directed_edge(1, 2).unwrap();
        g.remove_edge(0, 1);
        g.add_directed_edge(1, 0).unwrap();
        assert!(k.is_violated_by(&g));
    }

    #[test]
    fn text_form() {
        let src = "/knowledge\naddtemporal\n0 A B\n1* C D\n\nforbiddirect\nD A\nrequiredirect\nA C\n";
        let k: Knowledge = src.parse().unwrap();
        assert_eq!(k.variables(), ["A", "B", "C", "D"]);
        assert!(k.is_forbidden("C", "B"));
        assert!(k.is_forbidden("C", "D"));
        assert!(k.is_required("A", "C"));
        assert!(k.is_explicitly_forbidden("D", "A"));

        let again: Knowledge = k.to_string().parse().unwrap();
        assert_eq!(again.to_string(), k.to_string());
        assert_eq!(again.forbidden_edges(), k.forbidden_edges());
    }

    #[rstest]
    #[case("A B\n", 1)]
    #[case("addtemporal\nx A\n", 2)]
    #[case("forbiddirect\nA\n", 2)]
    fn text_errors(#[case] src: &str, #[case] line: usize) {
        match src.parse::<Knowledge>() {
            Err(KnowledgeError::Parse { line: l, .. }) => assert_eq!(l, line),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }
}
