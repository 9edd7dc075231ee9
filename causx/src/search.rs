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

//! Search strategies.
//!
//! Every strategy is an adjacency search followed by an orientation phase,
//! configured by [`SearchParams`] and an optional [`Knowledge`]. A run returns
//! the graph, the sepsets it was built from and a [`SearchReport`] listing
//! everything the caller may want to double check: failed tests, knowledge
//! vetoes, ambiguous triples and whether a bound cut the run short.

use crate::colliders::{apply_classification, classify_conservatively, orient_colliders, ColliderRule, GraphKind};
use crate::fas::{Fas, FasMode};
use crate::fci_orient::FciOrient;
use crate::graph::{GraphError, GraphLike, Triple, V};
use crate::indep::{IndependenceTest, TestError};
use crate::knowledge::{Knowledge, KnowledgeError};
use crate::meek::orient_pattern;
use crate::possible_dsep::PossibleDsep;
use crate::sepset::{MapSepsets, SepsetMap};
use crate::vec_graph::Graph;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Diagnostics collected over a search run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchReport {
    pub tests_performed: usize,
    /// Deepest conditioning-set size the adjacency search completed.
    pub depth_reached: Option<usize>,
    /// Queries the oracle could not answer, as `(x, y, z)`.
    pub undetermined_tests: Vec<(V, V, Vec<V>)>,
    /// Adjacencies found independent but kept because knowledge requires them.
    pub vetoed_removals: Vec<(V, V)>,
    pub colliders: Vec<Triple>,
    pub noncolliders: Vec<Triple>,
    pub ambiguous: Vec<Triple>,
    /// Colliders found by the sepsets but not oriented.
    pub skipped_colliders: Vec<Triple>,
    /// Orientations `(from, to)` that knowledge stopped.
    pub knowledge_conflicts: Vec<(V, V)>,
    /// A depth, time or pass bound ended some phase early.
    pub truncated: bool,
}

impl SearchReport {
    /// Nothing went wrong and nothing was left undecided.
    pub fn is_clean(&self) -> bool {
        self.undetermined_tests.is_empty()
            && self.vetoed_removals.is_empty()
            && self.ambiguous.is_empty()
            && self.skipped_colliders.is_empty()
            && self.knowledge_conflicts.is_empty()
            && !self.truncated
    }

    fn clear_triples(&mut self) {
        self.colliders.clear();
        self.noncolliders.clear();
        self.ambiguous.clear();
        self.skipped_colliders.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error(transparent)]
    Test(#[from] TestError),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Settings shared by all strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Largest conditioning set, `None` for no limit.
    pub depth: Option<usize>,
    pub fas_mode: FasMode,
    pub collider_rule: ColliderRule,
    /// Longest discriminating, uncovered or possible-d-sep path, in edges.
    pub max_path_length: Option<usize>,
    pub complete_rule_set: bool,
    pub possible_dsep: bool,
    /// Wall-clock budget for the adjacency search.
    pub timeout_ms: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            depth: None,
            fas_mode: FasMode::default(),
            collider_rule: ColliderRule::default(),
            max_path_length: None,
            complete_rule_set: true,
            possible_dsep: true,
            timeout_ms: None,
        }
    }
}

impl SearchParams {
    pub fn with_depth(mut self, depth: Option<usize>) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_fas_mode(mut self, mode: FasMode) -> Self {
        self.fas_mode = mode;
        self
    }

    pub fn with_collider_rule(mut self, rule: ColliderRule) -> Self {
        self.collider_rule = rule;
        self
    }

    pub fn with_max_path_length(mut self, len: Option<usize>) -> Self {
        self.max_path_length = len;
        self
    }

    pub fn with_complete_rule_set(mut self, b: bool) -> Self {
        self.complete_rule_set = b;
        self
    }

    pub fn with_possible_dsep(mut self, b: bool) -> Self {
        self.possible_dsep = b;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub graph: Graph,
    pub sepsets: SepsetMap,
    pub report: SearchReport,
}

pub trait GraphSearch {
    fn search(&self) -> Result<SearchResult, SearchError>;
}

/// Run the adjacency search configured by `params`.
///
/// Contradictory knowledge is not an error: each edge it pulls both ways is
/// left alone and listed in `report.knowledge_conflicts`.
pub(crate) fn adjacency_search<T: IndependenceTest>(
    test: &T,
    knowledge: &Knowledge,
    params: &SearchParams,
    report: &mut SearchReport,
) -> Result<(Graph, SepsetMap), SearchError> {
    let res = Fas::new(test)
        .depth(params.depth)
        .mode(params.fas_mode)
        .knowledge(knowledge)
        .timeout(params.timeout())
        .search(report)?;
    Ok((res.graph, res.sepsets))
}

/// PC, and with [`ColliderRule::Conservative`] CPC: a pattern over the
/// measured variables.
pub struct Pc<T: IndependenceTest> {
    test: T,
    knowledge: Knowledge,
    params: SearchParams,
}

impl<T: IndependenceTest> Pc<T> {
    pub fn new(test: T) -> Self {
        Pc {
            test,
            knowledge: Knowledge::default(),
            params: SearchParams::default(),
        }
    }

    /// PC with the conservative collider rule.
    pub fn conservative(test: T) -> Self {
        let mut pc = Pc::new(test);
        pc.params.collider_rule = ColliderRule::Conservative;
        pc
    }

    pub fn with_knowledge(&mut self, knowledge: Knowledge) -> &mut Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_params(&mut self, params: SearchParams) -> &mut Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn knowledge(&self) -> &Knowledge {
        &self.knowledge
    }
}

impl<T: IndependenceTest> GraphSearch for Pc<T> {
    fn search(&self) -> Result<SearchResult, SearchError> {
        let knowledge = self.knowledge.for_variables(self.test.variables())?;
        let mut report = SearchReport::default();
        let (mut g, sepsets) = adjacency_search(&self.test, &knowledge, &self.params, &mut report)?;

        log::info!("pc: orienting colliders ({:?})", self.params.collider_rule);
        match self.params.collider_rule {
            ColliderRule::Sepsets => {
                let producer = MapSepsets::new(&sepsets, &self.test);
                orient_colliders(&mut g, &producer, &knowledge, GraphKind::Pattern, &mut report)?;
            }
            ColliderRule::Conservative => {
                let classes = classify_conservatively(&g, &self.test, self.params.depth, &mut report);
                apply_classification(&mut g, &classes, &knowledge, GraphKind::Pattern, &mut report)?;
            }
        }

        log::info!("pc: applying orientation rules");
        orient_pattern(&mut g, &knowledge, &mut report)?;
        log::info!("pc: done, {} edges", g.num_edges());

        Ok(SearchResult {
            graph: g,
            sepsets,
            report,
        })
    }
}

/// FCI: a partial ancestral graph, allowing for latent common causes.
pub struct Fci<T: IndependenceTest> {
    test: T,
    knowledge: Knowledge,
    params: SearchParams,
}

impl<T: IndependenceTest> Fci<T> {
    pub fn new(test: T) -> Self {
        Fci {
            test,
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

    pub fn params(&self) -> &SearchParams {
        &self.params
    }
}

impl<T: IndependenceTest> GraphSearch for Fci<T> {
    fn search(&self) -> Result<SearchResult, SearchError> {
        let knowledge = self.knowledge.for_variables(self.test.variables())?;
        let mut report = SearchReport::default();
        let (mut g, mut sepsets) = adjacency_search(&self.test, &knowledge, &self.params, &mut report)?;

        let mut orient = FciOrient::new(&knowledge);
        orient
            .complete_rule_set(self.params.complete_rule_set)
            .max_path_length(self.params.max_path_length);

        if self.params.possible_dsep {
            log::info!("fci: possible-dsep step");
            orient.skeleton_to_pag(&mut g, &MapSepsets::new(&sepsets, &self.test), &mut report)?;
            PossibleDsep::new(&self.test, &knowledge)
                .depth(self.params.depth)
                .max_path_length(self.params.max_path_length)
                .search(&mut g, &mut sepsets, &mut report)?;
            report.clear_triples();
        }

        log::info!("fci: orienting");
        orient.orient(&mut g, &MapSepsets::new(&sepsets, &self.test), &mut report)?;
        log::info!("fci: done, {} edges", g.num_edges());

        Ok(SearchResult {
            graph: g,
            sepsets,
            report,
        })
    }
}
