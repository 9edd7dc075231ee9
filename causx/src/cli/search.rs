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

use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;

use crate::ccd::Ccd;
use crate::colliders::ColliderRule;
use crate::edge_list::to_edge_list;
use crate::fas::FasMode;
use crate::indep::DSeparationTest;
use crate::json::{encode_result, JsonError};
use crate::knowledge::Knowledge;
use crate::search::{Fci, GraphSearch, Pc, SearchParams, SearchResult};
use crate::vec_graph::Graph;

use super::{emit, read_graph_file, CliError};

/// Search strategy.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Algorithm {
    /// Pattern search.
    #[default]
    Pc,
    /// Pattern search with conservative collider orientation.
    Cpc,
    /// PAG search, allowing for latent confounders.
    Fci,
    /// Cyclic causal discovery.
    Ccd,
}

#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// The true graph, as an edge list or a `.json` file. Its measured nodes
    /// are the variables, and d-separation in it answers every test.
    input: PathBuf,

    #[arg(long, short, value_enum, default_value_t)]
    algorithm: Algorithm,

    /// Largest conditioning set. Unlimited by default.
    #[arg(long, short)]
    depth: Option<usize>,

    #[arg(long, value_enum)]
    fas_mode: Option<FasMode>,

    /// Longest path followed by the PAG rules and possible-d-sep.
    #[arg(long)]
    max_path_length: Option<usize>,

    /// Background knowledge file.
    #[arg(long, short)]
    knowledge: Option<PathBuf>,

    /// Json file of search params. Flags given on the command line win.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Print the graph, sepsets and report as json.
    #[arg(long)]
    json: bool,

    /// Output to a file instead of printing the result.
    #[arg(long, short)]
    out: Option<PathBuf>,
}

impl SearchArgs {
    fn params(&self) -> Result<SearchParams, CliError> {
        let mut params: SearchParams = match &self.params {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => SearchParams::default(),
        };
        if self.depth.is_some() {
            params.depth = self.depth;
        }
        if let Some(mode) = self.fas_mode {
            params.fas_mode = mode;
        }
        if self.max_path_length.is_some() {
            params.max_path_length = self.max_path_length;
        }
        Ok(params)
    }

    fn knowledge(&self) -> Result<Knowledge, CliError> {
        match &self.knowledge {
            Some(path) => Ok(fs::read_to_string(path)?.parse()?),
            None => Ok(Knowledge::default()),
        }
    }

    fn search(&self, truth: Graph) -> Result<SearchResult, CliError> {
        let params = self.params()?;
        let knowledge = self.knowledge()?;
        let test = DSeparationTest::new(truth);
        let res = match self.algorithm {
            Algorithm::Pc => Pc::new(&test).with_knowledge(knowledge).with_params(params).search()?,
            Algorithm::Cpc => Pc::new(&test)
                .with_knowledge(knowledge)
                .with_params(params.with_collider_rule(ColliderRule::Conservative))
                .search()?,
            Algorithm::Fci => Fci::new(&test).with_knowledge(knowledge).with_params(params).search()?,
            Algorithm::Ccd => Ccd::new(&test).with_knowledge(knowledge).with_params(params).search()?,
        };
        Ok(res)
    }

    /// Run the `search` command using the provided arguments.
    pub fn run(self) -> Result<(), CliError> {
        let truth = read_graph_file(&self.input)?;
        let res = self.search(truth)?;
        let r = &res.report;
        log::info!(
            "{:?}: {} tests, {} colliders, {} ambiguous triples, {} knowledge conflicts{}",
            self.algorithm,
            r.tests_performed,
            r.colliders.len(),
            r.ambiguous.len(),
            r.knowledge_conflicts.len(),
            if r.truncated { ", truncated" } else { "" }
        );
        let s = if self.json {
            encode_result(&res).map_err(JsonError::from)?
        } else {
            to_edge_list(&res.graph)
        };
        emit(&s, self.out.as_deref())
    }
}
