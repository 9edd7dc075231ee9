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

use clap::{crate_version, Parser};
use std::path::Path;

use crate::edge_list::{from_edge_list, ParseError};
use crate::json::{self, JsonError};
use crate::knowledge::KnowledgeError;
use crate::search::SearchError;
use crate::vec_graph::Graph;

pub mod compare;
pub mod random;
pub mod search;

#[derive(Parser, Debug)]
#[clap(version = crate_version!(), long_about = None)]
#[clap(about = "CausX command line interface")]
pub enum Cli {
    /// Run a causal search against the d-separation oracle of a known graph.
    Search(search::SearchArgs),
    /// Compare an estimated graph with a reference graph.
    Compare(compare::CompareArgs),
    /// Print a random DAG.
    Random(random::RandomArgs),
}

/// Error type for the CLI.
#[derive(Debug, derive_more::Display, derive_more::From)]
pub enum CliError {
    /// Error reading or writing files.
    #[display("IO error: {_0}")]
    IO(std::io::Error),
    /// Error parsing an edge-list graph.
    #[display("Error parsing graph: {_0}")]
    GraphParse(ParseError),
    /// Error reading or writing a json graph.
    #[display("Json error: {_0}")]
    Json(JsonError),
    /// Error in a params file.
    #[display("Error parsing search params: {_0}")]
    Params(serde_json::Error),
    /// Error parsing or checking a knowledge file.
    #[display("Error in knowledge: {_0}")]
    Knowledge(KnowledgeError),
    /// The search itself failed.
    #[display("Search failed: {_0}")]
    Search(SearchError),
}

/// Read a graph from a `.json` file or an edge-list file.
pub fn read_graph_file(path: &Path) -> Result<Graph, CliError> {
    if path.extension().is_some_and(|e| e == "json") {
        Ok(json::read_graph(path)?)
    } else {
        let src = std::fs::read_to_string(path)?;
        Ok(from_edge_list(&src)?)
    }
}

/// Print `s`, or write it to `out` if given.
pub(crate) fn emit(s: &str, out: Option<&Path>) -> Result<(), CliError> {
    match out {
        Some(path) => std::fs::write(path, s)?,
        None => println!("{}", s.trim_end()),
    }
    Ok(())
}

impl Cli {
    pub fn run(self) -> Result<(), CliError> {
        match self {
            Cli::Search(args) => args.run(),
            Cli::Compare(args) => args.run(),
            Cli::Random(args) => args.run(),
        }
    }
}
