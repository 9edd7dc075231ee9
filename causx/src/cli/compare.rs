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

use clap::Parser;
use std::path::PathBuf;

use crate::compare::{equivalent_patterns, GraphComparison};
use crate::json::JsonError;
use crate::meek::pattern_from_dag;

use super::{emit, read_graph_file, CliError};

#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Estimated graph, as an edge list or a `.json` file.
    estimated: PathBuf,

    /// Reference graph, as an edge list or a `.json` file.
    reference: PathBuf,

    /// Compare against the pattern of the reference DAG instead of the DAG.
    #[arg(long)]
    pattern: bool,

    /// Print the statistics as json.
    #[arg(long)]
    json: bool,
}

impl CompareArgs {
    /// Run the `compare` command using the provided arguments.
    pub fn run(self) -> Result<(), CliError> {
        let est = read_graph_file(&self.estimated)?;
        let mut reference = read_graph_file(&self.reference)?;
        if self.pattern {
            reference = pattern_from_dag(&reference)?;
        }
        let cmp = GraphComparison::new(&est, &reference);
        let s = if self.json {
            serde_json::to_string_pretty(&cmp).map_err(JsonError::from)?
        } else {
            let same = equivalent_patterns(&est, &reference, false);
            format!("{cmp}\nequal: {same}")
        };
        emit(&s, None)
    }
}
