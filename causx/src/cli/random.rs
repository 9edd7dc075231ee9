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

use crate::edge_list::to_edge_list;
use crate::json::{encode_graph, JsonError};
use crate::random_graph::RandomDagBuilder;
use crate::vec_graph::Graph;

use super::{emit, CliError};

#[derive(Parser, Debug)]
pub struct RandomArgs {
    #[arg(long, short, default_value_t = 5)]
    nodes: usize,

    #[arg(long, short, default_value_t = 5)]
    edges: usize,

    /// Number of nodes to mark latent.
    #[arg(long, short, default_value_t = 0)]
    latents: usize,

    /// Seed for the random generator. Random by default.
    #[arg(long, short)]
    seed: Option<u64>,

    /// Print the graph as json.
    #[arg(long)]
    json: bool,

    /// Output to a file instead of printing the result.
    #[arg(long, short)]
    out: Option<PathBuf>,
}

impl RandomArgs {
    /// Run the `random` command using the provided arguments.
    pub fn run(self) -> Result<(), CliError> {
        let mut builder = RandomDagBuilder::new();
        builder.nodes(self.nodes).edges(self.edges).latents(self.latents);
        if let Some(seed) = self.seed {
            builder.seed(seed);
        }
        let g: Graph = builder.build().map_err(crate::search::SearchError::from)?;
        let s = if self.json {
            encode_graph(&g).map_err(JsonError::from)?
        } else {
            to_edge_list(&g)
        };
        emit(&s, self.out.as_deref())
    }
}
