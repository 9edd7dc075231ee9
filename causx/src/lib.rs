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

//! Constraint-based causal structure search.
//!
//! An adjacency search ([`fas`]) finds the skeleton of a causal graph from
//! conditional-independence judgments, and an orientation phase marks what the
//! judgments force: a pattern for [`search::Pc`], a PAG for [`search::Fci`],
//! and a cyclic PAG for [`ccd::Ccd`].

pub mod choose;
pub mod graph;
pub mod vec_graph;
pub mod edge_list;
pub mod json;
pub mod knowledge;
pub mod indep;
pub mod sepset;
pub mod fas;
pub mod colliders;
pub mod meek;
pub mod fci_orient;
pub mod possible_dsep;
pub mod ccd;
pub mod search;
pub mod compare;
pub mod random_graph;
pub mod cli;

pub use graph::{Edge, Endpoint, GraphLike, Triple, V};
pub use search::{GraphSearch, SearchParams, SearchReport, SearchResult};
pub use vec_graph::Graph;
