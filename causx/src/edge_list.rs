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

//! Plain-text edge lists.
//!
//! A graph is written as entries separated by commas or newlines. Each entry
//! is either an edge `A --> B`, a lone node name `A`, or a latent node
//! declaration `Latent(L)`. The edge token gives the mark at `A` on the left
//! and the mark at `B` on the right: `-` for a tail, `<`/`>` for an arrow and
//! `o` for a circle, so `A o-> B`, `A <-o B`, `A --o B` and so on.
//!
//! Lines starting with `#` are comments.

use crate::graph::{Edge, Endpoint, GraphError, GraphLike, NodeData, NodeType};
use crate::vec_graph::Graph;
use itertools::Itertools;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unrecognised edge `{token}`")]
    BadEdge { line: usize, token: String },
    #[error("line {line}: expected `A --> B` or a node name, found `{entry}`")]
    BadEntry { line: usize, entry: String },
    #[error("line {line}: {source}")]
    Graph {
        line: usize,
        #[source]
        source: GraphError,
    },
}

/// The token for an edge read from `from`'s side, e.g. `o->`.
pub fn edge_token(at_from: Endpoint, at_to: Endpoint) -> String {
    format!("{}-{}", at_from.left_char(), at_to.right_char())
}

/// The marks `(at_left, at_right)` of an edge token.
pub fn parse_edge_token(token: &str) -> Option<(Endpoint, Endpoint)> {
    let cs: Vec<char> = token.chars().collect();
    match cs[..] {
        [l, '-', r] => Some((Endpoint::from_left_char(l)?, Endpoint::from_right_char(r)?)),
        _ => None,
    }
}

fn node_or_existing(g: &mut Graph, name: &str, line: usize) -> Result<usize, ParseError> {
    match g.node_by_name(name) {
        Some(v) => Ok(v),
        None => g.add_node(name).map_err(|source| ParseError::Graph { line, source }),
    }
}

fn parse_entry(g: &mut Graph, entry: &str, line: usize) -> Result<(), ParseError> {
    let parts: Vec<&str> = entry.split_whitespace().collect();
    match parts[..] {
        [name] => {
            if let Some(latent) = name.strip_prefix("Latent(").and_then(|s| s.strip_suffix(')')) {
                g.add_node_with_data(NodeData::latent(latent))
                    .map_err(|source| ParseError::Graph { line, source })?;
            } else {
                node_or_existing(g, name, line)?;
            }
            Ok(())
        }
        [a, token, b] => {
            let (at_a, at_b) = parse_edge_token(token).ok_or_else(|| ParseError::BadEdge {
                line,
                token: token.to_string(),
            })?;
            let a = node_or_existing(g, a, line)?;
            let b = node_or_existing(g, b, line)?;
            g.add_edge(Edge::new(a, b, at_a, at_b))
                .map_err(|source| ParseError::Graph { line, source })?;
            Ok(())
        }
        _ => Err(ParseError::BadEntry {
            line,
            entry: entry.to_string(),
        }),
    }
}

/// Build a graph from an edge list.
///
/// Nodes are created in order of first mention.
pub fn from_edge_list(s: &str) -> Result<Graph, ParseError> {
    let mut g = Graph::new();
    for (i, line) in s.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        for entry in line.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            parse_entry(&mut g, entry, line_no)?;
        }
    }
    Ok(g)
}

fn node_entry(g: &impl GraphLike, v: usize) -> String {
    match g.node_type(v) {
        NodeType::Latent => format!("Latent({})", g.name(v)),
        _ => g.name(v).to_string(),
    }
}

/// Write a graph as an edge list.
///
/// The first line declares every node in index order, so reading the output
/// back gives the same graph with the same node indices. Each edge follows on
/// its own line.
pub fn to_edge_list(g: &impl GraphLike) -> String {
    let mut out = g.nodes().map(|v| node_entry(g, v)).join(", ");
    out.push('\n');
    for e in g.edges().sorted_by_key(|e| (e.node1, e.node2)) {
        out += &format!(
            "{} {} {}\n",
            g.name(e.node1),
            edge_token(e.endpoint1, e.endpoint2),
            g.name(e.node2)
        );
    }
    out
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_edge_list(self))
    }
}

impl std::str::FromStr for Graph {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Graph, ParseError> {
        from_edge_list(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("-->", Endpoint::Tail, Endpoint::Arrow)]
    #[case("<--", Endpoint::Arrow, Endpoint::Tail)]
    #[case("---", Endpoint::Tail, Endpoint::Tail)]
    #[case("<->", Endpoint::Arrow, Endpoint::Arrow)]
    #[case("o->", Endpoint::Circle, Endpoint::Arrow)]
    #[case("<-o", Endpoint::Arrow, Endpoint::Circle)]
    #[case("o-o", Endpoint::Circle, Endpoint::Circle)]
    #[case("--o", Endpoint::Tail, Endpoint::Circle)]
    #[case("o--", Endpoint::Circle, Endpoint::Tail)]
    fn tokens(#[case] token: &str, #[case] left: Endpoint, #[case] right: Endpoint) {
        assert_eq!(parse_edge_token(token), Some((left, right)));
        assert_eq!(edge_token(left, right), token);
    }

    #[test]
    fn parse_mixed_separators() {
        let g = from_edge_list("A --> B, B <-- C\nC o-o D\n\n# comment\nE").unwrap();
        assert_eq!(g.num_nodes(), 5);
        assert_eq!(g.num_edges(), 3);
        let (a, b, c, d) = (0, 1, 2, 3);
        assert!(g.is_parent_of(a, b));
        assert!(g.is_parent_of(c, b));
        assert_eq!(g.edge(c, d), Some(Edge::nondirected(c, d)));
        assert_eq!(g.degree(4), 0);
    }

    #[test]
    fn latent_nodes() {
        let g = from_edge_list("Latent(L), L --> A, L --> B").unwrap();
        assert_eq!(g.node_type(0), NodeType::Latent);
        assert_eq!(g.node_type(1), NodeType::Measured);
        assert!(to_edge_list(&g).starts_with("Latent(L), A, B\n"));
    }

    #[test]
    fn print_and_read_back() {
        let src = "X, Y, Z, W, Latent(L)\nX o-> Y\nY <-> Z\nZ --o W\nW <-- L\n";
        let g = from_edge_list(src).unwrap();
        assert_eq!(to_edge_list(&g), src);
        let h: Graph = g.to_string().parse().unwrap();
        assert_eq!(g, h);
    }

    #[rstest]
    #[case("A ==> B", ParseError::BadEdge { line: 1, token: "==>".into() })]
    #[case("A -->", ParseError::BadEntry { line: 1, entry: "A -->".into() })]
    #[case("A --> B\nB <-> A", ParseError::Graph { line: 2, source: GraphError::ParallelEdge(1, 0) })]
    #[case("A --> A", ParseError::Graph { line: 1, source: GraphError::SelfLoop(0) })]
    fn errors(#[case] src: &str, #[case] err: ParseError) {
        assert_eq!(from_edge_list(src), Err(err));
    }
}
