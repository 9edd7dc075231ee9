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

//! Json encoding of graphs and search results.
//!
//! Nodes are listed in index order, so the indices used by a
//! [`SearchReport`] are positions in the `nodes` array. Edges use the same
//! tokens as the edge-list format.

use crate::edge_list::{edge_token, parse_edge_token};
use crate::graph::{Edge, GraphError, GraphLike, NodeData, NodeType, Triple};
use crate::search::{SearchReport, SearchResult};
use crate::vec_graph::Graph;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("bad edge `{0}`")]
    BadEdge(String),
}

/// Helper method to skip serialization of default values in serde.
pub(crate) fn is_default<T: Default + PartialEq>(t: &T) -> bool {
    *t == Default::default()
}

/// A node in the json-encoded graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonNode {
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    #[serde(default)]
    #[serde(rename = "type")]
    pub ty: NodeType,
}

/// An edge, written `src token tgt`, e.g. `A o-> B`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonEdge {
    pub src: String,
    pub tgt: String,
    #[serde(rename = "type")]
    pub token: String,
}

/// The json-encoded format for graphs.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct JsonGraph {
    pub nodes: Vec<JsonNode>,
    #[serde(default)]
    pub edges: Vec<JsonEdge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub ambiguous: Vec<[String; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub underline: Vec<[String; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub dotted_underline: Vec<[String; 3]>,
}

fn named_triples<'a>(g: &impl GraphLike, ts: impl Iterator<Item = &'a Triple>) -> Vec<[String; 3]> {
    let mut ts: Vec<&Triple> = ts.collect();
    ts.sort_unstable();
    ts.into_iter()
        .map(|t| [g.name(t.x).to_string(), g.name(t.y).to_string(), g.name(t.z).to_string()])
        .collect()
}

impl JsonGraph {
    /// Encode a graph using the json representation.
    pub fn from_graph(g: &impl GraphLike) -> Self {
        let nodes = g
            .nodes()
            .map(|v| JsonNode {
                name: g.name(v).to_string(),
                ty: g.node_type(v),
            })
            .collect();
        let mut edges: Vec<Edge> = g.edges().collect();
        edges.sort_by_key(|e| (e.node1, e.node2));
        let edges = edges
            .into_iter()
            .map(|e| JsonEdge {
                src: g.name(e.node1).to_string(),
                tgt: g.name(e.node2).to_string(),
                token: edge_token(e.endpoint1, e.endpoint2),
            })
            .collect();
        let t = g.triples();
        JsonGraph {
            nodes,
            edges,
            ambiguous: named_triples(g, t.ambiguous.iter()),
            underline: named_triples(g, t.underline.iter()),
            dotted_underline: named_triples(g, t.dotted_underline.iter()),
        }
    }

    /// Decode into a graph, keeping node order.
    pub fn to_graph<G: GraphLike>(&self) -> Result<G, JsonError> {
        let mut g = G::new();
        for n in &self.nodes {
            g.add_node_with_data(NodeData {
                name: n.name.clone(),
                ty: n.ty,
            })?;
        }
        let lookup = |g: &G, name: &str| g.node_by_name(name).ok_or_else(|| GraphError::UnknownName(name.to_string()));
        for e in &self.edges {
            let (at_src, at_tgt) = parse_edge_token(&e.token).ok_or_else(|| JsonError::BadEdge(e.token.clone()))?;
            let (s, t) = (lookup(&g, &e.src)?, lookup(&g, &e.tgt)?);
            g.add_edge(Edge::new(s, t, at_src, at_tgt))?;
        }
        for [x, y, z] in &self.ambiguous {
            let (x, y, z) = (lookup(&g, x)?, lookup(&g, y)?, lookup(&g, z)?);
            g.add_ambiguous_triple(x, y, z);
        }
        for [x, y, z] in &self.underline {
            let (x, y, z) = (lookup(&g, x)?, lookup(&g, y)?, lookup(&g, z)?);
            g.add_underline_triple(x, y, z);
        }
        for [x, y, z] in &self.dotted_underline {
            let (x, y, z) = (lookup(&g, x)?, lookup(&g, y)?, lookup(&g, z)?);
            g.add_dotted_underline_triple(x, y, z);
        }
        Ok(g)
    }
}

/// One sepset entry, by name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonSepset {
    pub x: String,
    pub y: String,
    pub sepset: Vec<String>,
}

/// The json-encoded output of a search.
#[derive(Serialize, Debug, Clone)]
pub struct JsonSearchResult {
    pub graph: JsonGraph,
    pub sepsets: Vec<JsonSepset>,
    pub report: SearchReport,
}

impl JsonSearchResult {
    pub fn from_result(res: &SearchResult) -> Self {
        let g = &res.graph;
        let mut sepsets: Vec<JsonSepset> = res
            .sepsets
            .iter()
            .map(|(x, y, s)| JsonSepset {
                x: g.name(x).to_string(),
                y: g.name(y).to_string(),
                sepset: s.iter().map(|&v| g.name(v).to_string()).collect(),
            })
            .collect();
        sepsets.sort_by(|a, b| (&a.x, &a.y).cmp(&(&b.x, &b.y)));
        JsonSearchResult {
            graph: JsonGraph::from_graph(g),
            sepsets,
            report: res.report.clone(),
        }
    }
}

/// Returns the json-encoded representation of a graph.
pub fn encode_graph(g: &impl GraphLike) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonGraph::from_graph(g))
}

/// Reads a graph from its json-encoded representation.
pub fn decode_graph<G: GraphLike>(s: &str) -> Result<G, JsonError> {
    let jg: JsonGraph = serde_json::from_str(s)?;
    jg.to_graph()
}

/// Writes the json-encoded representation of a graph to a file.
pub fn write_graph(g: &impl GraphLike, filename: &Path) -> Result<(), JsonError> {
    let file = std::fs::File::create(filename)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &JsonGraph::from_graph(g))?;
    Ok(())
}

/// Reads a graph from a json-encoded file.
pub fn read_graph<G: GraphLike>(filename: &Path) -> Result<G, JsonError> {
    let file = std::fs::File::open(filename)?;
    let reader = std::io::BufReader::new(file);
    let jg: JsonGraph = serde_json::from_reader(reader)?;
    jg.to_graph()
}

/// Returns the json-encoded search result.
pub fn encode_result(res: &SearchResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonSearchResult::from_result(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_list::from_edge_list;
    use crate::sepset::SepsetMap;
    use rstest::{fixture, rstest};

    #[fixture]
    fn pag() -> Graph {
        let mut g = from_edge_list("Latent(L), A o-> B, B <-> C, C --> D, A o-o E").unwrap();
        let (b, c, d) = (2, 3, 4);
        g.add_underline_triple(b, c, d);
        g
    }

    #[rstest]
    fn graph_roundtrip(pag: Graph) {
        let s = encode_graph(&pag).unwrap();
        let h: Graph = decode_graph(&s).unwrap();
        assert_eq!(pag, h);
        assert_eq!(pag.triples(), h.triples());
        assert_eq!(h.node_type(0), NodeType::Latent);
    }

    #[rstest]
    fn file_roundtrip(pag: Graph) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pag.json");
        write_graph(&pag, &path).unwrap();
        let h: Graph = read_graph(&path).unwrap();
        assert_eq!(pag, h);
    }

    #[test]
    fn decode_by_hand() {
        let s = r#"{
            "nodes": [{"name": "X"}, {"name": "Y"}, {"name": "Z"}],
            "edges": [{"src": "X", "tgt": "Y", "type": "-->"}, {"src": "Z", "tgt": "Y", "type": "-->"}],
            "ambiguous": [["X", "Y", "Z"]]
        }"#;
        let g: Graph = decode_graph(s).unwrap();
        assert!(g.is_def_collider(0, 1, 2));
        assert!(g.is_ambiguous_triple(2, 1, 0));
    }

    #[rstest]
    #[case(r#"{"nodes": [{"name": "X"}], "edges": [{"src": "X", "tgt": "Q", "type": "-->"}]}"#)]
    #[case(r#"{"nodes": [{"name": "X"}, {"name": "Y"}], "edges": [{"src": "X", "tgt": "Y", "type": "~~>"}]}"#)]
    #[case(r#"{"edges": []}"#)]
    fn decode_errors(#[case] s: &str) {
        assert!(decode_graph::<Graph>(s).is_err());
    }

    #[test]
    fn result_uses_names() {
        let graph = from_edge_list("X, Y, Z, X --> Z, Y --> Z").unwrap();
        let mut sepsets = SepsetMap::new();
        sepsets.set(0, 1, vec![]);
        let res = SearchResult {
            graph,
            sepsets,
            report: SearchReport::default(),
        };
        let v: serde_json::Value = serde_json::from_str(&encode_result(&res).unwrap()).unwrap();
        assert_eq!(v["sepsets"][0]["x"], "X");
        assert_eq!(v["sepsets"][0]["y"], "Y");
        assert_eq!(v["graph"]["edges"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(v["report"]["truncated"], false);
    }
}
