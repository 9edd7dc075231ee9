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

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

pub type V = usize;

/// The mark at one end of an edge.
///
/// The serialized names follow the usual causal-graph vocabulary.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    #[default]
    #[serde(rename = "tail")]
    Tail,
    #[serde(rename = "arrow")]
    Arrow,
    #[serde(rename = "circle")]
    Circle,
    /// No mark. Returned for pairs that are not adjacent.
    #[serde(rename = "null")]
    Null,
}

impl Endpoint {
    /// The character used for this mark on the left of an edge token, e.g. `<` in `<->`.
    pub fn left_char(self) -> char {
        match self {
            Endpoint::Tail => '-',
            Endpoint::Arrow => '<',
            Endpoint::Circle => 'o',
            Endpoint::Null => '?',
        }
    }

    /// The character used for this mark on the right of an edge token, e.g. `>` in `o->`.
    pub fn right_char(self) -> char {
        match self {
            Endpoint::Tail => '-',
            Endpoint::Arrow => '>',
            Endpoint::Circle => 'o',
            Endpoint::Null => '?',
        }
    }

    pub fn from_left_char(c: char) -> Option<Endpoint> {
        match c {
            '-' => Some(Endpoint::Tail),
            '<' => Some(Endpoint::Arrow),
            'o' => Some(Endpoint::Circle),
            _ => None,
        }
    }

    pub fn from_right_char(c: char) -> Option<Endpoint> {
        match c {
            '-' => Some(Endpoint::Tail),
            '>' => Some(Endpoint::Arrow),
            'o' => Some(Endpoint::Circle),
            _ => None,
        }
    }
}

/// The kind of variable a node stands for.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[default]
    #[serde(rename = "measured")]
    Measured,
    #[serde(rename = "latent")]
    Latent,
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub name: String,
    pub ty: NodeType,
}

impl NodeData {
    pub fn new(name: impl Into<String>) -> Self {
        NodeData {
            name: name.into(),
            ty: NodeType::Measured,
        }
    }

    pub fn latent(name: impl Into<String>) -> Self {
        NodeData {
            name: name.into(),
            ty: NodeType::Latent,
        }
    }
}

/// An edge between two nodes, with one mark at each end.
///
/// Edges are values: `a --> b` and `b <-- a` are the same edge. Equality and
/// hashing both work on the mirrored-normal form.
#[derive(Debug, Copy, Clone)]
pub struct Edge {
    pub node1: V,
    pub node2: V,
    /// Mark proximal to `node1`.
    pub endpoint1: Endpoint,
    /// Mark proximal to `node2`.
    pub endpoint2: Endpoint,
}

impl Edge {
    pub fn new(node1: V, node2: V, endpoint1: Endpoint, endpoint2: Endpoint) -> Edge {
        Edge {
            node1,
            node2,
            endpoint1,
            endpoint2,
        }
    }

    /// `from --> to`
    pub fn directed(from: V, to: V) -> Edge {
        Edge::new(from, to, Endpoint::Tail, Endpoint::Arrow)
    }

    /// `a --- b`
    pub fn undirected(a: V, b: V) -> Edge {
        Edge::new(a, b, Endpoint::Tail, Endpoint::Tail)
    }

    /// `a <-> b`
    pub fn bidirected(a: V, b: V) -> Edge {
        Edge::new(a, b, Endpoint::Arrow, Endpoint::Arrow)
    }

    /// `from o-> to`
    pub fn partially_oriented(from: V, to: V) -> Edge {
        Edge::new(from, to, Endpoint::Circle, Endpoint::Arrow)
    }

    /// `a o-o b`
    pub fn nondirected(a: V, b: V) -> Edge {
        Edge::new(a, b, Endpoint::Circle, Endpoint::Circle)
    }

    /// The mark at `v`, if `v` is one of the ends of this edge.
    pub fn endpoint_at(&self, v: V) -> Option<Endpoint> {
        if v == self.node1 {
            Some(self.endpoint1)
        } else if v == self.node2 {
            Some(self.endpoint2)
        } else {
            None
        }
    }

    /// The node at the other end from `v`.
    pub fn distal(&self, v: V) -> Option<V> {
        if v == self.node1 {
            Some(self.node2)
        } else if v == self.node2 {
            Some(self.node1)
        } else {
            None
        }
    }

    /// The same edge, written the other way round.
    pub fn reverse(&self) -> Edge {
        Edge::new(self.node2, self.node1, self.endpoint2, self.endpoint1)
    }

    pub fn is_directed(&self) -> bool {
        matches!(
            (self.endpoint1, self.endpoint2),
            (Endpoint::Tail, Endpoint::Arrow) | (Endpoint::Arrow, Endpoint::Tail)
        )
    }

    pub fn is_undirected(&self) -> bool {
        self.endpoint1 == Endpoint::Tail && self.endpoint2 == Endpoint::Tail
    }

    pub fn is_bidirected(&self) -> bool {
        self.endpoint1 == Endpoint::Arrow && self.endpoint2 == Endpoint::Arrow
    }

    pub fn is_nondirected(&self) -> bool {
        self.endpoint1 == Endpoint::Circle && self.endpoint2 == Endpoint::Circle
    }

    /// True for `o->` in either orientation.
    pub fn is_partially_oriented(&self) -> bool {
        matches!(
            (self.endpoint1, self.endpoint2),
            (Endpoint::Circle, Endpoint::Arrow) | (Endpoint::Arrow, Endpoint::Circle)
        )
    }

    /// True if this is a directed edge with its arrowhead at `v`.
    pub fn points_towards(&self, v: V) -> bool {
        self.is_directed() && self.endpoint_at(v) == Some(Endpoint::Arrow)
    }

    /// Normal form with the smaller node index first.
    fn canonical(&self) -> (V, V, Endpoint, Endpoint) {
        if self.node1 <= self.node2 {
            (self.node1, self.node2, self.endpoint1, self.endpoint2)
        } else {
            (self.node2, self.node1, self.endpoint2, self.endpoint1)
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Edge) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

/// Three nodes `x - y - z` with `y` in the middle.
///
/// `(x, y, z)` and `(z, y, x)` are the same triple; the constructor stores the
/// ends in increasing order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub x: V,
    pub y: V,
    pub z: V,
}

impl Triple {
    pub fn new(x: V, y: V, z: V) -> Triple {
        if x <= z {
            Triple { x, y, z }
        } else {
            Triple { x: z, y, z: x }
        }
    }

    pub fn contains(&self, v: V) -> bool {
        self.x == v || self.y == v || self.z == v
    }
}

/// Triple annotations carried alongside a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleSets {
    pub ambiguous: FxHashSet<Triple>,
    /// Definite non-colliders.
    pub underline: FxHashSet<Triple>,
    pub dotted_underline: FxHashSet<Triple>,
}

impl TripleSets {
    pub fn is_empty(&self) -> bool {
        self.ambiguous.is_empty() && self.underline.is_empty() && self.dotted_underline.is_empty()
    }

    pub fn clear(&mut self) {
        self.ambiguous.clear();
        self.underline.clear();
        self.dotted_underline.clear();
    }

    /// Drop every triple that mentions `v`.
    pub fn remove_node(&mut self, v: V) {
        self.ambiguous.retain(|t| !t.contains(v));
        self.underline.retain(|t| !t.contains(v));
        self.dotted_underline.retain(|t| !t.contains(v));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("a node named `{0}` already exists in the graph")]
    DuplicateNode(String),
    #[error("node {0} is not in the graph")]
    NoSuchNode(V),
    #[error("no node named `{0}` in the graph")]
    UnknownName(String),
    #[error("nodes {0} and {1} are not adjacent")]
    NoSuchEdge(V, V),
    #[error("nodes {0} and {1} are already joined by a different edge")]
    ParallelEdge(V, V),
    #[error("cannot join node {0} to itself")]
    SelfLoop(V),
}

pub trait GraphLike: Clone + Sized + Send + Sync + std::fmt::Debug {
    /// Initialise a new empty graph
    fn new() -> Self;

    /// Number of nodes
    fn num_nodes(&self) -> usize;

    /// Number of edges
    fn num_edges(&self) -> usize;

    /// Get iterator over all nodes, in increasing index order
    fn nodes(&self) -> impl Iterator<Item = V>;

    /// Get iterator over all edges
    ///
    /// Each edge is returned once, with `node1 < node2`.
    fn edges(&self) -> impl Iterator<Item = Edge>;

    /// Add a node with the given data
    ///
    /// Returns an error if a node with the same name already exists.
    fn add_node_with_data(&mut self, d: NodeData) -> Result<V, GraphError>;

    /// Remove a node and every edge incident to it
    fn remove_node(&mut self, v: V) -> Result<(), GraphError>;

    /// Add an edge
    ///
    /// Adding an edge identical to one already present does nothing and
    /// returns `Ok(false)`. Adding a different edge between an already
    /// adjacent pair is an error.
    fn add_edge(&mut self, e: Edge) -> Result<bool, GraphError>;

    /// Remove the edge between s and t, returning whether there was one
    fn remove_edge(&mut self, s: V, t: V) -> bool;

    /// Get the data associated to the given node
    fn node_data(&self, v: V) -> &NodeData;

    fn node_by_name(&self, name: &str) -> Option<V>;

    /// The mark at `to` on the edge between `from` and `to`
    fn endpoint_opt(&self, from: V, to: V) -> Option<Endpoint>;

    /// Set the mark at `to` on the edge between `from` and `to`
    ///
    /// The mark at `from` is left alone.
    fn set_endpoint(&mut self, from: V, to: V, ep: Endpoint) -> Result<(), GraphError>;

    fn neighbors(&self, v: V) -> impl Iterator<Item = V>;
    fn degree(&self, v: V) -> usize;
    fn contains_node(&self, v: V) -> bool;

    fn triples(&self) -> &TripleSets;
    fn triples_mut(&mut self) -> &mut TripleSets;

    /// Add a measured node with the given name
    fn add_node(&mut self, name: &str) -> Result<V, GraphError> {
        self.add_node_with_data(NodeData::new(name))
    }

    fn add_directed_edge(&mut self, from: V, to: V) -> Result<bool, GraphError> {
        self.add_edge(Edge::directed(from, to))
    }

    fn add_undirected_edge(&mut self, a: V, b: V) -> Result<bool, GraphError> {
        self.add_edge(Edge::undirected(a, b))
    }

    fn add_bidirected_edge(&mut self, a: V, b: V) -> Result<bool, GraphError> {
        self.add_edge(Edge::bidirected(a, b))
    }

    fn add_partially_oriented_edge(&mut self, from: V, to: V) -> Result<bool, GraphError> {
        self.add_edge(Edge::partially_oriented(from, to))
    }

    fn add_nondirected_edge(&mut self, a: V, b: V) -> Result<bool, GraphError> {
        self.add_edge(Edge::nondirected(a, b))
    }

    fn name(&self, v: V) -> &str {
        &self.node_data(v).name
    }

    fn node_type(&self, v: V) -> NodeType {
        self.node_data(v).ty
    }

    fn endpoint(&self, from: V, to: V) -> Endpoint {
        self.endpoint_opt(from, to).unwrap_or(Endpoint::Null)
    }

    fn edge(&self, s: V, t: V) -> Option<Edge> {
        let at_t = self.endpoint_opt(s, t)?;
        let at_s = self.endpoint_opt(t, s)?;
        Some(Edge::new(s, t, at_s, at_t))
    }

    fn is_adjacent_to(&self, a: V, b: V) -> bool {
        self.endpoint_opt(a, b).is_some()
    }

    fn node_vec(&self) -> Vec<V> {
        self.nodes().collect()
    }

    fn edge_vec(&self) -> Vec<Edge> {
        self.edges().collect()
    }

    fn neighbor_vec(&self, v: V) -> Vec<V> {
        self.neighbors(v).collect()
    }

    /// Set both marks of the edge between a and b
    fn set_edge_endpoints(&mut self, a: V, b: V, at_a: Endpoint, at_b: Endpoint) -> Result<(), GraphError> {
        self.set_endpoint(b, a, at_a)?;
        self.set_endpoint(a, b, at_b)
    }

    /// Orient the edge between `from` and `to` as `from --> to`
    fn orient(&mut self, from: V, to: V) -> Result<(), GraphError> {
        self.set_edge_endpoints(from, to, Endpoint::Tail, Endpoint::Arrow)
    }

    /// Remove all edges, keeping nodes
    fn clear_edges(&mut self) {
        for e in self.edge_vec() {
            self.remove_edge(e.node1, e.node2);
        }
    }

    /// Replace every mark in the graph with `ep`
    fn reorient_all_with(&mut self, ep: Endpoint) -> Result<(), GraphError> {
        for e in self.edge_vec() {
            self.set_edge_endpoints(e.node1, e.node2, ep, ep)?;
        }
        Ok(())
    }

    /// The neighbours of `v` in increasing index order
    fn adjacent_nodes(&self, v: V) -> Vec<V> {
        let mut ns: Vec<V> = self.neighbors(v).collect();
        ns.sort_unstable();
        ns
    }

    /// Nodes `w` adjacent to `v` with `w --> v`
    fn parents(&self, v: V) -> Vec<V> {
        self.neighbors(v)
            .filter(|&w| self.endpoint(w, v) == Endpoint::Arrow && self.endpoint(v, w) == Endpoint::Tail)
            .collect()
    }

    /// Nodes `w` adjacent to `v` with `v --> w`
    fn children(&self, v: V) -> Vec<V> {
        self.neighbors(v)
            .filter(|&w| self.endpoint(v, w) == Endpoint::Arrow && self.endpoint(w, v) == Endpoint::Tail)
            .collect()
    }

    fn is_parent_of(&self, a: V, b: V) -> bool {
        self.endpoint(a, b) == Endpoint::Arrow && self.endpoint(b, a) == Endpoint::Tail
    }

    /// Neighbours `w` of `v` whose edge has mark `ep` at `v`
    fn nodes_into(&self, v: V, ep: Endpoint) -> Vec<V> {
        self.neighbors(v).filter(|&w| self.endpoint(w, v) == ep).collect()
    }

    /// Neighbours `w` of `v` whose edge has mark `ep` at `w`
    fn nodes_out_of(&self, v: V, ep: Endpoint) -> Vec<V> {
        self.neighbors(v).filter(|&w| self.endpoint(v, w) == ep).collect()
    }

    /// `a *-> b <-* c`
    fn is_def_collider(&self, a: V, b: V, c: V) -> bool {
        self.endpoint(a, b) == Endpoint::Arrow && self.endpoint(c, b) == Endpoint::Arrow
    }

    /// `b` is marked as a non-collider on `a - b - c`, either by a tail at `b`
    /// or by an underline.
    fn is_def_noncollider(&self, a: V, b: V, c: V) -> bool {
        self.endpoint(a, b) == Endpoint::Tail
            || self.endpoint(c, b) == Endpoint::Tail
            || self.is_underline_triple(a, b, c)
    }

    fn add_ambiguous_triple(&mut self, x: V, y: V, z: V) {
        self.triples_mut().ambiguous.insert(Triple::new(x, y, z));
    }

    fn add_underline_triple(&mut self, x: V, y: V, z: V) {
        self.triples_mut().underline.insert(Triple::new(x, y, z));
    }

    fn add_dotted_underline_triple(&mut self, x: V, y: V, z: V) {
        self.triples_mut().dotted_underline.insert(Triple::new(x, y, z));
    }

    fn is_ambiguous_triple(&self, x: V, y: V, z: V) -> bool {
        self.triples().ambiguous.contains(&Triple::new(x, y, z))
    }

    fn is_underline_triple(&self, x: V, y: V, z: V) -> bool {
        self.triples().underline.contains(&Triple::new(x, y, z))
    }

    fn is_dotted_underline_triple(&self, x: V, y: V, z: V) -> bool {
        self.triples().dotted_underline.contains(&Triple::new(x, y, z))
    }

    /// All ancestors of the given nodes, the nodes themselves included
    fn ancestors_of(&self, vs: &[V]) -> FxHashSet<V> {
        let mut seen: FxHashSet<V> = vs.iter().copied().collect();
        let mut queue: VecDeque<V> = vs.iter().copied().collect();
        while let Some(v) = queue.pop_front() {
            for p in self.parents(v) {
                if seen.insert(p) {
                    queue.push_back(p);
                }
            }
        }
        seen
    }

    /// All descendants of the given nodes, the nodes themselves included
    fn descendants_of(&self, vs: &[V]) -> FxHashSet<V> {
        let mut seen: FxHashSet<V> = vs.iter().copied().collect();
        let mut queue: VecDeque<V> = vs.iter().copied().collect();
        while let Some(v) = queue.pop_front() {
            for c in self.children(v) {
                if seen.insert(c) {
                    queue.push_back(c);
                }
            }
        }
        seen
    }

    /// True if `a == b` or there is a directed path from `a` to `b`
    fn is_ancestor_of(&self, a: V, b: V) -> bool {
        a == b || self.exists_directed_path(a, b)
    }

    fn is_descendant_of(&self, a: V, b: V) -> bool {
        self.is_ancestor_of(b, a)
    }

    /// True if there is a directed path of length at least one from `from` to `to`
    fn exists_directed_path(&self, from: V, to: V) -> bool {
        let mut seen = FxHashSet::default();
        let mut queue: VecDeque<V> = self.children(from).into();
        while let Some(v) = queue.pop_front() {
            if v == to {
                return true;
            }
            if seen.insert(v) {
                queue.extend(self.children(v));
            }
        }
        false
    }

    fn exists_directed_cycle(&self) -> bool {
        // 0 = unvisited, 1 = on the stack, 2 = finished
        let mut state: rustc_hash::FxHashMap<V, u8> = rustc_hash::FxHashMap::default();
        for root in self.nodes() {
            if state.contains_key(&root) {
                continue;
            }
            let mut stack = vec![(root, self.children(root), 0usize)];
            state.insert(root, 1);
            while let Some(top) = stack.len().checked_sub(1) {
                let (v, i) = (stack[top].0, stack[top].2);
                if i < stack[top].1.len() {
                    let c = stack[top].1[i];
                    stack[top].2 += 1;
                    match state.get(&c) {
                        Some(1) => return true,
                        Some(_) => {}
                        None => {
                            state.insert(c, 1);
                            stack.push((c, self.children(c), 0));
                        }
                    }
                } else {
                    state.insert(v, 2);
                    stack.pop();
                }
            }
        }
        false
    }

    /// m-connection of x and y given z
    ///
    /// Walks the graph edge by edge: a non-collider passes when it is not in
    /// `z`, a collider passes when it is an ancestor of `z`. Bidirected edges
    /// are treated as arrowheads at both ends, so this is ordinary
    /// d-separation on DAGs and m-separation on mixed graphs.
    fn is_d_connected_to(&self, x: V, y: V, z: &[V]) -> bool {
        if x == y {
            return true;
        }
        let zset: FxHashSet<V> = z.iter().copied().collect();
        let anc_z = self.ancestors_of(z);
        let mut seen: FxHashSet<(V, V)> = FxHashSet::default();
        let mut queue: VecDeque<(V, V)> = VecDeque::new();
        for w in self.neighbors(x) {
            if seen.insert((x, w)) {
                queue.push_back((x, w));
            }
        }
        while let Some((a, b)) = queue.pop_front() {
            if b == y {
                return true;
            }
            for c in self.neighbors(b) {
                if c == a {
                    continue;
                }
                let passes = if self.is_def_collider(a, b, c) {
                    anc_z.contains(&b)
                } else {
                    !zset.contains(&b)
                };
                if passes && seen.insert((b, c)) {
                    queue.push_back((b, c));
                }
            }
        }
        false
    }

    fn is_d_separated_from(&self, x: V, y: V, z: &[V]) -> bool {
        !self.is_d_connected_to(x, y, z)
    }
}

/// Structural equality by node name.
///
/// Two graphs are equal when they have the same node names and, for every pair
/// of names, the same edge (up to mirroring). Node indices and triple
/// annotations are not compared.
pub fn structurally_equal(g1: &impl GraphLike, g2: &impl GraphLike) -> bool {
    if g1.num_nodes() != g2.num_nodes() || g1.num_edges() != g2.num_edges() {
        return false;
    }
    let mut map = Vec::with_capacity(g1.num_nodes());
    for v in g1.nodes() {
        match g2.node_by_name(g1.name(v)) {
            Some(w) => map.push((v, w)),
            None => return false,
        }
    }
    let lookup: rustc_hash::FxHashMap<V, V> = map.into_iter().collect();
    g1.edges().all(|e| {
        let (a, b) = (lookup[&e.node1], lookup[&e.node2]);
        g2.edge(a, b) == Some(Edge::new(a, b, e.endpoint1, e.endpoint2))
    })
}
