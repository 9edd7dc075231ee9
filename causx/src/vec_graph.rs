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

pub use crate::graph::*;
use rustc_hash::FxHashMap;

pub type VTab<T> = Vec<Option<T>>;

/// Arena-backed mixed graph.
///
/// Each adjacency list stores pairs `(w, ep)` where `ep` is the mark at `w`.
#[derive(Debug, Clone)]
pub struct Graph {
    ndata: VTab<NodeData>,
    edata: VTab<Vec<(V, Endpoint)>>,
    holes: Vec<V>, // places where a node has been deleted
    names: FxHashMap<String, V>,
    numv: usize,
    nume: usize,
    triples: TripleSets,
}

impl Graph {
    /// A graph with one measured node per name and no edges.
    pub fn with_nodes<I, S>(names: I) -> Result<Graph, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut g = Graph::new();
        for n in names {
            g.add_node(n.as_ref())?;
        }
        Ok(g)
    }

    /// The complete undirected graph over the given names.
    pub fn complete<I, S>(names: I) -> Result<Graph, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut g = Graph::with_nodes(names)?;
        let vs = g.node_vec();
        for (i, &a) in vs.iter().enumerate() {
            for &b in &vs[i + 1..] {
                g.add_undirected_edge(a, b)?;
            }
        }
        Ok(g)
    }

    /// Copy of `self` laid over the nodes of `reference`.
    ///
    /// The result has exactly the nodes of `reference` (same indices and
    /// data), with the edges and triples of `self` translated by name.
    pub fn replace_nodes(&self, reference: &Graph) -> Result<Graph, GraphError> {
        let mut h = reference.clone();
        h.clear_edges();
        h.triples.clear();
        let lookup = |v: V| -> Result<V, GraphError> {
            let name = self.name(v);
            reference
                .node_by_name(name)
                .ok_or_else(|| GraphError::UnknownName(name.to_string()))
        };
        for e in self.edges() {
            h.add_edge(Edge::new(lookup(e.node1)?, lookup(e.node2)?, e.endpoint1, e.endpoint2))?;
        }
        for (src, dst) in [
            (&self.triples.ambiguous, &mut h.triples.ambiguous),
            (&self.triples.underline, &mut h.triples.underline),
            (&self.triples.dotted_underline, &mut h.triples.dotted_underline),
        ] {
            for t in src {
                dst.insert(Triple::new(lookup(t.x)?, lookup(t.y)?, lookup(t.z)?));
            }
        }
        Ok(h)
    }

    fn index<U>(nhd: &[(V, U)], v: V) -> Option<usize> {
        nhd.iter().position(|&(v0, _)| v == v0)
    }

    fn value<U: Copy>(nhd: &[(V, U)], v: V) -> Option<U> {
        for (v0, u) in nhd.iter() {
            if v == *v0 {
                return Some(*u);
            }
        }
        None
    }

    /// Removes node 't' from the adjacency list of 's'. This private method
    /// is used by remove_edge and remove_node to make the latter slightly
    /// more efficient.
    fn remove_half_edge(&mut self, s: V, t: V) {
        if let Some(Some(nhd)) = self.edata.get_mut(s) {
            if let Some(i) = Graph::index(nhd, t) {
                nhd.swap_remove(i);
            }
        }
    }

    fn check_node(&self, v: V) -> Result<(), GraphError> {
        if self.contains_node(v) {
            Ok(())
        } else {
            Err(GraphError::NoSuchNode(v))
        }
    }
}

impl GraphLike for Graph {
    fn new() -> Graph {
        Graph {
            ndata: Vec::new(),
            edata: Vec::new(),
            holes: Vec::new(),
            names: FxHashMap::default(),
            numv: 0,
            nume: 0,
            triples: TripleSets::default(),
        }
    }

    fn num_nodes(&self) -> usize {
        self.numv
    }

    fn num_edges(&self) -> usize {
        self.nume
    }

    fn nodes(&self) -> impl Iterator<Item = V> {
        self.ndata
            .iter()
            .enumerate()
            .filter_map(|(v, d)| d.as_ref().map(|_| v))
    }

    fn edges(&self) -> impl Iterator<Item = Edge> {
        self.edata.iter().enumerate().flat_map(move |(v, tab)| {
            tab.iter().flat_map(move |nhd| {
                nhd.iter().filter_map(move |&(w, at_w)| {
                    if v < w {
                        let at_v = self.endpoint_opt(w, v).unwrap_or(Endpoint::Null);
                        Some(Edge::new(v, w, at_v, at_w))
                    } else {
                        None
                    }
                })
            })
        })
    }

    fn add_node_with_data(&mut self, d: NodeData) -> Result<V, GraphError> {
        if self.names.contains_key(&d.name) {
            return Err(GraphError::DuplicateNode(d.name));
        }
        self.numv += 1;
        let name = d.name.clone();
        let v = if let Some(v) = self.holes.pop() {
            self.ndata[v] = Some(d);
            self.edata[v] = Some(Vec::new());
            v
        } else {
            self.ndata.push(Some(d));
            self.edata.push(Some(Vec::new()));
            self.ndata.len() - 1
        };
        self.names.insert(name, v);
        Ok(v)
    }

    fn remove_node(&mut self, v: V) -> Result<(), GraphError> {
        self.check_node(v)?;
        self.numv -= 1;
        self.holes.push(v);

        if let Some(d) = self.ndata[v].take() {
            self.names.remove(&d.name);
        }
        let adj = self.edata[v].take().unwrap_or_default();
        for (v1, _) in adj {
            self.nume -= 1;
            self.remove_half_edge(v1, v);
        }
        self.triples.remove_node(v);
        Ok(())
    }

    fn add_edge(&mut self, e: Edge) -> Result<bool, GraphError> {
        let (s, t) = (e.node1, e.node2);
        self.check_node(s)?;
        self.check_node(t)?;
        if s == t {
            return Err(GraphError::SelfLoop(s));
        }
        if let Some(existing) = self.edge(s, t) {
            return if existing == e {
                Ok(false)
            } else {
                Err(GraphError::ParallelEdge(s, t))
            };
        }
        self.nume += 1;
        if let Some(Some(nhd)) = self.edata.get_mut(s) {
            nhd.push((t, e.endpoint2));
        }
        if let Some(Some(nhd)) = self.edata.get_mut(t) {
            nhd.push((s, e.endpoint1));
        }
        Ok(true)
    }

    fn remove_edge(&mut self, s: V, t: V) -> bool {
        if !self.is_adjacent_to(s, t) {
            return false;
        }
        self.nume -= 1;
        self.remove_half_edge(s, t);
        self.remove_half_edge(t, s);
        true
    }

    fn node_data(&self, v: V) -> &NodeData {
        self.ndata[v].as_ref().expect("Node not found")
    }

    fn node_by_name(&self, name: &str) -> Option<V> {
        self.names.get(name).copied()
    }

    fn endpoint_opt(&self, from: V, to: V) -> Option<Endpoint> {
        match self.edata.get(from) {
            Some(Some(nhd)) => Graph::value(nhd, to),
            _ => None,
        }
    }

    fn set_endpoint(&mut self, from: V, to: V, ep: Endpoint) -> Result<(), GraphError> {
        let nhd = match self.edata.get_mut(from) {
            Some(Some(nhd)) => nhd,
            _ => return Err(GraphError::NoSuchNode(from)),
        };
        match Graph::index(nhd, to) {
            Some(i) => {
                nhd[i].1 = ep;
                Ok(())
            }
            None => Err(GraphError::NoSuchEdge(from, to)),
        }
    }

    fn neighbors(&self, v: V) -> impl Iterator<Item = V> {
        self.edata
            .get(v)
            .and_then(|d| d.as_ref())
            .into_iter()
            .flat_map(|nhd| nhd.iter().map(|&(w, _)| w))
    }

    fn degree(&self, v: V) -> usize {
        match self.edata.get(v) {
            Some(Some(nhd)) => nhd.len(),
            _ => 0,
        }
    }

    fn contains_node(&self, v: V) -> bool {
        matches!(self.ndata.get(v), Some(Some(_)))
    }

    fn triples(&self) -> &TripleSets {
        &self.triples
    }

    fn triples_mut(&mut self) -> &mut TripleSets {
        &mut self.triples
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Graph) -> bool {
        structurally_equal(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Graph, V, V, V) {
        let mut g = Graph::new();
        let a = g.add_node("A").unwrap();
        let b = g.add_node("B").unwrap();
        let c = g.add_node("C").unwrap();
        g.add_directed_edge(a, b).unwrap();
        g.add_directed_edge(b, c).unwrap();
        (g, a, b, c)
    }

    #[test]
    fn create_empty_graph() {
        let g = Graph::new();
        assert_eq!(g.num_nodes(), 0);
        assert_eq!(g.num_edges(), 0);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut g = Graph::new();
        g.add_node("X").unwrap();
        assert_eq!(g.add_node("X"), Err(GraphError::DuplicateNode("X".into())));
        assert_eq!(g.num_nodes(), 1);
    }

    #[test]
    fn edges_and_endpoints() {
        let (g, a, b, c) = chain();
        assert_eq!(g.num_edges(), 2);
        assert_eq!(g.endpoint(a, b), Endpoint::Arrow);
        assert_eq!(g.endpoint(b, a), Endpoint::Tail);
        assert_eq!(g.endpoint(a, c), Endpoint::Null);
        assert!(g.is_parent_of(a, b));
        assert!(!g.is_parent_of(b, a));
        assert_eq!(g.parents(b), vec![a]);
        assert_eq!(g.children(b), vec![c]);
        assert_eq!(g.edge(b, a), Some(Edge::directed(a, b)));
    }

    #[test]
    fn readding_edges() {
        let (mut g, a, b, _) = chain();
        assert_eq!(g.add_directed_edge(a, b), Ok(false));
        assert_eq!(g.add_edge(Edge::new(b, a, Endpoint::Arrow, Endpoint::Tail)), Ok(false));
        assert_eq!(g.add_undirected_edge(a, b), Err(GraphError::ParallelEdge(a, b)));
        assert_eq!(g.add_directed_edge(a, a), Err(GraphError::SelfLoop(a)));
        assert_eq!(g.add_directed_edge(a, 17), Err(GraphError::NoSuchNode(17)));
        assert_eq!(g.num_edges(), 2);
    }

    #[test]
    fn remove_node_cascades() {
        let (mut g, a, b, c) = chain();
        let d = g.add_node("D").unwrap();
        g.add_bidirected_edge(a, d).unwrap();
        g.add_underline_triple(a, b, c);
        g.add_ambiguous_triple(b, a, d);

        g.remove_node(b).unwrap();
        assert_eq!(g.num_nodes(), 3);
        assert_eq!(g.num_edges(), 1);
        assert!(!g.is_adjacent_to(a, b));
        assert!(g.is_adjacent_to(a, d));
        assert!(g.triples().is_empty());
        assert_eq!(g.node_by_name("B"), None);
        assert_eq!(g.remove_node(b), Err(GraphError::NoSuchNode(b)));

        // the freed index is recycled and the name can be used again
        let b1 = g.add_node("B").unwrap();
        assert_eq!(b1, b);
        assert_eq!(g.degree(b1), 0);
    }

    #[test]
    fn set_endpoint_is_one_sided() {
        let (mut g, a, b, c) = chain();
        g.set_endpoint(b, a, Endpoint::Circle).unwrap();
        assert_eq!(g.edge(a, b), Some(Edge::partially_oriented(a, b)));
        assert_eq!(g.set_endpoint(a, c, Endpoint::Arrow), Err(GraphError::NoSuchEdge(a, c)));
        g.reorient_all_with(Endpoint::Circle).unwrap();
        assert!(g.edges().all(|e| e.is_nondirected()));
    }

    #[test]
    fn edge_iteration() {
        let (g, a, b, c) = chain();
        let mut es = g.edge_vec();
        es.sort_by_key(|e| (e.node1, e.node2));
        assert_eq!(es, vec![Edge::directed(a, b), Edge::directed(b, c)]);
        assert!(es.iter().all(|e| e.node1 < e.node2));
        assert_eq!(g.adjacent_nodes(b), vec![a, c]);
        assert!(g.adjacent_nodes(a) == vec![b] && g.parents(b) == vec![a]);
    }

    #[test]
    fn edge_equality_is_mirror_aware() {
        let e1 = Edge::directed(0, 1);
        let e2 = Edge::new(1, 0, Endpoint::Arrow, Endpoint::Tail);
        let e3 = Edge::directed(1, 0);
        assert_eq!(e1, e2);
        assert_ne!(e1, e3);
        let set: rustc_hash::FxHashSet<Edge> = [e1, e2, e3].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn cycles_and_ancestors() {
        let (mut g, a, b, c) = chain();
        assert!(!g.exists_directed_cycle());
        assert!(g.is_ancestor_of(a, c));
        assert!(!g.is_ancestor_of(c, a));
        assert_eq!(g.ancestors_of(&[c]).len(), 3);
        g.add_directed_edge(c, a).unwrap();
        assert!(g.exists_directed_cycle());
    }

    #[test]
    fn d_separation() {
        // A -> B <- C, B -> D
        let mut g = Graph::with_nodes(["A", "B", "C", "D"]).unwrap();
        g.add_directed_edge(0, 1).unwrap();
        g.add_directed_edge(2, 1).unwrap();
        g.add_directed_edge(1, 3).unwrap();
        assert!(g.is_d_separated_from(0, 2, &[]));
        assert!(!g.is_d_separated_from(0, 2, &[1]));
        assert!(!g.is_d_separated_from(0, 2, &[3]));
        assert!(!g.is_d_separated_from(0, 3, &[]));
        assert!(g.is_d_separated_from(0, 3, &[1]));
    }

    #[test]
    fn m_separation_with_bidirected_edges() {
        // A -> B <-> C <- D
        let mut g = Graph::with_nodes(["A", "B", "C", "D"]).unwrap();
        g.add_directed_edge(0, 1).unwrap();
        g.add_bidirected_edge(1, 2).unwrap();
        g.add_directed_edge(3, 2).unwrap();
        assert!(g.is_d_separated_from(0, 3, &[]));
        assert!(g.is_d_separated_from(0, 3, &[1]));
        assert!(!g.is_d_separated_from(0, 3, &[1, 2]));
        assert!(g.is_d_separated_from(0, 2, &[]));
        assert!(!g.is_d_separated_from(0, 2, &[1]));
    }

    #[test]
    fn equality_by_name() {
        let mut g1 = Graph::with_nodes(["X", "Y", "Z"]).unwrap();
        g1.add_directed_edge(0, 1).unwrap();
        g1.add_bidirected_edge(1, 2).unwrap();

        let mut g2 = Graph::with_nodes(["Z", "Y", "X"]).unwrap();
        g2.add_bidirected_edge(0, 1).unwrap();
        g2.add_directed_edge(2, 1).unwrap();
        assert_eq!(g1, g2);

        g2.set_endpoint(1, 0, Endpoint::Circle).unwrap();
        assert_ne!(g1, g2);
    }

    #[test]
    fn replace_nodes_by_name() {
        let reference = Graph::with_nodes(["A", "B", "C"]).unwrap();
        let mut g = Graph::with_nodes(["C", "A"]).unwrap();
        g.add_directed_edge(0, 1).unwrap();
        g.add_underline_triple(0, 1, 0);

        let h = g.replace_nodes(&reference).unwrap();
        assert_eq!(h.num_nodes(), 3);
        assert!(h.is_parent_of(2, 0));
        assert!(h.is_underline_triple(2, 0, 2));

        let other = Graph::with_nodes(["A"]).unwrap();
        assert_eq!(
            g.replace_nodes(&other),
            Err(GraphError::UnknownName("C".into()))
        );
    }
}
