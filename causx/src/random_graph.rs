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

use crate::graph::{GraphError, GraphLike, NodeData};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Builds random DAGs.
///
/// Nodes are placed in a fixed causal order and `edges` distinct forward
/// pairs are drawn uniformly, so the result is always acyclic. Measured nodes
/// are named `X1, X2, ...` and latent ones `L1, L2, ...`.
pub struct RandomDagBuilder {
    rng: StdRng,
    nodes: usize,
    edges: usize,
    latents: usize,
}

impl Default for RandomDagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomDagBuilder {
    pub fn new() -> RandomDagBuilder {
        RandomDagBuilder {
            rng: StdRng::from_os_rng(),
            nodes: 5,
            edges: 5,
            latents: 0,
        }
    }

    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn nodes(&mut self, nodes: usize) -> &mut Self {
        self.nodes = nodes;
        self
    }

    /// Number of edges, capped at the number of node pairs.
    pub fn edges(&mut self, edges: usize) -> &mut Self {
        self.edges = edges;
        self
    }

    /// How many of the nodes are latent, capped at the number of nodes.
    pub fn latents(&mut self, latents: usize) -> &mut Self {
        self.latents = latents;
        self
    }

    pub fn build<G: GraphLike>(&mut self) -> Result<G, GraphError> {
        let n = self.nodes;
        let mut is_latent = vec![false; n];
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng);
        for &i in order.iter().take(self.latents.min(n)) {
            is_latent[i] = true;
        }

        let mut g = G::new();
        let (mut nx, mut nl) = (0, 0);
        let mut vs = Vec::with_capacity(n);
        for latent in is_latent {
            let d = if latent {
                nl += 1;
                NodeData::latent(format!("L{nl}"))
            } else {
                nx += 1;
                NodeData::new(format!("X{nx}"))
            };
            vs.push(g.add_node_with_data(d)?);
        }

        let mut pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect();
        pairs.shuffle(&mut self.rng);
        pairs.truncate(self.edges);
        pairs.sort_unstable();
        for (i, j) in pairs {
            g.add_directed_edge(vs[i], vs[j])?;
        }
        log::debug!("random dag: {} nodes, {} edges", g.num_nodes(), g.num_edges());
        Ok(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;
    use crate::vec_graph::Graph;
    use rstest::rstest;

    #[rstest]
    #[case(5, 0)]
    #[case(10, 12)]
    #[case(4, 100)]
    fn acyclic_with_requested_edges(#[case] nodes: usize, #[case] edges: usize) {
        let g: Graph = RandomDagBuilder::new().seed(7).nodes(nodes).edges(edges).build().unwrap();
        assert_eq!(g.num_nodes(), nodes);
        assert_eq!(g.num_edges(), edges.min(nodes * (nodes - 1) / 2));
        assert!(!g.exists_directed_cycle());
        assert!(g.edges().all(|e| e.is_directed()));
    }

    #[test]
    fn seeded_builds_agree() {
        let g1: Graph = RandomDagBuilder::new().seed(1337).nodes(8).edges(10).build().unwrap();
        let g2: Graph = RandomDagBuilder::new().seed(1337).nodes(8).edges(10).build().unwrap();
        assert_eq!(g1, g2);
    }

    #[test]
    fn latent_nodes() {
        let g: Graph = RandomDagBuilder::new().seed(3).nodes(6).edges(8).latents(2).build().unwrap();
        let latents: Vec<_> = g.nodes().filter(|&v| g.node_type(v) == NodeType::Latent).collect();
        assert_eq!(latents.len(), 2);
        assert!(g.node_by_name("L1").is_some() && g.node_by_name("L2").is_some());
        assert!(g.node_by_name("X4").is_some() && g.node_by_name("X5").is_none());
    }
}
