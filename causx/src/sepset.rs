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

use crate::choose::{select, ChoiceGenerator};
use crate::graph::{GraphLike, V};
use crate::indep::{IndependenceTest, TestError};
use rustc_hash::FxHashMap;

/// Separating sets recorded by an adjacency search.
///
/// Keys are unordered pairs. A pair with no entry is "unknown", which is
/// different from a pair separated by the empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SepsetMap {
    map: FxHashMap<(V, V), Vec<V>>,
}

impl SepsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(x: V, y: V) -> (V, V) {
        if x <= y {
            (x, y)
        } else {
            (y, x)
        }
    }

    pub fn set(&mut self, x: V, y: V, mut sepset: Vec<V>) {
        sepset.sort_unstable();
        self.map.insert(SepsetMap::key(x, y), sepset);
    }

    pub fn get(&self, x: V, y: V) -> Option<&[V]> {
        self.map.get(&SepsetMap::key(x, y)).map(|s| s.as_slice())
    }

    pub fn remove(&mut self, x: V, y: V) -> Option<Vec<V>> {
        self.map.remove(&SepsetMap::key(x, y))
    }

    pub fn contains(&self, x: V, y: V) -> bool {
        self.map.contains_key(&SepsetMap::key(x, y))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All entries as `(x, y, sepset)` with `x < y`, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (V, V, &[V])> {
        self.map.iter().map(|(&(x, y), s)| (x, y, s.as_slice()))
    }

    /// Take over every entry of `other`, overwriting on clashes.
    pub fn extend(&mut self, other: SepsetMap) {
        self.map.extend(other.map);
    }
}

/// Something that can name a separating set for a pair of nodes.
pub trait SepsetProducer {
    /// A set separating `x` and `y`, or `None` when none is known.
    fn sepset(&self, x: V, y: V) -> Option<Vec<V>>;

    fn is_independent(&self, x: V, y: V, z: &[V]) -> Result<bool, TestError>;

    /// `None` when no sepset for `(x, z)` is known.
    fn is_collider(&self, x: V, y: V, z: V) -> Option<bool> {
        self.sepset(x, z).map(|s| !s.contains(&y))
    }

    /// `None` when no sepset for `(x, z)` is known.
    fn is_noncollider(&self, x: V, y: V, z: V) -> Option<bool> {
        self.sepset(x, z).map(|s| s.contains(&y))
    }
}

/// Sepsets looked up in a map, with a test for fresh queries.
pub struct MapSepsets<'a, T: IndependenceTest> {
    sepsets: &'a SepsetMap,
    test: &'a T,
}

impl<'a, T: IndependenceTest> MapSepsets<'a, T> {
    pub fn new(sepsets: &'a SepsetMap, test: &'a T) -> Self {
        MapSepsets { sepsets, test }
    }
}

impl<T: IndependenceTest> SepsetProducer for MapSepsets<'_, T> {
    fn sepset(&self, x: V, y: V) -> Option<Vec<V>> {
        self.sepsets.get(x, y).map(|s| s.to_vec())
    }

    fn is_independent(&self, x: V, y: V, z: &[V]) -> Result<bool, TestError> {
        self.test.is_independent(x, y, z)
    }
}

/// Picks, among the subsets of the neighbours of `x` and of `y`, the
/// separating set with the largest p-value.
///
/// Neighbourhoods are taken from a snapshot of the graph at construction.
pub struct SepsetsMaxP<'a, T: IndependenceTest> {
    adjacencies: FxHashMap<V, Vec<V>>,
    test: &'a T,
    depth: Option<usize>,
}

impl<'a, T: IndependenceTest> SepsetsMaxP<'a, T> {
    pub fn new(graph: &impl GraphLike, test: &'a T, depth: Option<usize>) -> Self {
        let adjacencies = graph.nodes().map(|v| (v, graph.neighbor_vec(v))).collect();
        SepsetsMaxP {
            adjacencies,
            test,
            depth,
        }
    }

    fn candidates(&self, x: V, y: V) -> Vec<V> {
        self.adjacencies
            .get(&x)
            .map(|adj| adj.iter().copied().filter(|&w| w != y).collect())
            .unwrap_or_default()
    }
}

impl<T: IndependenceTest> SepsetProducer for SepsetsMaxP<'_, T> {
    fn sepset(&self, x: V, y: V) -> Option<Vec<V>> {
        let mut best: Option<(f64, Vec<V>)> = None;
        for adj in [self.candidates(x, y), self.candidates(y, x)] {
            let max = self.depth.map_or(adj.len(), |d| d.min(adj.len()));
            for d in 0..=max {
                let mut cg = ChoiceGenerator::new(adj.len(), d);
                while let Some(choice) = cg.next_choice() {
                    let z = select(choice, &adj);
                    // a failed test is not evidence of independence
                    let Ok(r) = self.test.check_independence(x, y, &z) else {
                        continue;
                    };
                    if r.independent && best.as_ref().map_or(true, |(p, _)| r.p_value > *p) {
                        best = Some((r.p_value, z));
                    }
                }
            }
        }
        best.map(|(_, mut z)| {
            z.sort_unstable();
            z
        })
    }

    fn is_independent(&self, x: V, y: V, z: &[V]) -> Result<bool, TestError> {
        self.test.is_independent(x, y, z)
    }
}
