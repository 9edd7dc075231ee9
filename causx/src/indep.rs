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

//! Conditional-independence oracles.
//!
//! A search only ever talks to an oracle through [`IndependenceTest`].
//! Variables are identified by their position in
//! [`IndependenceTest::variables`], which is also the node index of the
//! corresponding node in every graph the search builds.

use crate::graph::{GraphLike, NodeType, V};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndependenceResult {
    pub independent: bool,
    pub p_value: f64,
}

impl IndependenceResult {
    pub fn independent() -> Self {
        IndependenceResult {
            independent: true,
            p_value: 1.0,
        }
    }

    pub fn dependent() -> Self {
        IndependenceResult {
            independent: false,
            p_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestError {
    /// The oracle could not reach a verdict, e.g. a singular covariance matrix.
    #[error("independence of {x} and {y} could not be determined: {reason}")]
    Undetermined { x: usize, y: usize, reason: String },
    #[error("variable index {0} is out of range for this test")]
    UnknownVariable(usize),
}

pub trait IndependenceTest: Sync {
    /// Names of the variables, in index order.
    fn variables(&self) -> &[String];

    /// Decide whether `x` and `y` are independent given `z`.
    fn check_independence(&self, x: usize, y: usize, z: &[usize]) -> Result<IndependenceResult, TestError>;

    fn is_independent(&self, x: usize, y: usize, z: &[usize]) -> Result<bool, TestError> {
        Ok(self.check_independence(x, y, z)?.independent)
    }

    fn num_variables(&self) -> usize {
        self.variables().len()
    }
}

impl<T: IndependenceTest + ?Sized> IndependenceTest for &T {
    fn variables(&self) -> &[String] {
        (**self).variables()
    }

    fn check_independence(&self, x: usize, y: usize, z: &[usize]) -> Result<IndependenceResult, TestError> {
        (**self).check_independence(x, y, z)
    }
}

/// Answers independence questions by m-separation in a known graph.
///
/// Only measured nodes are exposed as variables; latent nodes still take part
/// in the separation check.
#[derive(Debug, Clone)]
pub struct DSeparationTest<G: GraphLike> {
    graph: G,
    variables: Vec<String>,
    nodes: Vec<V>,
}

impl<G: GraphLike> DSeparationTest<G> {
    pub fn new(graph: G) -> Self {
        let nodes: Vec<V> = graph
            .nodes()
            .filter(|&v| graph.node_type(v) == NodeType::Measured)
            .collect();
        let variables = nodes.iter().map(|&v| graph.name(v).to_string()).collect();
        DSeparationTest {
            graph,
            variables,
            nodes,
        }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    fn node(&self, i: usize) -> Result<V, TestError> {
        self.nodes.get(i).copied().ok_or(TestError::UnknownVariable(i))
    }
}

impl<G: GraphLike> IndependenceTest for DSeparationTest<G> {
    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn check_independence(&self, x: usize, y: usize, z: &[usize]) -> Result<IndependenceResult, TestError> {
        let (gx, gy) = (self.node(x)?, self.node(y)?);
        let gz = z.iter().map(|&i| self.node(i)).collect::<Result<Vec<_>, _>>()?;
        if self.graph.is_d_separated_from(gx, gy, &gz) {
            Ok(IndependenceResult::independent())
        } else {
            Ok(IndependenceResult::dependent())
        }
    }
}

type CacheKey = (usize, usize, Vec<usize>);

/// Memoizes the verdicts of another test.
///
/// Queries are normalized, so `x _||_ y | z` and `y _||_ x | z'` share an
/// entry whenever `z'` is a permutation of `z`. Failed tests are not cached.
#[derive(Debug)]
pub struct CachingTest<T: IndependenceTest> {
    inner: T,
    cache: Mutex<FxHashMap<CacheKey, IndependenceResult>>,
    hits: AtomicUsize,
}

impl<T: IndependenceTest> CachingTest<T> {
    pub fn new(inner: T) -> Self {
        CachingTest {
            inner,
            cache: Mutex::new(FxHashMap::default()),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Number of distinct queries answered so far.
    pub fn len(&self) -> usize {
        self.cache.lock().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of queries answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    fn key(x: usize, y: usize, z: &[usize]) -> CacheKey {
        let mut zs = z.to_vec();
        zs.sort_unstable();
        (x.min(y), x.max(y), zs)
    }
}

impl<T: IndependenceTest> IndependenceTest for CachingTest<T> {
    fn variables(&self) -> &[String] {
        self.inner.variables()
    }

    fn check_independence(&self, x: usize, y: usize, z: &[usize]) -> Result<IndependenceResult, TestError> {
        let key = Self::key(x, y, z);
        if let Ok(cache) = self.cache.lock() {
            if let Some(r) = cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(*r);
            }
        }
        // the lock is not held while the inner test runs
        let r = self.inner.check_independence(x, y, z)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, r);
        }
        Ok(r)
    }
}
