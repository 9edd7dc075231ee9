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

//! Enumeration of conditioning sets.
//!
//! Both generators hand out borrowed index tuples, so callers map them onto
//! their own node lists with [`select`].

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Running,
    Done,
}

/// All strictly increasing `k`-tuples over `0..n`, in lexicographic order.
///
/// `k = 0` yields the empty tuple once; `k > n` yields nothing.
#[derive(Debug, Clone)]
pub struct ChoiceGenerator {
    n: usize,
    k: usize,
    choice: Vec<usize>,
    state: State,
}

impl ChoiceGenerator {
    pub fn new(n: usize, k: usize) -> ChoiceGenerator {
        ChoiceGenerator {
            n,
            k,
            choice: Vec::with_capacity(k),
            state: State::Fresh,
        }
    }

    /// Start again from the first tuple.
    pub fn reset(&mut self) {
        self.choice.clear();
        self.state = State::Fresh;
    }

    /// The next tuple, or `None` once every tuple has been produced.
    pub fn next_choice(&mut self) -> Option<&[usize]> {
        if self.advance() {
            Some(&self.choice)
        } else {
            None
        }
    }

    fn advance(&mut self) -> bool {
        match self.state {
            State::Done => false,
            State::Fresh => {
                if self.k > self.n {
                    self.state = State::Done;
                    return false;
                }
                self.choice.clear();
                self.choice.extend(0..self.k);
                self.state = State::Running;
                true
            }
            State::Running => {
                let (n, k) = (self.n, self.k);
                let mut i = k;
                while i > 0 {
                    i -= 1;
                    if self.choice[i] < n - k + i {
                        self.choice[i] += 1;
                        for j in i + 1..k {
                            self.choice[j] = self.choice[j - 1] + 1;
                        }
                        return true;
                    }
                }
                self.state = State::Done;
                false
            }
        }
    }
}

impl Iterator for ChoiceGenerator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        self.next_choice().map(|c| c.to_vec())
    }
}

/// All subsets of `0..n` of size `0..=depth`, smallest first.
///
/// A depth of `None` (or one larger than `n`) means every subset.
#[derive(Debug, Clone)]
pub struct DepthChoiceGenerator {
    n: usize,
    max: usize,
    k: usize,
    inner: ChoiceGenerator,
}

impl DepthChoiceGenerator {
    pub fn new(n: usize, depth: Option<usize>) -> DepthChoiceGenerator {
        let max = depth.map_or(n, |d| d.min(n));
        DepthChoiceGenerator {
            n,
            max,
            k: 0,
            inner: ChoiceGenerator::new(n, 0),
        }
    }

    pub fn reset(&mut self) {
        self.k = 0;
        self.inner = ChoiceGenerator::new(self.n, 0);
    }

    pub fn next_choice(&mut self) -> Option<&[usize]> {
        loop {
            if self.k > self.max {
                return None;
            }
            if self.inner.advance() {
                return Some(&self.inner.choice);
            }
            self.k += 1;
            self.inner = ChoiceGenerator::new(self.n, self.k);
        }
    }
}

impl Iterator for DepthChoiceGenerator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        self.next_choice().map(|c| c.to_vec())
    }
}

/// Convert a depth given as a signed number, where any negative value means
/// "unlimited", to the `Option` form used throughout the crate.
pub fn depth_from_sentinel(depth: i64) -> Option<usize> {
    usize::try_from(depth).ok()
}

/// Binomial coefficient C(n, k), zero when `k > n`.
pub fn choose(n: usize, k: usize) -> usize {
    if k > n {
        0
    } else {
        num::integer::binomial(n, k)
    }
}

/// Pick out `items[i]` for every index `i` in `choice`.
pub fn select<T: Copy>(choice: &[usize], items: &[T]) -> Vec<T> {
    choice.iter().map(|&i| items[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rustc_hash::FxHashSet;

    #[rstest]
    #[case(0, 0)]
    #[case(3, 0)]
    #[case(4, 2)]
    #[case(5, 5)]
    #[case(7, 3)]
    #[case(2, 3)]
    fn choice_count(#[case] n: usize, #[case] k: usize) {
        let mut cg = ChoiceGenerator::new(n, k);
        let mut seen = FxHashSet::default();
        while let Some(c) = cg.next_choice() {
            assert_eq!(c.len(), k);
            assert!(c.windows(2).all(|w| w[0] < w[1]));
            assert!(c.iter().all(|&i| i < n));
            assert!(seen.insert(c.to_vec()));
        }
        assert_eq!(seen.len(), choose(n, k));
        // stays exhausted
        assert!(cg.next_choice().is_none());
    }

    #[test]
    fn lexicographic_order() {
        let all: Vec<_> = ChoiceGenerator::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
    }

    #[test]
    fn reset_restarts() {
        let mut cg = ChoiceGenerator::new(3, 1);
        assert_eq!(cg.by_ref().count(), 3);
        cg.reset();
        assert_eq!(cg.next_choice(), Some(&[0][..]));
    }

    #[rstest]
    #[case(5, Some(2), 1 + 5 + 10)]
    #[case(4, None, 16)]
    #[case(3, Some(7), 8)]
    #[case(0, None, 1)]
    fn depth_count(#[case] n: usize, #[case] depth: Option<usize>, #[case] expected: usize) {
        let subsets: Vec<_> = DepthChoiceGenerator::new(n, depth).collect();
        assert_eq!(subsets.len(), expected);
        assert!(subsets.windows(2).all(|w| w[0].len() <= w[1].len()));
    }

    #[test]
    fn sentinel() {
        assert_eq!(depth_from_sentinel(-1), None);
        assert_eq!(depth_from_sentinel(0), Some(0));
        assert_eq!(depth_from_sentinel(3), Some(3));
    }

    #[test]
    fn select_items() {
        let items = ['a', 'b', 'c', 'd'];
        assert_eq!(select(&[1, 3], &items), vec!['b', 'd']);
        assert!(select::<char>(&[], &items).is_empty());
    }
}
