//! Spatial candidate-pair detection for swarm neighborhood queries.
//!
//! The index trades exactness for cost: instead of testing all `O(n²)`
//! agent pairs, it keeps two sorted orderings of the population (one per
//! axis) and slides overlapping fixed-size windows along both. A pair is
//! surfaced only when both members co-occur inside an x-window and a
//! y-window simultaneously. Geometric near-misses that straddle window
//! boundaries can be dropped, and a pair may be surfaced for more than one
//! window combination; consumers must treat the output as candidates, not
//! as verified neighbors, and must tolerate repeats.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by proximity index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., a window too small to pair).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by candidate-pair indices.
pub trait ProximityIndex {
    /// Rebuild internal orderings from agent positions. Indices handed to
    /// the visitor refer to positions in this slice.
    fn rebuild(&mut self, positions: &[(f64, f64)]);

    /// Visit every candidate pair surfaced by the current orderings.
    /// Pairs are unordered and may be visited more than once.
    fn for_each_candidate_pair(&self, visitor: &mut dyn FnMut(usize, usize));
}

/// Sorted-axis sweep index with overlapping windows.
///
/// `rebuild` sorts the population once per axis (`O(n log n)`); the pair
/// walk then costs `O((n/W)² · W²)` window intersections, sub-quadratic for
/// large populations at the configured window size `W`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepWindowIndex {
    /// Number of consecutive sorted entries considered one bucket.
    window: usize,
    #[serde(skip)]
    by_x: Vec<usize>,
    #[serde(skip)]
    by_y: Vec<usize>,
    #[serde(skip)]
    agent_count: usize,
}

/// Default sweep window size.
pub const DEFAULT_WINDOW: usize = 5;

impl SweepWindowIndex {
    /// Create an index with the provided window size. Windows advance with
    /// stride `window - 1` so consecutive windows share one entry; a window
    /// smaller than two can never hold a pair and is rejected.
    pub fn new(window: usize) -> Result<Self, IndexError> {
        if window < 2 {
            return Err(IndexError::InvalidConfig("window must hold at least two entries"));
        }
        Ok(Self {
            window,
            by_x: Vec::new(),
            by_y: Vec::new(),
            agent_count: 0,
        })
    }

    /// Configured window size.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Number of positions captured by the last `rebuild`.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.agent_count
    }

    /// Returns true when the last `rebuild` saw no positions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.agent_count == 0
    }

    /// Lazy walk over candidate pairs for the current orderings.
    #[must_use]
    pub fn candidate_pairs(&self) -> CandidatePairs<'_> {
        CandidatePairs::new(self)
    }

    fn sort_axis(order: &mut Vec<usize>, positions: &[(f64, f64)], key: fn(&(f64, f64)) -> f64) {
        order.clear();
        order.extend(0..positions.len());
        // Tie-break on the dense index so equal coordinates sort identically
        // across runs.
        order.sort_unstable_by_key(|&idx| (OrderedFloat(key(&positions[idx])), idx));
    }
}

impl Default for SweepWindowIndex {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            by_x: Vec::new(),
            by_y: Vec::new(),
            agent_count: 0,
        }
    }
}

impl ProximityIndex for SweepWindowIndex {
    fn rebuild(&mut self, positions: &[(f64, f64)]) {
        self.agent_count = positions.len();
        Self::sort_axis(&mut self.by_x, positions, |p| p.0);
        Self::sort_axis(&mut self.by_y, positions, |p| p.1);
    }

    fn for_each_candidate_pair(&self, visitor: &mut dyn FnMut(usize, usize)) {
        for (a, b) in self.candidate_pairs() {
            visitor(a, b);
        }
    }
}

/// Lazy, finite, non-restartable sequence of unordered candidate pairs.
///
/// Iteration walks x-windows in the outer loop and y-windows in the inner
/// loop, emitting every unordered pair inside each window intersection of
/// two or more members.
pub struct CandidatePairs<'a> {
    by_x: &'a [usize],
    by_y: &'a [usize],
    window: usize,
    stride: usize,
    x_start: usize,
    y_start: usize,
    x_member: Vec<bool>,
    shared: Vec<usize>,
    first: usize,
    second: usize,
    exhausted: bool,
}

impl<'a> CandidatePairs<'a> {
    fn new(index: &'a SweepWindowIndex) -> Self {
        let count = index.agent_count;
        let mut pairs = Self {
            by_x: &index.by_x,
            by_y: &index.by_y,
            window: index.window,
            // A degenerate window (possible after deserialization) still
            // needs a positive stride to terminate; it yields no pairs.
            stride: index.window.saturating_sub(1).max(1),
            x_start: 0,
            y_start: 0,
            x_member: vec![false; count],
            shared: Vec::with_capacity(index.window),
            first: 0,
            second: 1,
            exhausted: count < 2,
        };
        if !pairs.exhausted {
            pairs.load_x_window();
            pairs.load_intersection();
        }
        pairs
    }

    fn load_x_window(&mut self) {
        self.x_member.fill(false);
        let end = (self.x_start + self.window).min(self.by_x.len());
        for &idx in &self.by_x[self.x_start..end] {
            self.x_member[idx] = true;
        }
    }

    fn load_intersection(&mut self) {
        self.shared.clear();
        let end = (self.y_start + self.window).min(self.by_y.len());
        for &idx in &self.by_y[self.y_start..end] {
            if self.x_member[idx] {
                self.shared.push(idx);
            }
        }
        self.first = 0;
        self.second = 1;
    }

    fn advance_windows(&mut self) {
        self.y_start += self.stride;
        if self.y_start >= self.by_y.len() {
            self.y_start = 0;
            self.x_start += self.stride;
            if self.x_start >= self.by_x.len() {
                self.exhausted = true;
                return;
            }
            self.load_x_window();
        }
        self.load_intersection();
    }
}

impl Iterator for CandidatePairs<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        loop {
            if self.exhausted {
                return None;
            }
            if self.second < self.shared.len() {
                let pair = (self.shared[self.first], self.shared[self.second]);
                self.second += 1;
                if self.second >= self.shared.len() {
                    self.first += 1;
                    self.second = self.first + 1;
                }
                return Some(pair);
            }
            self.advance_windows();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_WINDOW, ProximityIndex, SweepWindowIndex};
    use std::collections::HashMap;

    fn pair_counts(index: &SweepWindowIndex) -> HashMap<(usize, usize), usize> {
        let mut counts = HashMap::new();
        for (a, b) in index.candidate_pairs() {
            let key = if a < b { (a, b) } else { (b, a) };
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn window_must_hold_a_pair() {
        assert!(SweepWindowIndex::new(1).is_err());
        assert!(SweepWindowIndex::new(2).is_ok());
        assert_eq!(SweepWindowIndex::default().window(), DEFAULT_WINDOW);
    }

    #[test]
    fn empty_and_singleton_populations_yield_no_pairs() {
        let mut index = SweepWindowIndex::new(5).expect("index");
        index.rebuild(&[]);
        assert!(index.candidate_pairs().next().is_none());
        index.rebuild(&[(1.0, 2.0)]);
        assert!(index.candidate_pairs().next().is_none());
    }

    #[test]
    fn colocated_agents_are_paired() {
        let mut index = SweepWindowIndex::new(5).expect("index");
        index.rebuild(&[(3.0, 3.0), (3.0, 3.0)]);
        let counts = pair_counts(&index);
        assert!(counts.contains_key(&(0, 1)));
    }

    #[test]
    fn never_emits_self_pairs_and_stays_in_range() {
        let positions: Vec<(f64, f64)> = (0..23)
            .map(|i| {
                let f = f64::from(i);
                (f * 7.3 % 11.0, f * 3.1 % 13.0)
            })
            .collect();
        let mut index = SweepWindowIndex::new(5).expect("index");
        index.rebuild(&positions);
        for (a, b) in index.candidate_pairs() {
            assert_ne!(a, b);
            assert!(a < positions.len());
            assert!(b < positions.len());
        }
    }

    #[test]
    fn small_population_in_one_window_pairs_exhaustively() {
        // Four agents all fit a single window on both axes, so every
        // unordered pair must surface regardless of geometry.
        let positions = [(0.0, 9.0), (5.0, 2.0), (1.0, 4.0), (8.0, 0.5)];
        let mut index = SweepWindowIndex::new(5).expect("index");
        index.rebuild(&positions);
        let counts = pair_counts(&index);
        assert_eq!(counts.len(), 6);
    }

    #[test]
    fn pairs_require_co_occurrence_on_both_axes() {
        // Agents 0 and 1 are adjacent in x-rank but sit at opposite ends of
        // the y ordering; with window 2 they never share a y-window and so
        // must not pair.
        let positions = [
            (0.0, 0.0),
            (0.1, 10.0),
            (10.0, 1.0),
            (11.0, 2.0),
            (12.0, 3.0),
            (13.0, 4.0),
        ];
        let mut index = SweepWindowIndex::new(2).expect("index");
        index.rebuild(&positions);
        assert!(!pair_counts(&index).contains_key(&(0, 1)));
    }

    #[test]
    fn boundary_neighbors_can_be_missed() {
        // Documented approximation: two geometric neighbors whose sorted
        // ranks fall in different windows are never surfaced. With window 2
        // (stride 1) every consecutive rank pair shares a window, so use
        // window ranks that differ by two.
        let positions = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)];
        let mut index = SweepWindowIndex::new(2).expect("index");
        index.rebuild(&positions);
        let counts = pair_counts(&index);
        assert!(counts.contains_key(&(0, 1)));
        assert!(counts.contains_key(&(1, 2)));
        assert!(!counts.contains_key(&(0, 2)));
    }

    #[test]
    fn visitor_matches_iterator() {
        let positions = [(0.0, 0.0), (0.5, 0.5), (1.0, 1.0), (9.0, 9.0)];
        let mut index = SweepWindowIndex::new(4).expect("index");
        index.rebuild(&positions);
        let mut visited = Vec::new();
        index.for_each_candidate_pair(&mut |a, b| visited.push((a, b)));
        let iterated: Vec<_> = index.candidate_pairs().collect();
        assert_eq!(visited, iterated);
    }
}
