//! Majority-vote prediction smoothing
//!
//! Keeps the last N sign labels (no-hand frames are skipped) and reports the
//! most frequent one together with its share of the window.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use super::sample::{Label, PredictionSample};

/// Default number of labels kept for voting
pub const DEFAULT_WINDOW: usize = 3;

/// Majority label over the current window
#[derive(Clone, Debug, PartialEq)]
pub struct StableResult {
    pub label: Label,
    /// count(label) / window length, 0.0 for an empty window
    pub vote_share: f32,
}

impl StableResult {
    pub fn empty() -> Self {
        StableResult {
            label: Label::NoHand,
            vote_share: 0.0,
        }
    }
}

/// Fixed-capacity FIFO of recent sign labels
#[derive(Clone, Debug)]
pub struct PredictionSmoother {
    window: VecDeque<String>,
    capacity: usize,
}

impl PredictionSmoother {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        PredictionSmoother {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Feed one sample and return the smoothed result.
    pub fn push(&mut self, sample: &PredictionSample) -> StableResult {
        if let Label::Sign(sign) = &sample.label {
            self.window.push_back(sign.clone());
            if self.window.len() > self.capacity {
                self.window.pop_front();
            }
        }
        self.stable()
    }

    /// Majority vote over the window.
    ///
    /// Ties go to the tied label that appears earliest in the window.
    pub fn stable(&self) -> StableResult {
        let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
        let mut first_seen: Vec<&str> = Vec::with_capacity(self.window.len());

        for label in &self.window {
            let count = counts.entry(label.as_str()).or_insert(0);
            if *count == 0 {
                first_seen.push(label.as_str());
            }
            *count += 1;
        }

        let mut best: Option<&str> = None;
        let mut best_count = 0;
        for label in first_seen {
            let count = counts.get(label).copied().unwrap_or(0);
            if count > best_count {
                best_count = count;
                best = Some(label);
            }
        }

        match best {
            Some(label) => StableResult {
                label: Label::Sign(label.to_string()),
                vote_share: best_count as f32 / self.window.len() as f32,
            },
            None => StableResult::empty(),
        }
    }

    /// Labels oldest to newest
    pub fn window(&self) -> Vec<&str> {
        self.window.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for PredictionSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
