//! Confusion tracking: which signs get mistaken for which
//!
//! Detects:
//! - Targets repeatedly answered with the same wrong sign (3+ times)
//! - The most common confusion per target
//! - Targets missed with no recognizable sign at all

use rustc_hash::FxHashMap;

use super::state::Mistake;

/// Minimum occurrences to flag a confusion as persistent
const ERROR_THRESHOLD: u32 = 3;

/// Placeholder for a miss where no sign was ever detected
const NOTHING_DETECTED: &str = "-";

/// Aggregates misses across sessions
#[derive(Clone, Debug, Default)]
pub struct ConfusionTracker {
    /// target → (detected → count)
    pairs: FxHashMap<String, FxHashMap<String, u32>>,
    total_misses: u32,
}

impl ConfusionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one miss
    pub fn record(&mut self, target: &str, detected: Option<&str>) {
        let detected = detected.unwrap_or(NOTHING_DETECTED);
        *self
            .pairs
            .entry(target.to_uppercase())
            .or_default()
            .entry(detected.to_uppercase())
            .or_insert(0) += 1;
        self.total_misses += 1;
    }

    pub fn record_mistakes(&mut self, mistakes: &[Mistake]) {
        for mistake in mistakes {
            self.record(&mistake.target, mistake.detected.as_deref());
        }
    }

    /// Most frequent (target, detected) pairs, highest first
    pub fn top_confusions(&self, count: usize) -> Vec<((String, String), u32)> {
        let mut pairs: Vec<_> = self
            .pairs
            .iter()
            .flat_map(|(target, detected)| {
                detected
                    .iter()
                    .map(move |(got, &n)| ((target.clone(), got.clone()), n))
            })
            .collect();

        // ties by name so the listing is stable
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pairs.truncate(count);
        pairs
    }

    pub fn is_persistent(&self, target: &str, detected: &str) -> bool {
        self.pairs
            .get(&target.to_uppercase())
            .and_then(|map| map.get(&detected.to_uppercase()))
            .map_or(false, |&count| count >= ERROR_THRESHOLD)
    }

    /// Targets with at least one persistent confusion, sorted
    pub fn problematic_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self
            .pairs
            .iter()
            .filter(|(_, map)| map.values().any(|&count| count >= ERROR_THRESHOLD))
            .map(|(target, _)| target.as_str())
            .collect();
        targets.sort_unstable();
        targets
    }

    pub fn primary_confusion(&self, target: &str) -> Option<(&str, u32)> {
        self.pairs.get(&target.to_uppercase()).and_then(|map| {
            map.iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(got, &count)| (got.as_str(), count))
        })
    }

    pub fn total_misses(&self) -> u32 {
        self.total_misses
    }

    pub fn reset(&mut self) {
        self.pairs.clear();
        self.total_misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_after_threshold() {
        let mut tracker = ConfusionTracker::new();
        tracker.record("M", Some("N"));
        tracker.record("m", Some("n"));
        assert!(!tracker.is_persistent("M", "N"));

        tracker.record("M", Some("N"));
        assert!(tracker.is_persistent("M", "N"));
        assert_eq!(tracker.problematic_targets(), vec!["M"]);
    }

    #[test]
    fn test_top_confusions_ordered() {
        let mut tracker = ConfusionTracker::new();
        tracker.record("A", Some("S"));
        tracker.record("A", Some("S"));
        tracker.record("E", None);

        let top = tracker.top_confusions(5);
        assert_eq!(top[0], (("A".to_string(), "S".to_string()), 2));
        assert_eq!(top[1], (("E".to_string(), "-".to_string()), 1));
        assert_eq!(tracker.primary_confusion("a"), Some(("S", 2)));
        assert_eq!(tracker.total_misses(), 3);
    }

    #[test]
    fn test_record_mistakes_and_reset() {
        let mut tracker = ConfusionTracker::new();
        let mistakes = vec![Mistake {
            target: "7".into(),
            detected: Some("1".into()),
            snapshot: None,
        }];
        tracker.record_mistakes(&mistakes);
        assert_eq!(tracker.primary_confusion("7"), Some(("1", 1)));

        tracker.reset();
        assert_eq!(tracker.total_misses(), 0);
        assert!(tracker.top_confusions(3).is_empty());
    }
}
