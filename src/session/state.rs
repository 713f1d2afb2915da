//! Match/progress state machine
//!
//! Maintains:
//! - The target sequence and each item's status
//! - The smoothing window for the active target
//! - Session statistics and recorded mistakes
//! - A generation counter identifying the current activation
//!
//! This is the only writer of window, items and stats. Callers feed it
//! events tagged with the generation they were issued under; anything
//! tagged with an older generation is dropped.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::accuracy::SpeedFeedback;
use super::config::SessionConfig;
use crate::recognition::{
    ConfidenceTier, ImageFrame, Label, PredictionSample, PredictionSmoother, StableResult,
    Thresholds,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Active,
    Correct,
    TimedOut,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionItem {
    pub target: String,
    pub status: ItemStatus,
}

/// A target the learner did not produce in time
#[derive(Clone, Debug, PartialEq)]
pub struct Mistake {
    pub target: String,
    /// Last stable sign seen while the target was active
    pub detected: Option<String>,
    /// Best-effort frame of the learner's last attempt
    pub snapshot: Option<ImageFrame>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionStats {
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub total_attempts: u32,
    /// Matches accepted in the low-confidence tier
    pub low_confidence_matches: u32,
    pub mistakes: Vec<Mistake>,
}

impl SessionStats {
    pub fn mistake_targets(&self) -> Vec<&str> {
        self.mistakes.iter().map(|m| m.target.as_str()).collect()
    }
}

/// Where the session is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active { index: usize },
    Correct { index: usize },
    TimedOut { index: usize },
    Complete,
}

/// A qualifying match
#[derive(Clone, Debug, PartialEq)]
pub struct MatchFeedback {
    pub target: String,
    pub elapsed: Duration,
    pub vote_share: f32,
    pub low_confidence: bool,
    pub speed: SpeedFeedback,
}

/// Result of applying one sample
#[derive(Clone, Debug, PartialEq)]
pub struct Ingest {
    pub stable: StableResult,
    pub matched: Option<MatchFeedback>,
}

/// A target that ran out of time
#[derive(Clone, Debug, PartialEq)]
pub struct Miss {
    pub target: String,
    pub mistake_index: usize,
}

/// Step after a resolution
#[derive(Clone, Debug, PartialEq)]
pub enum Advance {
    Next {
        index: usize,
        target: String,
        generation: u64,
    },
    Complete(SessionStats),
}

/// Complete state for one practice session
#[derive(Clone, Debug)]
pub struct PracticeSession {
    items: Vec<SessionItem>,
    phase: Phase,
    generation: u64,
    activated_at: Option<Instant>,
    smoother: PredictionSmoother,
    last_detected: Option<String>,
    stats: SessionStats,
    thresholds: Thresholds,
    accept_low_confidence: bool,
    lives: Option<u32>,
}

impl PracticeSession {
    pub fn new(targets: Vec<String>, config: &SessionConfig) -> Self {
        PracticeSession {
            items: Self::build_items(targets),
            phase: Phase::Idle,
            generation: 0,
            activated_at: None,
            smoother: PredictionSmoother::new(config.window_capacity),
            last_detected: None,
            stats: SessionStats::default(),
            thresholds: config.thresholds,
            accept_low_confidence: config.accept_low_confidence,
            lives: config.lives,
        }
    }

    fn build_items(targets: Vec<String>) -> Vec<SessionItem> {
        targets
            .into_iter()
            .map(|target| SessionItem {
                target,
                status: ItemStatus::Pending,
            })
            .collect()
    }

    /// Replace the target sequence. Takes effect on the next `start`.
    pub fn set_targets(&mut self, targets: Vec<String>) {
        self.items = Self::build_items(targets);
    }

    /// Reset everything and activate the first target.
    pub fn start(&mut self, now: Instant) -> Advance {
        self.stats = SessionStats::default();
        for item in &mut self.items {
            item.status = ItemStatus::Pending;
        }
        info!(targets = self.items.len(), "session started");
        self.activate(0, now)
    }

    /// Leave the session idle. Bumps the generation so that in-flight
    /// results are discarded on arrival.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.phase = Phase::Idle;
        self.activated_at = None;
        self.smoother.reset();
        self.last_detected = None;
        debug!(generation = self.generation, "session idle");
    }

    fn activate(&mut self, index: usize, now: Instant) -> Advance {
        self.generation += 1;
        self.smoother.reset();
        self.last_detected = None;

        let out_of_lives = self
            .lives
            .map_or(false, |lives| self.stats.incorrect_count >= lives);

        match self.items.get_mut(index) {
            Some(item) if !out_of_lives => {
                item.status = ItemStatus::Active;
                self.phase = Phase::Active { index };
                self.activated_at = Some(now);
                debug!(index, sign = %item.target, generation = self.generation, "target active");
                Advance::Next {
                    index,
                    target: item.target.clone(),
                    generation: self.generation,
                }
            }
            _ => {
                self.phase = Phase::Complete;
                self.activated_at = None;
                info!(
                    correct = self.stats.correct_count,
                    incorrect = self.stats.incorrect_count,
                    "session complete"
                );
                Advance::Complete(self.stats.clone())
            }
        }
    }

    /// Apply a sample issued under `generation`. Returns `None` when the
    /// sample is stale or the session is not waiting for a match.
    pub fn ingest(
        &mut self,
        generation: u64,
        sample: &PredictionSample,
        now: Instant,
    ) -> Option<Ingest> {
        let index = match self.phase {
            Phase::Active { index } if generation == self.generation => index,
            phase => {
                debug!(
                    generation,
                    current = self.generation,
                    ?phase,
                    "discarding sample for inactive target"
                );
                return None;
            }
        };

        let stable = self.smoother.push(sample);
        if let Label::Sign(sign) = &stable.label {
            self.last_detected = Some(sign.clone());
        }

        let target = self.items[index].target.clone();
        let tier = ConfidenceTier::classify(stable.vote_share, &self.thresholds);
        let accepted = stable.label.matches(&target)
            && match tier {
                ConfidenceTier::High => true,
                ConfidenceTier::Low => self.accept_low_confidence,
                ConfidenceTier::Rejected => false,
            };

        if !accepted {
            return Some(Ingest {
                stable,
                matched: None,
            });
        }

        let elapsed = self
            .activated_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        let low_confidence = tier == ConfidenceTier::Low;

        self.items[index].status = ItemStatus::Correct;
        self.phase = Phase::Correct { index };
        self.stats.correct_count += 1;
        self.stats.total_attempts += 1;
        if low_confidence {
            self.stats.low_confidence_matches += 1;
        }
        info!(sign = %target, share = stable.vote_share, low_confidence, "sign matched");

        let matched = MatchFeedback {
            target,
            elapsed,
            vote_share: stable.vote_share,
            low_confidence,
            speed: SpeedFeedback::from_elapsed(elapsed),
        };
        Some(Ingest {
            stable,
            matched: Some(matched),
        })
    }

    /// Deadline reached for the target activated under `generation`.
    pub fn expire(&mut self, generation: u64) -> Option<Miss> {
        let index = match self.phase {
            Phase::Active { index } if generation == self.generation => index,
            phase => {
                debug!(generation, ?phase, "ignoring expiry for resolved target");
                return None;
            }
        };

        let target = self.items[index].target.clone();
        self.items[index].status = ItemStatus::TimedOut;
        self.phase = Phase::TimedOut { index };
        self.stats.incorrect_count += 1;
        self.stats.total_attempts += 1;
        self.stats.mistakes.push(Mistake {
            target: target.clone(),
            detected: self.last_detected.take(),
            snapshot: None,
        });
        info!(sign = %target, "target timed out");

        Some(Miss {
            target,
            mistake_index: self.stats.mistakes.len() - 1,
        })
    }

    pub fn attach_snapshot(&mut self, mistake_index: usize, frame: ImageFrame) {
        if let Some(mistake) = self.stats.mistakes.get_mut(mistake_index) {
            mistake.snapshot = Some(frame);
        }
    }

    /// Move past a resolved target. `None` unless the current target is
    /// resolved.
    pub fn advance(&mut self, now: Instant) -> Option<Advance> {
        match self.phase {
            Phase::Correct { index } | Phase::TimedOut { index } => {
                Some(self.activate(index + 1, now))
            }
            _ => None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn current_target(&self) -> Option<&str> {
        match self.phase {
            Phase::Active { index } | Phase::Correct { index } | Phase::TimedOut { index } => {
                self.items.get(index).map(|item| item.target.as_str())
            }
            _ => None,
        }
    }

    pub fn items(&self) -> &[SessionItem] {
        &self.items
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn window(&self) -> Vec<&str> {
        self.smoother.window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::SessionMode;

    fn session(targets: &[&str]) -> PracticeSession {
        let config = SessionConfig::for_mode(SessionMode::Realtime);
        PracticeSession::new(targets.iter().map(|t| t.to_string()).collect(), &config)
    }

    fn sample(label: &str) -> PredictionSample {
        PredictionSample::sign(label, 0.9)
    }

    fn assert_balanced(session: &PracticeSession) {
        let stats = session.stats();
        assert_eq!(stats.correct_count + stats.incorrect_count, stats.total_attempts);
    }

    #[test]
    fn test_match_advances() {
        let now = Instant::now();
        let mut s = session(&["A", "B"]);
        let gen = match s.start(now) {
            Advance::Next { generation, target, .. } => {
                assert_eq!(target, "A");
                generation
            }
            other => panic!("unexpected {:?}", other),
        };

        let ingest = s.ingest(gen, &sample("A"), now + Duration::from_secs(2)).unwrap();
        let matched = ingest.matched.unwrap();
        assert_eq!(matched.target, "A");
        assert_eq!(matched.elapsed, Duration::from_secs(2));
        assert_eq!(s.phase(), Phase::Correct { index: 0 });
        assert_eq!(s.stats().correct_count, 1);

        match s.advance(now).unwrap() {
            Advance::Next { target, index, .. } => {
                assert_eq!(target, "B");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(s.window().is_empty());
        assert_eq!(s.items()[0].status, ItemStatus::Correct);
        assert_eq!(s.items()[1].status, ItemStatus::Active);
    }

    #[test]
    fn test_case_insensitive_match() {
        let now = Instant::now();
        let mut s = session(&["A"]);
        s.start(now);
        let ingest = s.ingest(s.generation(), &sample("a"), now).unwrap();
        assert!(ingest.matched.is_some());
    }

    #[test]
    fn test_confidence_gate() {
        let now = Instant::now();
        let mut s = session(&["A"]);
        s.start(now);
        let gen = s.generation();

        s.ingest(gen, &sample("B"), now);
        let ingest = s.ingest(gen, &sample("A"), now).unwrap();
        // window [B, A]: tie resolved to B
        assert!(ingest.matched.is_none());

        // [A, B] is a 0.5 share for A: below the 0.7 gate
        let mut s2 = session(&["A"]);
        s2.start(now);
        let gen2 = s2.generation();
        s2.smoother.push(&sample("A"));
        let ingest = s2.ingest(gen2, &sample("B"), now).unwrap();
        assert_eq!(ingest.stable.label, Label::Sign("A".into()));
        assert!((ingest.stable.vote_share - 0.5).abs() < 1e-6);
        assert!(ingest.matched.is_none());
        assert!(s2.is_active());
    }

    #[test]
    fn test_low_confidence_tier_per_mode() {
        let now = Instant::now();
        let config = SessionConfig::for_mode(SessionMode::ModuleTest);
        let mut s = PracticeSession::new(vec!["A".into()], &config);
        s.start(now);
        let gen = s.generation();
        s.smoother.push(&sample("A"));
        let ingest = s.ingest(gen, &sample("B"), now).unwrap();
        let matched = ingest.matched.unwrap();
        assert!(matched.low_confidence);
        assert_eq!(s.stats().low_confidence_matches, 1);
    }

    #[test]
    fn test_at_most_once_match() {
        let now = Instant::now();
        let mut s = session(&["A", "B"]);
        s.start(now);
        let gen = s.generation();

        assert!(s.ingest(gen, &sample("A"), now).unwrap().matched.is_some());
        assert!(s.ingest(gen, &sample("A"), now).is_none());
        assert!(s.ingest(gen, &sample("A"), now).is_none());
        assert_eq!(s.stats().correct_count, 1);
        assert_balanced(&s);
    }

    #[test]
    fn test_stale_sample_discarded() {
        let now = Instant::now();
        let mut s = session(&["A", "B"]);
        s.start(now);
        let old = s.generation();
        s.expire(old).unwrap();
        s.advance(now).unwrap();

        assert!(s.ingest(old, &sample("B"), now).is_none());
        assert!(s.window().is_empty());
        assert!(s.is_active());
    }

    #[test]
    fn test_timeout_exclusivity() {
        let now = Instant::now();
        let mut s = session(&["A"]);
        s.start(now);
        let gen = s.generation();

        assert!(s.expire(gen).is_some());
        assert!(s.ingest(gen, &sample("A"), now).is_none());
        assert_balanced(&s);
        assert_eq!(s.stats().total_attempts, 1);

        let mut s = session(&["A"]);
        s.start(now);
        let gen = s.generation();
        assert!(s.ingest(gen, &sample("A"), now).unwrap().matched.is_some());
        assert!(s.expire(gen).is_none());
        assert_balanced(&s);
        assert_eq!(s.stats().total_attempts, 1);
    }

    #[test]
    fn test_mistake_records_last_detection() {
        let now = Instant::now();
        let mut s = session(&["A"]);
        s.start(now);
        let gen = s.generation();
        s.ingest(gen, &sample("B"), now);

        let miss = s.expire(gen).unwrap();
        s.attach_snapshot(miss.mistake_index, ImageFrame::new(2, 2, vec![1; 4]).unwrap());

        let mistake = &s.stats().mistakes[0];
        assert_eq!(mistake.target, "A");
        assert_eq!(mistake.detected.as_deref(), Some("B"));
        assert!(mistake.snapshot.is_some());
    }

    #[test]
    fn test_completion_exactly_once() {
        let now = Instant::now();
        let mut s = session(&["A", "B", "C"]);
        s.start(now);

        let mut completions = 0;
        for _ in 0..3 {
            let gen = s.generation();
            s.expire(gen);
            if let Some(Advance::Complete(stats)) = s.advance(now) {
                completions += 1;
                assert_eq!(stats.total_attempts, 3);
                assert_eq!(stats.mistake_targets(), vec!["A", "B", "C"]);
            }
        }
        assert_eq!(completions, 1);
        assert!(s.is_complete());
        assert!(s.advance(now).is_none());
    }

    #[test]
    fn test_lives_end_session_early() {
        let now = Instant::now();
        let mut config = SessionConfig::for_mode(SessionMode::ModuleTest);
        config.lives = Some(2);
        let targets = ["A", "B", "C", "D"].iter().map(|t| t.to_string()).collect();
        let mut s = PracticeSession::new(targets, &config);
        s.start(now);

        s.expire(s.generation());
        assert!(matches!(s.advance(now), Some(Advance::Next { .. })));
        s.expire(s.generation());
        match s.advance(now) {
            Some(Advance::Complete(stats)) => assert_eq!(stats.incorrect_count, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_restart_resets_stats() {
        let now = Instant::now();
        let mut s = session(&["A"]);
        s.start(now);
        s.expire(s.generation());
        s.advance(now);
        assert!(s.is_complete());

        s.set_targets(vec!["B".into()]);
        assert!(matches!(s.start(now), Advance::Next { .. }));
        assert_eq!(s.stats(), &SessionStats::default());
        assert_eq!(s.current_target(), Some("B"));
    }

    #[test]
    fn test_empty_sequence_completes() {
        let mut s = session(&[]);
        assert!(matches!(s.start(Instant::now()), Advance::Complete(_)));
    }

    #[test]
    fn test_stop_discards_in_flight() {
        let now = Instant::now();
        let mut s = session(&["A"]);
        s.start(now);
        let gen = s.generation();
        s.stop();
        assert!(s.ingest(gen, &sample("A"), now).is_none());
        assert!(s.expire(gen).is_none());
        assert_eq!(s.phase(), Phase::Idle);
    }
}
