//! Scoring and learner feedback
//!
//! Features:
//! - Percentage score over all attempts
//! - Grade bands for the end-of-session summary
//! - Speed feedback for a matched sign

use std::fmt;
use std::time::Duration;

use super::state::SessionStats;

/// Matches within this time count as quick
const QUICK_MATCH: Duration = Duration::from_secs(5);
/// Matches within this time count as steady
const STEADY_MATCH: Duration = Duration::from_secs(10);

/// Percentage of correct attempts, rounded to the nearest integer.
/// An empty session scores 0.
pub fn score_percent(stats: &SessionStats) -> u32 {
    if stats.total_attempts == 0 {
        return 0;
    }
    (stats.correct_count as f64 * 100.0 / stats.total_attempts as f64).round() as u32
}

/// Grade band for a session score
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreGrade {
    /// Every sign correct
    Excellent,
    /// 80% or better
    Good,
    /// 50% or better
    Fine,
    Bad,
}

impl ScoreGrade {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            p if p >= 100 => ScoreGrade::Excellent,
            p if p >= 80 => ScoreGrade::Good,
            p if p >= 50 => ScoreGrade::Fine,
            _ => ScoreGrade::Bad,
        }
    }

    pub fn for_stats(stats: &SessionStats) -> Self {
        Self::from_percent(score_percent(stats))
    }

    pub fn message(&self) -> &'static str {
        match self {
            ScoreGrade::Excellent => "Perfect score, every sign landed!",
            ScoreGrade::Good => "Great work, you know most of these.",
            ScoreGrade::Fine => "Good effort, review the signs you missed.",
            ScoreGrade::Bad => "Keep practicing, it gets easier.",
        }
    }
}

/// How quickly a sign was produced after its target appeared
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedFeedback {
    Quick,
    Steady,
    Slow,
}

impl SpeedFeedback {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        if elapsed <= QUICK_MATCH {
            SpeedFeedback::Quick
        } else if elapsed <= STEADY_MATCH {
            SpeedFeedback::Steady
        } else {
            SpeedFeedback::Slow
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SpeedFeedback::Quick => "Good job, you're learning quick!",
            SpeedFeedback::Steady => "You're learning well! Keep at it!",
            SpeedFeedback::Slow => "Some signs take time, you got this!",
        }
    }
}

impl fmt::Display for SpeedFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
