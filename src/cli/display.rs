//! Terminal display and UI rendering
//!
//! Features:
//! - Current target with countdown
//! - Raw predictions colored by confidence tier
//! - Match and timeout feedback
//! - End-of-session summary with score, grade and confusions

use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::error::Error;
use std::io::{stdout, Write};
use tracing::warn;

use sign_trainer::recognition::{
    ConfidenceTier, PredictionSample, RecognitionError, StableResult, Thresholds,
};
use sign_trainer::session::{
    score_percent, ConfusionTracker, MatchFeedback, ScoreGrade, SessionMode, SessionObserver,
    SessionOutcome, SessionStats,
};

/// Width of separator rules
const RULE_WIDTH: usize = 50;
/// Confusions listed in the summary
const TOP_CONFUSIONS: usize = 5;

/// Terminal display manager
pub struct Display {
    thresholds: Thresholds,
}

impl Display {
    pub fn new(thresholds: Thresholds) -> Self {
        Display { thresholds }
    }

    /// Clear screen
    pub fn clear(&self) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();
        execute!(
            stdout,
            terminal::Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }

    pub fn show_banner(&self, mode: SessionMode, targets: usize) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("Sign Trainer"),
            ResetColor,
            Print(format!("  |  {:?}  |  {} signs\n", mode, targets)),
            SetForegroundColor(Color::DarkGrey),
            Print("Ctrl+C to stop\n"),
            ResetColor
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn show_target(&self, index: usize, total: usize, target: &str) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();
        execute!(
            stdout,
            SetForegroundColor(Color::Blue),
            Print("─".repeat(RULE_WIDTH)),
            Print("\n"),
            SetForegroundColor(Color::Magenta),
            Print(format!("Sign {}/{}: ", index + 1, total)),
            ResetColor,
            SetForegroundColor(Color::Cyan),
            Print(target),
            ResetColor,
            Print("\n")
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn show_countdown(&self, remaining_secs: u64) -> Result<(), Box<dyn Error>> {
        let color = if remaining_secs <= 2 {
            Color::Red
        } else {
            Color::DarkGrey
        };
        let mut stdout = stdout();
        execute!(
            stdout,
            SetForegroundColor(color),
            Print(format!("  {}s left\n", remaining_secs)),
            ResetColor
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Raw classifier output. Green at or above the accept threshold,
    /// yellow in the low tier, red below it.
    pub fn show_prediction(&self, sample: &PredictionSample) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();

        if sample.label.is_no_hand() {
            execute!(
                stdout,
                SetForegroundColor(Color::DarkGrey),
                Print(format!("  {}\n", sample.label)),
                ResetColor
            )?;
        } else {
            let color = match ConfidenceTier::classify(sample.confidence, &self.thresholds) {
                ConfidenceTier::High => Color::Green,
                ConfidenceTier::Low => Color::Yellow,
                ConfidenceTier::Rejected => Color::Red,
            };
            execute!(
                stdout,
                Print("  Detected: "),
                SetForegroundColor(color),
                Print(format!("{} ({:.0}%)", sample.label, sample.confidence * 100.0)),
                ResetColor,
                Print("\n")
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn show_stable(&self, result: &StableResult) -> Result<(), Box<dyn Error>> {
        if result.label.is_no_hand() {
            return Ok(());
        }
        let mut stdout = stdout();
        execute!(
            stdout,
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                "  stable {} {:.0}%\n",
                result.label,
                result.vote_share * 100.0
            )),
            ResetColor
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn show_learned(&self, feedback: &MatchFeedback) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print(format!(
                "✓ {} in {:.1}s  ",
                feedback.target,
                feedback.elapsed.as_secs_f64()
            )),
            ResetColor,
            Print(feedback.speed.message())
        )?;
        if feedback.low_confidence {
            execute!(
                stdout,
                SetForegroundColor(Color::Yellow),
                Print("  (low confidence)"),
                ResetColor
            )?;
        }
        execute!(stdout, Print("\n"))?;
        stdout.flush()?;
        Ok(())
    }

    pub fn show_timeout(&self, target: &str) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();
        execute!(
            stdout,
            SetForegroundColor(Color::Red),
            Print(format!("✗ Time's up for {}\n", target)),
            ResetColor
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Transient failures show as a neutral status; only persistent ones
    /// are spelled out.
    pub fn show_error(&self, error: &RecognitionError, persistent: bool) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();
        if persistent {
            execute!(
                stdout,
                SetForegroundColor(Color::Red),
                Print(format!("⚠ {}\n", error)),
                ResetColor
            )?;
        } else {
            execute!(
                stdout,
                SetForegroundColor(Color::DarkGrey),
                Print("  Detecting...\n"),
                ResetColor
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn show_summary(
        &self,
        outcome: &SessionOutcome,
        confusion: &ConfusionTracker,
    ) -> Result<(), Box<dyn Error>> {
        let stats = outcome.stats();
        let percent = score_percent(stats);
        let grade = ScoreGrade::from_percent(percent);
        let color = match grade {
            ScoreGrade::Excellent | ScoreGrade::Good => Color::Green,
            ScoreGrade::Fine => Color::Yellow,
            ScoreGrade::Bad => Color::Red,
        };
        let heading = if outcome.is_completed() {
            "Session Complete!"
        } else {
            "Session stopped"
        };

        let mut stdout = stdout();
        execute!(
            stdout,
            SetForegroundColor(Color::Blue),
            Print("─".repeat(RULE_WIDTH)),
            Print("\n"),
            ResetColor,
            Print(format!("{}\n", heading)),
            Print("Score: "),
            SetForegroundColor(color),
            Print(format!("{}%", percent)),
            ResetColor,
            Print(format!(
                "  |  Correct: {}  |  Missed: {}  |  Attempts: {}\n",
                stats.correct_count, stats.incorrect_count, stats.total_attempts
            )),
            Print(format!("{}\n", grade.message()))
        )?;

        self.show_mistakes(stats)?;

        let top = confusion.top_confusions(TOP_CONFUSIONS);
        if !top.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Color::Magenta),
                Print("Common confusions: "),
                ResetColor
            )?;
            for ((target, detected), count) in top {
                execute!(stdout, Print(format!("{}→{} ×{}  ", target, detected, count)))?;
            }
            execute!(stdout, Print("\n"))?;
        }

        let problematic = confusion.problematic_targets();
        if !problematic.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Color::Yellow),
                Print(format!("⚠ Practice these: {}\n", problematic.join(", "))),
                ResetColor
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn show_mistakes(&self, stats: &SessionStats) -> Result<(), Box<dyn Error>> {
        let mut stdout = stdout();
        for mistake in &stats.mistakes {
            execute!(
                stdout,
                Print("  Expected "),
                SetForegroundColor(Color::Cyan),
                Print(&mistake.target),
                ResetColor,
                Print(", predicted "),
                SetForegroundColor(Color::Red),
                Print(mistake.detected.as_deref().unwrap_or("nothing")),
                ResetColor,
                Print(if mistake.snapshot.is_some() {
                    "  [snapshot]\n"
                } else {
                    "\n"
                })
            )?;
        }
        Ok(())
    }
}

/// Renders engine events to the terminal
pub struct TerminalObserver {
    display: Display,
    total: usize,
}

impl TerminalObserver {
    pub fn new(display: Display, total: usize) -> Self {
        TerminalObserver { display, total }
    }

    fn render(result: Result<(), Box<dyn Error>>) {
        if let Err(e) = result {
            warn!(error = %e, "terminal render failed");
        }
    }
}

impl SessionObserver for TerminalObserver {
    fn on_target(&mut self, index: usize, target: &str) {
        Self::render(self.display.show_target(index, self.total, target));
    }

    fn on_prediction(&mut self, sample: &PredictionSample) {
        Self::render(self.display.show_prediction(sample));
    }

    fn on_stable(&mut self, result: &StableResult) {
        Self::render(self.display.show_stable(result));
    }

    fn on_sign_learned(&mut self, _target: &str, feedback: &MatchFeedback) {
        Self::render(self.display.show_learned(feedback));
    }

    fn on_timeout(&mut self, target: &str) {
        Self::render(self.display.show_timeout(target));
    }

    fn on_tick(&mut self, remaining_secs: u64) {
        Self::render(self.display.show_countdown(remaining_secs));
    }

    fn on_prediction_error(&mut self, error: &RecognitionError, persistent: bool) {
        Self::render(self.display.show_error(error, persistent));
    }
}
