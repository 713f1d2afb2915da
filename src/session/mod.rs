//! Session Management: practice flow, timing and scoring
//!
//! # Components
//! - `state.rs`: PracticeSession match/progress state machine
//! - `engine.rs`: RecognitionEngine event loop and observer hooks
//! - `scheduler.rs`: Capture cadence gating
//! - `timer.rs`: Per-target countdown
//! - `config.rs`: Per-mode configuration and overrides
//! - `plan.rs`: Target sequence generation
//! - `accuracy.rs`: Score, grade and speed feedback
//! - `confusion.rs`: Expected vs detected tracking for missed signs

pub mod accuracy;
pub mod config;
pub mod confusion;
pub mod engine;
pub mod plan;
pub mod scheduler;
pub mod state;
pub mod timer;

pub use accuracy::{score_percent, ScoreGrade, SpeedFeedback};
pub use config::{ConfigError, SessionConfig, SessionMode};
pub use confusion::ConfusionTracker;
pub use engine::{
    EngineCommand, EngineCommands, EngineHandle, NullObserver, RecognitionEngine,
    SessionObserver, SessionOutcome,
};
pub use plan::TargetPlan;
pub use state::{MatchFeedback, Mistake, PracticeSession, SessionStats};
