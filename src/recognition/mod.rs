//! Recognition: raw classifier output and its smoothing
//!
//! # Components
//! - `sample.rs`: Labels, samples, confidence tiers
//! - `smoother.rs`: Majority-vote window
//! - `backend.rs`: Capture/predict contracts and payload decoding
//! - `errors.rs`: Cycle error taxonomy

pub mod backend;
pub mod errors;
pub mod sample;
pub mod smoother;

pub use backend::{decode_health, decode_prediction, FrameSource, ImageFrame, SignPredictor};
pub use errors::RecognitionError;
pub use sample::{labels_match, ConfidenceTier, Label, PredictionSample, Thresholds, NO_HAND_TEXT};
pub use smoother::{PredictionSmoother, StableResult};
