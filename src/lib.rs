//! Sign Trainer - recognition session engine for sign-language practice
//!
//! Turns a noisy stream of classifier predictions into a stable detected
//! sign, decides when it matches the current target, and drives timed
//! practice and test sessions.

pub mod recognition;
pub mod session;
