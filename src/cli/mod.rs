//! CLI Interface: terminal rendering and scripted backend
//!
//! # Components
//! - `display.rs`: Terminal rendering and the engine observer
//! - `replay.rs`: JSON-lines replay predictor and synthetic camera

pub mod display;
pub mod replay;
