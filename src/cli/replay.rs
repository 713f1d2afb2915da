//! Scripted backend for running sessions without a camera or model server
//!
//! A script is a JSON-lines file of recorded backend responses. Lines with a
//! `model_loaded` key answer readiness probes; every other line answers one
//! predict call, in order. Blank lines and `#` comments are skipped. Once
//! the script runs out the learner is treated as out of frame.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use sign_trainer::recognition::{
    decode_health, decode_prediction, FrameSource, ImageFrame, PredictionSample,
    RecognitionError, SignPredictor,
};

pub struct ReplayPredictor {
    health: Mutex<VecDeque<String>>,
    predictions: Mutex<VecDeque<String>>,
    /// Simulated round-trip time per predict call
    latency: Duration,
}

impl ReplayPredictor {
    pub fn from_file(path: &Path, latency: Duration) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_script(&content, latency))
    }

    pub fn from_script(script: &str, latency: Duration) -> Self {
        let mut health = VecDeque::new();
        let mut predictions = VecDeque::new();

        for line in script.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let is_health = serde_json::from_str::<Value>(line)
                .map(|value| value.get("model_loaded").is_some())
                .unwrap_or(false);
            if is_health {
                health.push_back(line.to_string());
            } else {
                predictions.push_back(line.to_string());
            }
        }

        debug!(
            health = health.len(),
            predictions = predictions.len(),
            "replay script loaded"
        );
        ReplayPredictor {
            health: Mutex::new(health),
            predictions: Mutex::new(predictions),
            latency,
        }
    }

    pub fn remaining(&self) -> usize {
        self.predictions.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    fn next_line(queue: &Mutex<VecDeque<String>>) -> Result<Option<String>, RecognitionError> {
        queue
            .lock()
            .map(|mut queue| queue.pop_front())
            .map_err(|_| RecognitionError::Transport("replay script lock poisoned".into()))
    }
}

#[async_trait]
impl SignPredictor for ReplayPredictor {
    async fn ready(&self) -> Result<bool, RecognitionError> {
        match Self::next_line(&self.health)? {
            Some(body) => decode_health(&body),
            None => Ok(true),
        }
    }

    async fn predict(&self, _frame: &ImageFrame) -> Result<PredictionSample, RecognitionError> {
        tokio::time::sleep(self.latency).await;
        match Self::next_line(&self.predictions)? {
            Some(body) => decode_prediction(&body),
            None => Ok(PredictionSample::no_hand()),
        }
    }
}

/// Frame source producing blank frames of a fixed size
pub struct SyntheticCamera {
    width: u32,
    height: u32,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        SyntheticCamera { width, height }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

#[async_trait]
impl FrameSource for SyntheticCamera {
    async fn capture(&self) -> Result<ImageFrame, RecognitionError> {
        let len = self.width as usize * self.height as usize * 3;
        ImageFrame::new(self.width, self.height, vec![0; len])
    }
}
