//! Error taxonomy for capture/predict cycles
//!
//! Every failure a cycle can hit maps onto one variant here. None of them
//! count as a wrong attempt; the timeout path is the only way a target is
//! missed.

use thiserror::Error;

/// Substring the upstream hand-landmark pipeline uses for its sequencing
/// fault. Results carrying it are retried once instead of waiting a tick.
pub const RETRIABLE_MARKER: &str = "Packet timestamp mismatch";

/// Failure of a single capture, readiness probe or predict call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecognitionError {
    /// Model not loaded yet (or the probe timed out)
    #[error("recognition model not ready (attempt {attempts})")]
    NotReady { attempts: u32 },

    /// Network failure, non-2xx status, or `success: false` payload
    #[error("prediction failed: {0}")]
    Transport(String),

    /// Known transient fault in the upstream vision pipeline
    #[error("transient classifier fault: {0}")]
    Retriable(String),

    /// Camera not ready or an empty frame
    #[error("capture failed: {0}")]
    Capture(String),

    /// Payload could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RecognitionError {
    /// Classify a backend-reported error message.
    pub fn from_backend_message(message: &str) -> Self {
        if message.contains(RETRIABLE_MARKER) {
            RecognitionError::Retriable(message.to_string())
        } else {
            RecognitionError::Transport(message.to_string())
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, RecognitionError::Retriable(_))
    }

    /// Whether the learner should see this error rather than a neutral
    /// "Detecting..." status. Only sustained unreadiness qualifies.
    pub fn is_persistent(&self, alert_after: u32) -> bool {
        match self {
            RecognitionError::NotReady { attempts } => *attempts >= alert_after,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_classification() {
        let err = RecognitionError::from_backend_message(
            "MediaPipe error: Packet timestamp mismatch on a calculator",
        );
        assert!(err.is_retriable());

        let err = RecognitionError::from_backend_message("Model file not found");
        assert_eq!(err, RecognitionError::Transport("Model file not found".into()));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_only_sustained_unreadiness_is_persistent() {
        assert!(!RecognitionError::NotReady { attempts: 1 }.is_persistent(3));
        assert!(RecognitionError::NotReady { attempts: 3 }.is_persistent(3));
        assert!(!RecognitionError::Transport("502".into()).is_persistent(0));
    }
}
