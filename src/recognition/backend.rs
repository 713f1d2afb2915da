//! Collaborator contracts: frame capture, readiness and prediction
//!
//! The engine never talks to a camera or a network itself. Platform code
//! implements `FrameSource` and `SignPredictor`; the payload decoders below
//! turn the recognition server's JSON into samples or classified errors so
//! any transport can reuse them.

use async_trait::async_trait;
use serde::Deserialize;

use super::errors::RecognitionError;
use super::sample::{Label, PredictionSample};

/// One still frame from the camera feed
#[derive(Clone, Debug, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Zero-sized frames are a capture failure, not an image.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RecognitionError> {
        if width == 0 || height == 0 {
            return Err(RecognitionError::Capture(format!(
                "frame has zero dimension ({}x{})",
                width, height
            )));
        }
        Ok(ImageFrame {
            width,
            height,
            data,
        })
    }
}

/// Produces frames from the active camera feed
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Must fail fast when no frame is available.
    async fn capture(&self) -> Result<ImageFrame, RecognitionError>;
}

/// Remote or embedded sign classifier
#[async_trait]
pub trait SignPredictor: Send + Sync {
    /// Is the model loaded?
    async fn ready(&self) -> Result<bool, RecognitionError>;

    /// Single inference call
    async fn predict(&self, frame: &ImageFrame) -> Result<PredictionSample, RecognitionError>;
}

/// Predict payload. Covers both the `success` shape and the older
/// `status` shape.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    success: Option<bool>,
    status: Option<String>,
    prediction: Option<String>,
    confidence: Option<f32>,
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    model_loaded: bool,
}

/// Decode a predict response body into a sample.
pub fn decode_prediction(body: &str) -> Result<PredictionSample, RecognitionError> {
    let response: PredictResponse =
        serde_json::from_str(body).map_err(|e| RecognitionError::Malformed(e.to_string()))?;

    let succeeded = match (response.success, response.status.as_deref()) {
        (Some(flag), _) => flag,
        (None, Some("success")) => true,
        (None, Some("loading")) => return Err(RecognitionError::NotReady { attempts: 1 }),
        (None, Some(_)) => false,
        (None, None) => {
            return Err(RecognitionError::Malformed(
                "response carries neither `success` nor `status`".to_string(),
            ))
        }
    };

    if !succeeded {
        let message = response
            .error
            .or(response.message)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(RecognitionError::from_backend_message(&message));
    }

    let label = response
        .prediction
        .as_deref()
        .map(Label::parse)
        .unwrap_or(Label::NoHand);

    Ok(PredictionSample::new(label, response.confidence.unwrap_or(0.0)))
}

/// Decode a health response body: is the model loaded?
pub fn decode_health(body: &str) -> Result<bool, RecognitionError> {
    let health: HealthResponse =
        serde_json::from_str(body).map_err(|e| RecognitionError::Malformed(e.to_string()))?;
    Ok(health.model_loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_frame_rejected() {
        assert!(matches!(
            ImageFrame::new(0, 240, vec![]),
            Err(RecognitionError::Capture(_))
        ));
        assert!(ImageFrame::new(320, 240, vec![0; 4]).is_ok());
    }

    #[test]
    fn test_decode_success_payload() {
        let sample =
            decode_prediction(r#"{"success": true, "prediction": "A", "confidence": 0.93}"#)
                .unwrap();
        assert_eq!(sample.label, Label::Sign("A".into()));
        assert!((sample.confidence - 0.93).abs() < 1e-6);
    }

    #[test]
    fn test_decode_no_hand() {
        let sample = decode_prediction(
            r#"{"status": "success", "prediction": "No hand detected", "confidence": 0.0}"#,
        )
        .unwrap();
        assert!(sample.label.is_no_hand());
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(
            decode_prediction(r#"{"success": false, "error": "bad image"}"#),
            Err(RecognitionError::Transport("bad image".into()))
        );
        assert!(matches!(
            decode_prediction(r#"{"status": "error", "message": "Packet timestamp mismatch"}"#),
            Err(RecognitionError::Retriable(_))
        ));
        assert!(matches!(
            decode_prediction(r#"{"status": "loading"}"#),
            Err(RecognitionError::NotReady { .. })
        ));
        assert!(matches!(
            decode_prediction("<html>502</html>"),
            Err(RecognitionError::Malformed(_))
        ));
        assert!(matches!(
            decode_prediction("{}"),
            Err(RecognitionError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_health() {
        assert_eq!(decode_health(r#"{"model_loaded": true}"#), Ok(true));
        assert_eq!(decode_health(r#"{"status": "ok"}"#), Ok(false));
        assert!(decode_health("not json").is_err());
    }
}
