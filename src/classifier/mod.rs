//! Remote image classifier
//!
//! The detector talks to the classifier through [`Classifier`]; the shipped
//! implementation is [`HttpClassifier`], which speaks the `DetectCustomLabels`
//! JSON shape.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use http::HttpClassifier;

/// Error type name the service uses for undecodable images
pub const INVALID_IMAGE_FORMAT: &str = "InvalidImageFormatException";

/// One detected label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(rename = "Name")]
    pub name: String,
    /// Percentage, 0-100
    #[serde(rename = "Confidence")]
    pub confidence: f64,
    /// Geometry and anything else the service attaches
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
            extra: Map::new(),
        }
    }
}

/// Full classifier answer: labels plus response metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "CustomLabels", default)]
    pub labels: Vec<Label>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Classification {
    /// Result used when the service rejects the image format
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// The service could not decode the submitted bytes as an image
    #[error("InvalidImageFormatException: {0}")]
    InvalidImageFormat(String),
    #[error("classifier returned {status} ({kind}): {message}")]
    Service {
        status: u16,
        kind: String,
        message: String,
    },
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify `image`, returning at most `max_results` labels
    async fn classify(
        &self,
        image: &[u8],
        model_ref: &str,
        max_results: u32,
    ) -> Result<Classification, ClassifierError>;

    /// Short description for startup logging
    fn describe(&self) -> String;
}
