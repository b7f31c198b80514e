use crate::classifier::ClassifierError;
use crate::store::StoreError;

/// Any failure inside a detection request; each one becomes a 500 whose body
/// carries this error's display text
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(serde_json::Error),
    #[error("Request body must be a JSON object")]
    BodyNotObject,
    #[error("'image' must be a base64 string")]
    ImageNotString,
    #[error("Invalid base64 image: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}
