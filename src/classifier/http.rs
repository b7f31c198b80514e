//! `DetectCustomLabels` over HTTP

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Classification, Classifier, ClassifierError, INVALID_IMAGE_FORMAT};
use crate::config::ClassifierConfig;

const TARGET: &str = "RekognitionService.DetectCustomLabels";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DetectCustomLabelsRequest<'a> {
    project_version_arn: &'a str,
    image: ImageBlob,
    max_results: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImageBlob {
    bytes: String,
}

/// Error document returned on non-2xx responses
#[derive(Deserialize, Default)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Classifier backed by a remote HTTP endpoint
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    region: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            region: config.region.clone(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        image: &[u8],
        model_ref: &str,
        max_results: u32,
    ) -> Result<Classification, ClassifierError> {
        let request = DetectCustomLabelsRequest {
            project_version_arn: model_ref,
            image: ImageBlob {
                bytes: STANDARD.encode(image),
            },
            max_results,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", TARGET)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| ClassifierError::InvalidResponse(e.to_string()));
        }
        Err(error_from_body(status.as_u16(), &text))
    }

    fn describe(&self) -> String {
        format!("http ({}, region {})", self.endpoint, self.region)
    }
}

/// Map a failed response to a classifier error. The `__type` field may carry
/// a namespace prefix (`com.amazonaws...#Name`).
fn error_from_body(status: u16, text: &str) -> ClassifierError {
    let body: ServiceErrorBody = serde_json::from_str(text).unwrap_or_default();
    let kind = body
        .kind
        .rsplit('#')
        .next()
        .unwrap_or_default()
        .to_string();

    if kind == INVALID_IMAGE_FORMAT {
        return ClassifierError::InvalidImageFormat(body.message);
    }

    let message = if body.message.is_empty() {
        text.trim().to_string()
    } else {
        body.message
    };
    ClassifierError::Service {
        status,
        kind: if kind.is_empty() { "Unknown".to_string() } else { kind },
        message,
    }
}
