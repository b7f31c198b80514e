//! Detection request handler
//!
//! One request runs a fixed sequence: validate, write a placeholder record,
//! decode the image, classify it, overwrite the record with the result and
//! answer. Every failure after validation is reported as a 500 carrying the
//! error text; there are no retries.
//!
//! Between the two writes the stored record has an empty classification and
//! concurrent readers can observe it in that state.

mod error;
mod event;

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

pub use error::DetectError;
pub use event::{ApiEvent, ApiResponse, CORS_HEADERS};

use crate::classifier::{Classification, Classifier, ClassifierError};
use crate::config::ClassifierConfig;
use crate::logger;
use crate::store::{from_attribute, Item, Record, RecordStore, StoreError};

pub const SUCCESS_MESSAGE: &str = "Image analyzed & stored successfully";
pub const MISSING_IMAGE_MESSAGE: &str = "Missing 'image' field";
pub const DEFAULT_MAX_RESULTS: u32 = 10;

/// Standard alphabet; tolerates non-zero trailing bits like most decoders do
const IMAGE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Classifier parameters sent with every request
#[derive(Debug, Clone)]
pub struct DetectSettings {
    pub model_ref: String,
    pub max_results: u32,
}

impl DetectSettings {
    /// `max_results` is capped at [`DEFAULT_MAX_RESULTS`]
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            model_ref: config.model_ref.clone(),
            max_results: config.max_results.min(DEFAULT_MAX_RESULTS),
        }
    }
}

impl Default for DetectSettings {
    fn default() -> Self {
        Self {
            model_ref: String::new(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

pub struct DetectHandler {
    store: Arc<dyn RecordStore>,
    classifier: Arc<dyn Classifier>,
    settings: DetectSettings,
}

impl DetectHandler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        classifier: Arc<dyn Classifier>,
        settings: DetectSettings,
    ) -> Self {
        Self {
            store,
            classifier,
            settings,
        }
    }

    /// Handle one event. Never fails: errors become 500 responses.
    pub async fn handle(&self, event: ApiEvent) -> ApiResponse {
        if event.is_preflight() {
            return ApiResponse::preflight();
        }

        match self.process(event.body).await {
            Ok(response) => response,
            Err(e) => {
                logger::log_error(&format!("[Detect] Request failed: {e}"));
                ApiResponse::error(500, &e.to_string())
            }
        }
    }

    async fn process(&self, body: Option<Value>) -> Result<ApiResponse, DetectError> {
        let Value::Object(mut fields) = parse_body(body)? else {
            return Err(DetectError::BodyNotObject);
        };

        let image = match fields.remove("image") {
            Some(Value::String(image)) if !image.is_empty() => image,
            Some(value) if !is_blank(&value) => return Err(DetectError::ImageNotString),
            _ => return Ok(ApiResponse::error(400, MISSING_IMAGE_MESSAGE)),
        };
        let meta = fields
            .remove("meta")
            .unwrap_or_else(|| Value::Object(Map::new()));

        let mut record = Record::new(image, meta);
        self.store.put(record.to_item()).await?;
        logger::log_record_written(&record.id, "placeholder");

        let bytes = decode_image(&record.image)?;
        let classification = self.classify(&record.id, &bytes).await?;
        record.classification = serde_json::to_value(&classification).map_err(StoreError::from)?;

        let item = record.to_item();
        let labels = stored_labels(&item)?;
        self.store.put(item).await?;
        logger::log_record_written(&record.id, "classified");

        Ok(ApiResponse::json(
            200,
            &json!({
                "message": SUCCESS_MESSAGE,
                "id": record.id,
                "labels": labels,
            }),
        ))
    }

    /// Call the classifier, treating an invalid image format as "no labels"
    async fn classify(&self, id: &Uuid, image: &[u8]) -> Result<Classification, ClassifierError> {
        let result = self
            .classifier
            .classify(image, &self.settings.model_ref, self.settings.max_results)
            .await;

        match result {
            Ok(classification) => {
                logger::log_classified(id, classification.labels.len());
                Ok(classification)
            }
            Err(ClassifierError::InvalidImageFormat(reason)) => {
                logger::log_warning(&format!(
                    "[Detect] {id}: classifier rejected image format ({reason}), storing no labels"
                ));
                Ok(Classification::empty())
            }
            Err(e) => Err(e),
        }
    }
}

/// Values that count as "no image": null, false, zero and empty
/// strings, arrays or objects
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Raw string bodies are parsed; a missing body counts as `{}`
fn parse_body(body: Option<Value>) -> Result<Value, DetectError> {
    match body {
        None => Ok(Value::Object(Map::new())),
        Some(Value::String(raw)) => serde_json::from_str(&raw).map_err(DetectError::InvalidJson),
        Some(parsed) => Ok(parsed),
    }
}

/// Decode a base64 image, padding it with `=` to a multiple of 4 first.
/// ASCII whitespace (line wrapping) is ignored.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let mut cleaned: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let padding = (4 - cleaned.len() % 4) % 4;
    cleaned.push_str(&"=".repeat(padding));
    IMAGE_ENGINE.decode(cleaned)
}

/// Label list read back from the store representation, so numbers in the
/// response are exactly what was persisted
fn stored_labels(item: &Item) -> Result<Value, StoreError> {
    let classification = match item.get("classification") {
        Some(value) => from_attribute(value)?,
        None => Value::Null,
    };
    Ok(classification
        .get("CustomLabels")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AttributeValue;
    use crate::testing::{RecordingStore, Script, ScriptedClassifier};
    use pretty_assertions::assert_eq;

    const HELLO: &str = "aGVsbG8="; // "hello"

    fn handler(store: &Arc<RecordingStore>, classifier: &Arc<ScriptedClassifier>) -> DetectHandler {
        DetectHandler::new(
            Arc::clone(store) as Arc<dyn RecordStore>,
            Arc::clone(classifier) as Arc<dyn Classifier>,
            DetectSettings {
                model_ref: "arn:aws:rekognition:project/cars/version/1".to_string(),
                max_results: DEFAULT_MAX_RESULTS,
            },
        )
    }

    fn post(body: &Value) -> ApiEvent {
        ApiEvent::from_raw("POST", body.to_string())
    }

    fn body_of(response: &ApiResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    fn classification_of(item: &Item) -> Value {
        from_attribute(&item["classification"]).unwrap()
    }

    #[tokio::test]
    async fn test_preflight_touches_nothing() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[("car", 90.0)]));

        let response = handler(&store, &classifier)
            .handle(ApiEvent::new("OPTIONS", None))
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "");
        assert_eq!(response.headers(), &CORS_HEADERS);
        assert!(store.puts().is_empty());
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_image_is_rejected_before_any_write() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[]));
        let detector = handler(&store, &classifier);

        let events = [
            post(&json!({"meta": {"k": "v"}})),
            post(&json!({"image": ""})),
            post(&json!({"image": null})),
            post(&json!({"image": []})),
            post(&json!({"image": {}})),
            post(&json!({"image": false})),
            post(&json!({"image": 0})),
            post(&json!({"image": 0.0})),
            ApiEvent::new("POST", None),
            ApiEvent::new("GET", Some(json!({}))),
        ];
        for event in events {
            let response = detector.handle(event).await;
            assert_eq!(response.status_code, 400);
            assert_eq!(body_of(&response), json!({"error": "Missing 'image' field"}));
        }

        assert!(store.puts().is_empty());
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_string_image_is_500_before_any_write() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[]));
        let detector = handler(&store, &classifier);

        for image in [json!(["aGVsbG8="]), json!({"b64": "aGVsbG8="}), json!(true), json!(42)] {
            let response = detector.handle(post(&json!({ "image": image }))).await;
            assert_eq!(response.status_code, 500);
            assert_eq!(body_of(&response), json!({"error": "'image' must be a base64 string"}));
        }

        assert!(store.puts().is_empty());
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_successful_request_writes_twice_with_same_id() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[("car", 97.5), ("wheel", 61.25)]));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": HELLO, "meta": {"k": "v"}})))
            .await;

        assert_eq!(response.status_code, 200);
        let body = body_of(&response);
        assert_eq!(body["message"], json!(SUCCESS_MESSAGE));
        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(
            body["labels"],
            json!([{"Name": "car", "Confidence": 97.5}, {"Name": "wheel", "Confidence": 61.25}])
        );

        let puts = store.puts();
        assert_eq!(puts.len(), 2);
        for item in &puts {
            assert_eq!(item["id"], AttributeValue::S(id.clone()));
            assert_eq!(item["image"], AttributeValue::S(HELLO.to_string()));
            assert_eq!(from_attribute(&item["meta"]).unwrap(), json!({"k": "v"}));
        }
        assert_eq!(puts[0]["created_at"], puts[1]["created_at"]);
        assert_eq!(classification_of(&puts[0]), json!({}));
        assert_eq!(
            classification_of(&puts[1])["CustomLabels"][0]["Name"],
            json!("car")
        );

        let calls = classifier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, b"hello".to_vec());
        assert_eq!(calls[0].1, "arn:aws:rekognition:project/cars/version/1");
        assert_eq!(calls[0].2, 10);

        let stored = store.get(&id).await.unwrap().unwrap();
        assert!(Record::from_item(&stored).unwrap().has_classification());
    }

    #[tokio::test]
    async fn test_meta_defaults_to_empty_object() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[]));

        let response = handler(&store, &classifier)
            .handle(ApiEvent::new("POST", Some(json!({"image": HELLO}))))
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(from_attribute(&store.puts()[0]["meta"]).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_unpadded_base64_is_decoded() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[]));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": "aGVsbG8"})))
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(classifier.calls()[0].0, b"hello".to_vec());
        // stored payload is the original text, not the padded one
        assert_eq!(store.puts()[0]["image"], AttributeValue::S("aGVsbG8".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_image_format_yields_empty_labels() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::new(Script::InvalidFormat));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": HELLO})))
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(body_of(&response)["labels"], json!([]));

        let puts = store.puts();
        assert_eq!(puts.len(), 2);
        assert_eq!(classification_of(&puts[1]), json!({"CustomLabels": []}));
    }

    #[tokio::test]
    async fn test_confidence_is_returned_exactly() {
        let confidence = 99.123_456_789_01;
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[("car", confidence)]));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": HELLO})))
            .await;

        let body = body_of(&response);
        assert_eq!(body["labels"][0]["Confidence"].as_f64(), Some(confidence));
        assert_eq!(
            classification_of(&store.puts()[1])["CustomLabels"][0]["Confidence"].as_f64(),
            Some(confidence)
        );
    }

    #[tokio::test]
    async fn test_first_write_failure_is_500() {
        let store = Arc::new(RecordingStore::failing_on(1));
        let classifier = Arc::new(ScriptedClassifier::labels(&[("car", 90.0)]));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": HELLO})))
            .await;

        assert_eq!(response.status_code, 500);
        let body = body_of(&response);
        assert!(body["error"].as_str().unwrap().contains("store unreachable"));
        assert_eq!(store.puts().len(), 1);
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_write_failure_is_500() {
        let store = Arc::new(RecordingStore::failing_on(2));
        let classifier = Arc::new(ScriptedClassifier::labels(&[("car", 90.0)]));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": HELLO})))
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(store.puts().len(), 2);
        assert_eq!(classifier.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_other_classifier_failures_are_500() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::new(Script::Unavailable));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": HELLO})))
            .await;

        assert_eq!(response.status_code, 500);
        assert!(body_of(&response)["error"]
            .as_str()
            .unwrap()
            .contains("ServiceUnavailable"));
        // placeholder stays behind with an empty classification
        let puts = store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(classification_of(&puts[0]), json!({}));
    }

    #[tokio::test]
    async fn test_undecodable_base64_fails_after_placeholder() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[]));

        let response = handler(&store, &classifier)
            .handle(post(&json!({"image": "a!b@c#"})))
            .await;

        assert_eq!(response.status_code, 500);
        assert!(body_of(&response)["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid base64 image"));
        assert_eq!(store.puts().len(), 1);
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_500() {
        let store = Arc::new(RecordingStore::new());
        let classifier = Arc::new(ScriptedClassifier::labels(&[]));
        let detector = handler(&store, &classifier);

        let cases = [
            (ApiEvent::from_raw("POST", "{not json".to_string()), "Invalid JSON body"),
            (ApiEvent::from_raw("POST", "[1, 2]".to_string()), "JSON object"),
            (post(&json!({"image": 42})), "base64 string"),
        ];
        for (event, expected) in cases {
            let response = detector.handle(event).await;
            assert_eq!(response.status_code, 500);
            let error = body_of(&response)["error"].as_str().unwrap().to_string();
            assert!(error.contains(expected), "{error}");
        }
        assert!(store.puts().is_empty());
    }

    #[test]
    fn test_settings_cap_max_results() {
        let mut config = ClassifierConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            model_ref: "arn:model/1".to_string(),
            region: "us-east-1".to_string(),
            max_results: 50,
            timeout_secs: None,
        };
        assert_eq!(DetectSettings::from_config(&config).max_results, 10);

        config.max_results = 3;
        let settings = DetectSettings::from_config(&config);
        assert_eq!(settings.max_results, 3);
        assert_eq!(settings.model_ref, "arn:model/1");
    }

    #[test]
    fn test_decode_image_padding_and_whitespace() {
        assert_eq!(decode_image("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_image("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_image("aGk").unwrap(), b"hi");
        assert_eq!(decode_image("aGVs\nbG8=").unwrap(), b"hello");
        assert!(decode_image("a").is_err());
        assert!(decode_image("a!b@").is_err());
    }
}
