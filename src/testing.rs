//! Test doubles for the detector's collaborators

use async_trait::async_trait;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crate::classifier::{Classification, Classifier, ClassifierError, Label};
use crate::config::Config;
use crate::store::{Item, MemoryStore, RecordStore, StoreError};

/// Memory store that remembers every `put` attempt and can fail one of them
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    puts: Mutex<Vec<Item>>,
    /// 1-based index of the put that fails
    fail_on_put: Option<usize>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(put: usize) -> Self {
        Self {
            fail_on_put: Some(put),
            ..Self::default()
        }
    }

    /// Every item passed to `put`, including the one that failed
    pub fn puts(&self) -> Vec<Item> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn put(&self, item: Item) -> Result<(), StoreError> {
        let attempt = {
            let mut puts = self.puts.lock().unwrap();
            puts.push(item.clone());
            puts.len()
        };
        if self.fail_on_put == Some(attempt) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "store unreachable",
            )));
        }
        self.inner.put(item).await
    }

    async fn get(&self, id: &str) -> Result<Option<Item>, StoreError> {
        self.inner.get(id).await
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// What the scripted classifier answers
pub enum Script {
    Labels(Vec<Label>),
    InvalidFormat,
    Unavailable,
}

/// One recorded classifier call: image bytes, model ref, max results
pub type ClassifyCall = (Vec<u8>, String, u32);

pub struct ScriptedClassifier {
    script: Script,
    calls: Mutex<Vec<ClassifyCall>>,
    /// How long each call takes before answering
    delay: Option<Duration>,
}

impl ScriptedClassifier {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn labels(labels: &[(&str, f64)]) -> Self {
        Self::new(Script::Labels(
            labels
                .iter()
                .map(|(name, confidence)| Label::new(*name, *confidence))
                .collect(),
        ))
    }

    pub fn calls(&self) -> Vec<ClassifyCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        image: &[u8],
        model_ref: &str,
        max_results: u32,
    ) -> Result<Classification, ClassifierError> {
        self.calls
            .lock()
            .unwrap()
            .push((image.to_vec(), model_ref.to_string(), max_results));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            Script::Labels(labels) => Ok(Classification {
                labels: labels.clone(),
                ..Classification::default()
            }),
            Script::InvalidFormat => Err(ClassifierError::InvalidImageFormat(
                "Request has invalid image format".to_string(),
            )),
            Script::Unavailable => Err(ClassifierError::Service {
                status: 503,
                kind: "ServiceUnavailable".to_string(),
                message: "try later".to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Default configuration, no config file involved
pub fn config() -> Config {
    let missing = std::env::temp_dir().join("image-detect-test-no-config");
    Config::load_from(&missing.display().to_string()).unwrap()
}
