//! HTTP-shaped input and output of the detector

use serde_json::{json, Value};

/// Headers sent with every detector response
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Content-Type", "application/json"),
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "OPTIONS,POST,GET"),
];

/// Request as seen by the detector
#[derive(Debug, Clone, Default)]
pub struct ApiEvent {
    pub http_method: String,
    /// Raw JSON text (`Value::String`) or an already-parsed document
    pub body: Option<Value>,
}

impl ApiEvent {
    pub fn new(http_method: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            http_method: http_method.into(),
            body,
        }
    }

    /// Event carrying the body text exactly as it came off the wire
    pub fn from_raw(http_method: impl Into<String>, raw: String) -> Self {
        let body = if raw.is_empty() {
            None
        } else {
            Some(Value::String(raw))
        };
        Self::new(http_method, body)
    }

    pub fn is_preflight(&self) -> bool {
        self.http_method.eq_ignore_ascii_case("OPTIONS")
    }
}

/// Response produced by the detector; headers are always [`CORS_HEADERS`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
}

impl ApiResponse {
    /// 200 with an empty body
    pub const fn preflight() -> Self {
        Self {
            status_code: 200,
            body: String::new(),
        }
    }

    pub fn json(status_code: u16, body: &Value) -> Self {
        Self {
            status_code,
            body: body.to_string(),
        }
    }

    pub fn error(status_code: u16, message: &str) -> Self {
        Self::json(status_code, &json!({ "error": message }))
    }

    pub const fn headers(&self) -> &'static [(&'static str, &'static str)] {
        &CORS_HEADERS
    }
}
