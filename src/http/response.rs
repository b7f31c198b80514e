//! HTTP response building module
//!
//! Every response this service sends is JSON (or empty) and carries the CORS
//! headers of the detector contract, so browser clients can read errors too.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use serde_json::json;

use crate::detect::ApiResponse;

/// Convert a detector response into a hyper response
pub fn build_api_response(api: &ApiResponse, server_name: &str) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(api.status_code)
        .header("Server", server_name);
    for (name, value) in api.headers() {
        builder = builder.header(*name, *value);
    }

    builder
        .body(Full::new(Bytes::from(api.body.clone())))
        .unwrap_or_else(|e| {
            log_build_error(&api.status_code.to_string(), &e);
            fallback_response()
        })
}

/// Build a JSON error response `{"error": message}`
pub fn build_error_response(status: u16, message: &str, server_name: &str) -> Response<Full<Bytes>> {
    build_api_response(&ApiResponse::error(status, message), server_name)
}

/// Build 404 Not Found response
pub fn build_404_response(server_name: &str) -> Response<Full<Bytes>> {
    build_error_response(404, "Not Found", server_name)
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str, server_name: &str) -> Response<Full<Bytes>> {
    let mut response = build_error_response(405, "Method Not Allowed", server_name);
    if let Ok(value) = allow.parse() {
        response.headers_mut().insert(hyper::header::ALLOW, value);
    }
    response
}

/// Build 408 Request Timeout response
pub fn build_408_response(server_name: &str) -> Response<Full<Bytes>> {
    build_error_response(408, "Request timeout", server_name)
}

/// Build 413 Payload Too Large response
pub fn build_413_response(server_name: &str) -> Response<Full<Bytes>> {
    build_error_response(413, "Payload too large", server_name)
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(server_name: &str) -> Response<Full<Bytes>> {
    build_api_response(&ApiResponse::preflight(), server_name)
}

/// Build health check response
pub fn build_health_response(server_name: &str) -> Response<Full<Bytes>> {
    build_api_response(&ApiResponse::json(200, &json!({"status": "ok"})), server_name)
}

fn fallback_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(r#"{"error":"Internal server error"}"#)));
    *response.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
