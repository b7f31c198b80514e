//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body size limits, route matching,
//! dispatch and access logging.

use crate::config::{AppState, Config};
use crate::detect::{ApiEvent, ApiResponse};
use crate::handler::records::{self, RECORDS_PREFIX};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const HEALTH_PATH: &str = "/healthz";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response plus the record it created, for the access log
struct Routed {
    response: Response<Full<Bytes>>,
    record_id: Option<String>,
}

impl From<Response<Full<Bytes>>> for Routed {
    fn from(response: Response<Full<Bytes>>) -> Self {
        Self {
            response,
            record_id: None,
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let start = Instant::now();
    let entry = state.access_log_enabled().then(|| access_entry(&req, peer));

    let routed = route_request(req, &state).await;

    if let Some(mut entry) = entry {
        entry.status = routed.response.status().as_u16();
        entry.body_bytes = routed
            .response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.record_id = routed.record_id;
        entry.request_time_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(routed.response)
}

fn access_entry<B>(req: &Request<B>, peer: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        hyper::Version::HTTP_10 => "1.0",
        _ => "1.1",
    }
    .to_string();
    entry.user_agent = req
        .headers()
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    entry
}

/// Route request based on path and method
async fn route_request<B>(req: Request<B>, state: &AppState) -> Routed
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let server_name = &state.config.http.server_name;
    let path = req.uri().path();

    // 1. Detector (handles its own preflight)
    if path == state.config.http.detect_path {
        return detect(req, state).await;
    }

    // 2. Preflight for every other path
    if req.method() == Method::OPTIONS {
        return http::build_options_response(server_name).into();
    }

    // 3. Health check
    if path == HEALTH_PATH {
        return match req.method() {
            &Method::GET | &Method::HEAD => http::build_health_response(server_name),
            method => method_not_allowed(method, server_name),
        }
        .into();
    }

    // 4. Record lookup
    if let Some(id) = path.strip_prefix(RECORDS_PREFIX) {
        if req.method() != Method::GET {
            return method_not_allowed(req.method(), server_name).into();
        }
        return records::lookup(id, req.uri().query(), state).await.into();
    }

    http::build_404_response(server_name).into()
}

fn method_not_allowed(method: &Method, server_name: &str) -> Response<Full<Bytes>> {
    logger::log_warning(&format!("Method not allowed: {method}"));
    http::build_405_response("GET, OPTIONS", server_name)
}

async fn detect<B>(req: Request<B>, state: &AppState) -> Routed
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let server_name = &state.config.http.server_name;
    let max_body_size = state.config.http.max_body_size;

    if let Some(resp) = check_body_size(&req, max_body_size, server_name) {
        return resp.into();
    }

    let method = req.method().to_string();
    let body = match read_body(req.into_body(), &state.config).await {
        Ok(body) => body,
        Err(resp) => return resp.into(),
    };

    let event = ApiEvent::from_raw(method, String::from_utf8_lossy(&body).into_owned());
    let api = state.detector.handle(event).await;
    Routed {
        record_id: created_record_id(&api),
        response: http::build_api_response(&api, server_name),
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(
    req: &Request<B>,
    max_body_size: u64,
    server_name: &str,
) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get(hyper::header::CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response(server_name))
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Collect the body, enforcing the size limit on the bytes actually received
/// and `performance.read_timeout` on how long receiving them may take
async fn read_body<B>(body: B, config: &Config) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let server_name = &config.http.server_name;
    let max_body_size = config.http.max_body_size;
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let collect = Limited::new(body, limit).collect();

    let collected = if config.performance.read_timeout > 0 {
        let read_timeout = Duration::from_secs(config.performance.read_timeout);
        match tokio::time::timeout(read_timeout, collect).await {
            Ok(collected) => collected,
            Err(_) => {
                logger::log_warning(&format!(
                    "Request body not received within {} seconds",
                    read_timeout.as_secs()
                ));
                return Err(http::build_408_response(server_name));
            }
        }
    } else {
        collect.await
    };

    match collected {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_error(&format!("Request body exceeded {max_body_size} bytes"));
            Err(http::build_413_response(server_name))
        }
        Err(e) => {
            logger::log_error(&format!("Failed to read request body: {e}"));
            Err(http::build_error_response(
                400,
                "Failed to read request body",
                server_name,
            ))
        }
    }
}

/// Id of the record a successful detection stored
fn created_record_id(api: &ApiResponse) -> Option<String> {
    if api.status_code != 200 || api.body.is_empty() {
        return None;
    }
    let body: serde_json::Value = serde_json::from_str(&api.body).ok()?;
    body.get("id")?.as_str().map(ToString::to_string)
}
