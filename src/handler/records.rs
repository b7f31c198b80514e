//! Record lookup route: `GET /records/{id}`

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use uuid::Uuid;

use crate::config::AppState;
use crate::detect::ApiResponse;
use crate::http;
use crate::logger;
use crate::store::Record;

pub const RECORDS_PREFIX: &str = "/records/";

/// Read one record back, numbers restored to JSON numbers
pub async fn lookup(raw_id: &str, query: Option<&str>, state: &AppState) -> Response<Full<Bytes>> {
    let server_name = &state.config.http.server_name;
    let Ok(id) = Uuid::parse_str(raw_id) else {
        return http::build_error_response(400, "Invalid record id", server_name);
    };

    let item = match state.store.get(&id.to_string()).await {
        Ok(Some(item)) => item,
        Ok(None) => return http::build_error_response(404, "Record not found", server_name),
        Err(e) => {
            logger::log_error(&format!("[Records] Failed to read {id}: {e}"));
            return http::build_error_response(500, &e.to_string(), server_name);
        }
    };

    match Record::from_item(&item) {
        Ok(record) => {
            let body = record.to_json(include_image(query));
            http::build_api_response(&ApiResponse::json(200, &body), server_name)
        }
        Err(e) => {
            logger::log_error(&format!("[Records] Stored item {id} is unreadable: {e}"));
            http::build_error_response(500, &e.to_string(), server_name)
        }
    }
}

fn include_image(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .any(|(key, value)| key == "include_image" && matches!(value, "true" | "1"))
    })
}
