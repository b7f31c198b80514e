//! Request handler module
//!
//! Routes requests to the detector, the record lookup and the health check.

mod records;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
