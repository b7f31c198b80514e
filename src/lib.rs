//! Image detection service
//!
//! Accepts base64 images over HTTP, stores each request as a record, asks a
//! remote custom-label classifier what the image shows and stores the answer
//! alongside the record.

pub mod classifier;
pub mod config;
pub mod detect;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod store;

#[cfg(test)]
mod testing;
