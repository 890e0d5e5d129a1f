//! What's That Bird identification service
//!
//! This library provides the core of the whats-that-bird API: photos are
//! stored in S3-compatible object storage, submitted to a remote YOLO
//! inference job queue, polled until the job ends, and normalized into a
//! list of species with confidence scores.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

pub use routes::{build_router, RouterOptions};
