//! Routing-performance statistics.
//!
//! Per-call outcomes are joined from the call and classification stores,
//! aggregated over date windows (day, ISO week, rolling days or months),
//! and optionally published as JSON to S3.

pub mod aggregate;
pub mod analyzer;
pub mod types;
pub mod utility;
pub mod window;
pub mod writetos3;
