//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod gemini;
pub mod http;
pub mod pollinations;
pub mod storage;
pub mod telemetry;
