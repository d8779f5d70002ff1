//! Data models for the encrypted object-store service.
//!
//! The catalog persists these records as a single JSON array; they serialize
//! naturally via `serde` and double as API response bodies.

pub mod metadata;
