//! Audio-related types and utilities
pub mod formats;
pub mod math;
pub mod metadata;
