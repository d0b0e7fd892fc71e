//! ConvertEase Core Library
//!
//! This crate provides the domain models, format registry, error types and
//! configuration shared across all ConvertEase components.

pub mod config;
pub mod error;
pub mod models;
pub mod registry;

// Re-export commonly used types
pub use config::{ApiKeyEntry, Config, StorageBackend};
pub use error::{AppError, ConversionError, ErrorKind, ErrorMetadata, LogLevel};
pub use registry::FormatRegistry;
