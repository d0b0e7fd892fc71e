//! ConvertEase Storage Library
//!
//! Storage abstraction for staged uploads and converted results, with an
//! in-memory backend and a local filesystem backend.
//!
//! # Storage key format
//!
//! - **Staged uploads**: `uploads/{client}/{upload_id}`
//! - **Results**: `results/{client}/{job_id}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use convertease_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult, StorageStream};
