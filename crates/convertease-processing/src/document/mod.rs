//! Document conversion backend
//!
//! Sources are read into a plain-text [`TextDocument`] and rendered by the
//! target's writer. Same-family conversions pass the bytes through.

pub mod model;
pub mod readers;
pub mod transformer;
pub mod writers;

pub use model::TextDocument;
pub use transformer::{DocumentConverter, DocumentFamily};
