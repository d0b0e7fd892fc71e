//! Converter backends for ConvertEase
//!
//! Every backend implements [`Converter`]. Work is synchronous and CPU-bound,
//! so callers run it on a blocking thread.

pub mod registry;
pub mod traits;
pub mod validator;

#[cfg(feature = "image")]
pub mod image;

#[cfg(feature = "document")]
pub mod document;

pub use registry::ConverterRegistry;
pub use traits::{ConversionRequest, ConvertedOutput, Converter};
pub use validator::{
    check_declared_type, sanitize_filename, sniff, SniffedKind, ValidationError, SNIFF_LEN,
};

#[cfg(feature = "document")]
pub use self::document::{DocumentConverter, TextDocument};
#[cfg(feature = "image")]
pub use self::image::ImageConverter;
