//! Image conversion backend
//!
//! Pipeline: decode → auto-orient → resize → flatten → encode → metadata.

pub mod encode;
pub mod metadata;
pub mod orientation;
pub mod resize;
pub mod transformer;

pub use encode::ImageEncoder;
pub use metadata::ImageMetadata;
pub use orientation::ImageOrientation;
pub use resize::ImageResize;
pub use transformer::ImageConverter;
