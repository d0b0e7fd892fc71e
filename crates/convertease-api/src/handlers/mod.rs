//! HTTP handlers, one module per resource.

pub mod conversions;
pub mod formats;
pub mod uploads;
