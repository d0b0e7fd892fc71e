//! Data models for the application
//!
//! Formats, tiers, uploads, jobs and results shared by every crate.

mod client;
mod format;
mod job;
mod result;
mod settings;
mod tier;
mod upload;

pub use client::*;
pub use format::*;
pub use job::*;
pub use result::*;
pub use settings::*;
pub use tier::*;
pub use upload::*;
