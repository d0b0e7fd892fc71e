//! ConvertEase HTTP API
//!
//! Upload a file, queue a conversion to another format, poll the job and
//! download the result before it expires. All routes live under
//! [`constants::API_PREFIX`].

pub mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use state::AppState;
