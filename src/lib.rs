//! Implements the FlagLite client
//!
//! The client fetches every flag of a project once on creation, keeps them in
//! an in-memory cache and, unless disabled, refreshes the cache periodically.
//!
//! To change the default request timeout set the FLAGLITE_TIMEOUT_MS
//! environment variable to the desired timeout value.
mod client;
mod http;
mod store;

pub mod error;
pub mod models;
pub use crate::client::Client;
pub use crate::error::FetchError;
