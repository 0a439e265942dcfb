//! Token Management
//!
//! Client-credentials exchange and token caching.

pub mod manager;

pub use manager::{TokenManager, CLIENT_CREDENTIALS_GRANT};
