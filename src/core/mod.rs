//! Reports Core Components
//!
//! HTTP transport and time sources shared by the token manager and client.

pub mod clock;
pub mod transport;

pub use clock::*;
pub use transport::*;
