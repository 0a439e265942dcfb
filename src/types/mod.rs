//! Reports Types
//!
//! Configuration and token data structures.

pub mod config;
pub mod token;

pub use config::*;
pub use token::*;
