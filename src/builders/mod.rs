//! Builders
//!
//! Fluent configuration construction.

pub mod config;

pub use config::{
    reports_config, ReportsConfigBuilder, DEFAULT_USER_AGENT, DEFAULT_WEBSITE_ID,
    WEBSITE_ID_HEADER,
};
