//! logstd - log-rotate standard input into size-bounded files
//!
//! This library provides the core functionality for the logstd binary.

pub mod app;
pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod logger;
pub mod logging;
pub mod rotation;
