//! assetpack - static asset discovery and webpack build orchestration
//!
//! Collects static files from project and application directories, renders a
//! webpack config that copies them into the build output, drives `yarn` and
//! webpack as subprocesses, and serves the result during development.

pub mod assets;
pub mod config;
pub mod env_vars;
pub mod error;
pub mod logging;
pub mod serve;
pub mod static_url;
pub mod webpack;
