//! Cluster environment detection and authorization resolution.
//!
//! Answers three questions for the host machine: which Kubernetes cluster
//! (if any) the operator is pointed at, whether the current identity can
//! reach it, and what that identity is allowed to do there.

pub mod app;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod rbac;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
