/// DID Registry
///
/// Stores W3C DID documents as versioned, moderated records: each DID owns a
/// chain of document versions, each version moves through a small lifecycle,
/// and lifecycle events notify the parties involved.

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod did;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod notify;

pub use error::{RegistryError, RegistryResult, ValidationError};
