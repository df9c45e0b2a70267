//! Provider-agnostic media storage
//!
//! Validates user-submitted files, derives safe identifiers, and stores them
//! through one interchangeable backend (an S3-compatible object store or a
//! transform-capable media CDN) chosen once at startup.

pub mod config;
pub mod error;
pub mod facade;
pub mod filename;
pub mod mime;
pub mod models;
pub mod provider;
pub mod validator;

pub use config::StorageConfig;
pub use error::{Error, Result, ValidationError};
pub use facade::StorageFacade;
