//! Resync - Container Image Synchronization Library
//!
//! Resync keeps locally stored container images in step with the registries
//! they came from. For every image it compares the local digest with the
//! digest the registry currently serves and, when they differ, backs up the
//! old image, pulls the new one and verifies the result.
//!
//! # Quick Start
//!
//! ```no_run
//! use libresync::{NoProgress, Resync};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resync = Resync::builder().build()?;
//!
//!     let images = vec!["redis:6".to_string(), "nginx:latest".to_string()];
//!     let report = resync.refresh(images, &mut NoProgress).await;
//!
//!     for error in &report.errors {
//!         eprintln!("{}", error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Bearer-token auth**: Endpoint discovery per registry, with Docker
//!   configuration and keychain credentials
//! - **Safe refresh**: Backup tag, pull and digest verification per image
//! - **Bounded concurrency**: Failures and panics stay isolated to their image
//! - **Deduplication report**: Shared build steps and base layers across images
//!
//! # Main Types
//!
//! - [`Resync`] - Main entry point for synchronization runs
//! - [`ResyncBuilder`] - Builder for advanced configuration
//! - [`RunReport`] - Aggregated result of a run
//! - [`ImageIdentity`] - Image reference parsing
//! - [`Config`] - Layered configuration
//!
//! # Architecture
//!
//! - **High-level API** ([`Resync`]) - Recommended for most users
//! - **Low-level modules** - Available for advanced use cases (hidden from docs)

#![warn(clippy::all)]

/// Returns the libresync crate version.
///
/// # Examples
///
/// ```
/// let version = libresync::version();
/// assert!(!version.is_empty());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// High-level public API (main entry point)
mod resync;
pub use resync::{NoProgress, Progress, Resync, ResyncBuilder};

// Re-export commonly used types for convenience
pub use config::Config;
pub use digest::Digest;
pub use error::{Result, ResyncError};
pub use reference::ImageIdentity;
pub use scheduler::{ItemFailure, ItemLog, LineKind, WorkItem};
pub use stats::{ReportMode, RunReport, RunStats};

// Low-level implementation modules (hidden from docs but still public)
#[doc(hidden)]
pub mod auth;
#[doc(hidden)]
pub mod client;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod context;
#[doc(hidden)]
pub mod dedup;
#[doc(hidden)]
pub mod digest;
#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod format;
#[doc(hidden)]
pub mod memo;
#[doc(hidden)]
pub mod processor;
#[doc(hidden)]
pub mod reference;
#[doc(hidden)]
pub mod registry;
#[doc(hidden)]
pub mod scheduler;
#[doc(hidden)]
pub mod stats;
#[doc(hidden)]
pub mod store;
#[doc(hidden)]
pub mod sync;
