#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Text encodings and download-side re-encoding.
pub mod encoding;
mod error;
/// Local filesystem helpers (collision-free names, file name sanitizing).
pub mod fs;
/// Provider configuration and the memory and Azure providers.
pub mod providers;
/// The [`BlobStore`](store::BlobStore) capability and its records.
pub mod store;
pub mod tasks;
/// Upload-side byte transformation.
pub mod transform;
/// Value records shared by the stores and the tasks.
pub mod types;

#[doc(hidden)]
pub mod prelude;

pub use error::{BoxedError, Error, ErrorKind, Result};

/// Tracing target for local filesystem work.
pub const TRACING_TARGET_FS: &str = "nvisy_blob::fs";

/// Tracing target for provider calls.
pub const TRACING_TARGET_STORE: &str = "nvisy_blob::store";

/// Tracing target for task orchestration.
pub const TRACING_TARGET_TASKS: &str = "nvisy_blob::tasks";
