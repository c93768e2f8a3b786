//! Error Types
//!
//! This module defines the error types produced while binding glTF buffers.
//!
//! # Overview
//!
//! The main error type [`Error`] covers every way a load pass can fail:
//! - URIs that are neither inline base64 data nor a relative file path
//! - Buffer bindings without a destination
//! - Base64 payloads that fail to decode
//! - Files that cannot be read
//!
//! The `Display` text of each variant is the line written to the error log
//! when the load pass aborts.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_gltfio::errors::{Error, Result};
//!
//! fn load() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The error type for resource binding.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The URI is neither cached, a base64 data URI, nor a relative file path.
    #[error("Unable to obtain resource: {0}")]
    UnresolvableResource(String),

    /// The binding carries no destination.
    #[error("Malformed binding: {0}")]
    MalformedBinding(String),

    /// The binding's byte range does not fit inside the loaded blob.
    #[error("Binding range {offset}..{end} exceeds the {len} bytes of {uri}")]
    BindingOutOfRange {
        /// URI of the blob
        uri: String,
        /// First byte of the binding
        offset: usize,
        /// One past the last byte of the binding
        end: usize,
        /// Size of the loaded blob
        len: usize,
    },

    // ========================================================================
    // Decode & I/O Errors
    // ========================================================================
    /// Base64 payload decoding error.
    #[error("Unable to parse base64 URL. {reason}")]
    Base64Decode {
        /// URI of the data
        uri: String,
        /// What went wrong
        reason: String,
    },

    /// File could not be read (or is shorter than the declared size).
    #[error("Unable to consume {uri}: {source}")]
    FileRead {
        /// URI as declared by the asset
        uri: String,
        #[source]
        source: std::io::Error,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings document could not be parsed.
    #[error("Invalid binder settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
