//! Error types for pyramid construction and tile fetching.
//!
//! Construction problems surface to the caller as [`PyramidError`]. Per-layer
//! fetch failures are [`FetchError`]s; they never leave the node that issued
//! the fetch, which records them as a load error and carries on.

use thiserror::Error;

use crate::config::GeometryType;

/// Errors that can occur while building a [`crate::TilePyramid`].
#[derive(Debug, Error)]
pub enum PyramidError {
    /// The content description asks for a geometry the pyramid cannot lay out.
    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometry(GeometryType),

    /// The image description is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No Tokio runtime was available to run background fetches.
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Errors that can occur while fetching one layer of a tile.
///
/// `Clone` so that test fetchers can hand out the same failure repeatedly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read.
    #[error("Failed to read response body: {0}")]
    Body(String),
}
