// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::sync::RemoteError;

/// All possible errors that can occur in the tallyrs library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not initialized: run 'tally init' first")]
    NotInitialized,

    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error(
        "failed request not found: {0}\n  hint: run 'tally queue --failed' to list failed requests"
    )]
    FailedRequestNotFound(i64),

    #[error(
        "record {id} is still being created on the server\n  hint: run 'tally sync' and try again"
    )]
    Unconfirmed { id: String },

    #[error("invalid body: {reason}\n  hint: pass a JSON object, e.g. '{{\"name\": \"Widget\"}}'")]
    InvalidBody { reason: String },

    #[error("unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Core(#[from] tally_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// A specialized Result type for tallyrs operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
