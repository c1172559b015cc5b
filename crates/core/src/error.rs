// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tally-core operations.

use thiserror::Error;

/// All possible errors that can occur in tally-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("record not found: {collection}/{id}")]
    RecordNotFound { collection: String, id: String },

    #[error("queued request not found: {0}")]
    RequestNotFound(i64),

    #[error("invalid method: '{0}'\n  hint: valid methods are: POST, PUT, DELETE, PATCH")]
    InvalidMethod(String),

    #[error(
        "invalid entity: '{0}'\n  \
         hint: valid entities are: product, customer, sale, purchase, supplier"
    )]
    InvalidEntity(String),

    #[error("invalid record id: '{0}'")]
    InvalidRecordId(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for tally-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
