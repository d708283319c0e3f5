// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for storage operations.

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// An error from a storage operation.
///
/// This is an opaque error type that can wrap any underlying error from a storage
/// implementation. Use [`std::error::Error::source()`] to access the underlying
/// cause if needed.
///
/// # Example
///
/// ```
/// use memoria_storage::Error;
///
/// let error = Error::from_message("connection reset");
/// assert!(error.to_string().contains("connection reset"));
/// ```
#[derive(Debug, thiserror::Error)]
#[error("storage operation failed: {cause}")]
pub struct Error {
    #[source]
    cause: BoxedCause,
}

impl Error {
    /// Creates a new error from a message or any underlying error.
    pub fn from_message(cause: impl Into<BoxedCause>) -> Self {
        Self { cause: cause.into() }
    }
}

/// A specialized [`Result`] type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
