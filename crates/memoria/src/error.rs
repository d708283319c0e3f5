// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Failure of a multi-tier call.
///
/// `E` is the wrapped operation's own error type.
#[derive(Debug, thiserror::Error)]
pub enum MultiError<E> {
    /// The wrapped operation failed. Nothing was written back.
    #[error("operation failed: {0}")]
    Operation(#[source] E),

    /// The wrapped operation returned a different number of results than it
    /// was given items. Nothing was written back.
    #[error("input and output have different sizes: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Number of items passed to the operation.
        expected: usize,
        /// Number of results the operation returned.
        actual: usize,
    },

    /// Writing to a tier failed and no write-error listener was configured.
    #[error("writing to a cache tier failed")]
    Storage(#[source] memoria_storage::Error),
}

impl<E> MultiError<E> {
    /// Returns the operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }
}
