// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Store error types.

use crate::tuple::TupleError;

/// Errors that can occur in store and transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested key does not exist.
    #[error("key not found")]
    NotFound,

    /// A write operation was attempted on a read-only transaction.
    #[error("transaction not opened for writing")]
    ReadOnlyTx,

    /// The backend does not support watch transactions.
    #[error("watch operations not supported on this store")]
    WatchUnsupported,

    /// An index entry that should have existed was missing.
    #[error("an index entry was unexpectedly missing")]
    UnexpectedlyMissingEntry,

    /// An index entry that should not have existed was present.
    #[error("an index entry was unexpectedly present")]
    UnexpectedlyPresentEntry,

    /// The indexer function returned entries for the zero pair.
    #[error("indexer function must return an empty list for the zero pair")]
    BadIndexer,

    #[error("tuple error: {0}")]
    Tuple(#[from] TupleError),

    #[error("file backend error: {0}")]
    File(#[from] redb::Error),

    #[error("sql backend error: {0}")]
    Sql(#[from] postgres::Error),

    /// The SQL server is older than the minimum supported release.
    #[error("sql server too old, got {version}, need >= 9.1")]
    SqlServerTooOld { version: String },

    /// The SQL server reported a version string that could not be
    /// parsed.
    #[error("couldn't parse sql server version {version:?}")]
    SqlVersionUnparsed { version: String },

    /// No backend with the given name has been registered.
    #[error("store backend not registered: {0}")]
    UnknownBackend(String),
}

impl Error {
    /// Returns true for [`Error::NotFound`].
    ///
    /// Handy in transaction closures that treat absence as success.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
