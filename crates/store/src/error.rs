//! Store error types.

use thiserror::Error;

use crate::ObjectId;

/// Errors reported by an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
	/// The referenced record does not exist.
	#[error("object not found: {0}")]
	NotFound(ObjectId),

	/// The store refused the operation (validation, security, conflict).
	#[error("{0}")]
	Rejected(String),

	/// The constraint expression cannot be evaluated by this store.
	#[error("unsupported constraint: {0}")]
	UnsupportedConstraint(String),

	/// Transport or backend failure.
	#[error("backend error: {0}")]
	Backend(String),
}

/// Result type for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
