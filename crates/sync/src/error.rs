use taglink_store::StoreError;
use thiserror::Error;

use crate::scope::Cancelled;

/// Errors returned by the tag synchronizer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
	/// The tag limit is reached. Raised locally, without a store round trip.
	#[error("{message}")]
	LimitExceeded { limit: usize, message: String },

	/// The value is already displayed. Raised locally, without a store round trip.
	#[error("Duplicate {0}")]
	DuplicateTag(String),

	/// The submitted value is blank.
	#[error("tag value is empty")]
	EmptyTag,

	/// No owner is bound, editing is disabled, or the reference is read-only.
	#[error("tag list is read-only")]
	ReadOnly,

	#[error("no owner record is bound")]
	NotBound,

	/// A query, create or commit failed. The optimistic projection is kept
	/// unless rollback is configured.
	#[error("{operation} failed: {source}")]
	StoreOperationFailed {
		operation: &'static str,
		#[source]
		source: StoreError,
	},

	/// The owner binding changed while the operation was in flight.
	#[error("operation cancelled: owner binding changed")]
	Cancelled,
}

impl From<Cancelled> for SyncError {
	fn from(_: Cancelled) -> Self {
		Self::Cancelled
	}
}

/// Result type for synchronizer operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
