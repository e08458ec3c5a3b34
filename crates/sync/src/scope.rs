use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation clock for owner bindings.
#[derive(Debug, Default)]
pub(crate) struct GenerationClock {
	next: AtomicU64,
}

impl GenerationClock {
	/// Returns the next generation ID, starting at 1.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// The owner scope was cancelled before the guarded future completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("owner scope cancelled")]
pub struct Cancelled;

/// Generation-scoped cancellation token for one owner binding.
///
/// Every store round trip issued on behalf of a binding runs under its scope.
/// Rebinding or unbinding cancels the scope, so a late completion can never
/// mutate state that now belongs to another owner.
#[derive(Debug, Clone)]
pub struct OwnerScope {
	generation: u64,
	cancel: CancellationToken,
}

impl OwnerScope {
	pub(crate) fn new(generation: u64) -> Self {
		Self {
			generation,
			cancel: CancellationToken::new(),
		}
	}

	/// Returns generation ID.
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Drives `fut` to completion unless the scope is cancelled first.
	///
	/// Cancellation wins ties: an already-cancelled scope never polls `fut`.
	pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(Cancelled),
			output = fut => Ok(output),
		}
	}
}
