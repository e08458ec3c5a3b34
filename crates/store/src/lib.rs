//! Object store contract for the tag synchronizer.
//!
//! The synchronizer never owns persistence. Everything it reads or writes goes
//! through an [`ObjectStore`]: queries over tag entities, creation of new tag
//! records, commits of the owner record after its reference set changed,
//! change subscriptions, and post-change workflow invocation.
//!
//! Records are plain snapshots ([`Record`]). The live owner instance that the
//! host and the synchronizer both look at is a [`SharedRecord`].
//!
//! ## Cargo features
//!
//! - `memory`: [`memory::MemoryStore`], an in-process store with a call log and
//!   failure injection. Used by tests and by hosts without a real backend.
//!   *Disabled by default.*

pub mod error;
pub mod query;
pub mod record;
pub mod subscription;
pub mod workflow;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

use async_trait::async_trait;
pub use error::{Result, StoreError};
pub use query::{Query, QueryFilter};
pub use record::{ObjectId, Record, SharedRecord};
pub use subscription::{ObjectValidation, StoreNotification, SubscriptionCallback, SubscriptionHandle, SubscriptionSpec, SubscriptionTarget};
pub use workflow::{FlowDescriptor, WorkflowContext};

/// Asynchronous client of the backing object store.
///
/// Implementations must be cheap to share behind an `Arc`. Subscription
/// callbacks may be invoked from inside other store operations, so they must
/// not block.
#[async_trait]
pub trait ObjectStore: Send + Sync {
	/// Returns every committed record matching `query`.
	async fn query(&self, query: &Query) -> Result<Vec<Record>>;

	/// Creates a new, uncommitted record of `entity`.
	async fn create(&self, entity: &str) -> Result<Record>;

	/// Persists `record`.
	async fn commit(&self, record: &Record) -> Result<()>;

	/// Registers a watch and returns its handle.
	fn subscribe(&self, spec: SubscriptionSpec) -> SubscriptionHandle;

	/// Removes a watch. Unknown handles are ignored.
	fn unsubscribe(&self, handle: SubscriptionHandle);

	/// Invokes a named server-side action.
	async fn run_action(&self, name: &str, context: &WorkflowContext) -> Result<()>;

	/// Invokes a parameterized flow.
	async fn run_flow(&self, flow: &FlowDescriptor, context: &WorkflowContext) -> Result<()>;
}

/// Sink for non-blocking, user-visible notifications.
pub trait NotificationSink: Send + Sync {
	/// Reports an error to the user without interrupting them.
	fn error(&self, message: &str);
}

/// Notification sink that forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
	fn error(&self, message: &str) {
		tracing::error!(target: "taglink::notify", "{message}");
	}
}
