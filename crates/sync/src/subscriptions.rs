//! Live watches on the bound owner record.

use std::sync::Arc;

use parking_lot::Mutex;
use taglink_store::{
	ObjectId, ObjectStore, ObjectValidation, StoreNotification, SubscriptionCallback, SubscriptionHandle, SubscriptionSpec,
	SubscriptionTarget,
};
use tokio::sync::mpsc;

use crate::scope::OwnerScope;

/// What a fired subscription asks the synchronizer to do.
#[derive(Debug, Clone)]
pub enum SyncEventKind {
	/// The owner record changed.
	OwnerChanged,
	/// The reference attribute changed.
	ReferenceChanged,
	/// The host reported validation results for the owner.
	Validation(ObjectValidation),
}

/// Notification queued by a subscription callback, stamped with the binding
/// generation it was registered under.
#[derive(Debug, Clone)]
pub struct SyncEvent {
	pub generation: u64,
	pub kind: SyncEventKind,
}

/// Sender half of the synchronizer event channel.
pub type SyncEventSender = mpsc::UnboundedSender<SyncEvent>;

/// Receiver half of the synchronizer event channel.
pub type SyncEventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

/// Holds the subscriptions of the currently bound owner.
///
/// Callbacks only enqueue a [`SyncEvent`]; they never touch synchronizer state.
/// A callback whose scope is cancelled drops its notification, and the
/// synchronizer drops queued events of other generations.
pub struct SubscriptionManager {
	store: Arc<dyn ObjectStore>,
	events: SyncEventSender,
	active: Mutex<Vec<SubscriptionHandle>>,
}

impl SubscriptionManager {
	pub fn new(store: Arc<dyn ObjectStore>, events: SyncEventSender) -> Self {
		Self {
			store,
			events,
			active: Mutex::new(Vec::new()),
		}
	}

	/// Replaces all held subscriptions with the three watches of `owner`.
	///
	/// Without an owner, the result is an empty subscription set.
	pub fn bind(&self, owner: Option<&ObjectId>, reference: &str, scope: &OwnerScope) -> usize {
		self.unbind();
		let Some(owner) = owner else {
			return 0;
		};

		let watches = [
			(SubscriptionTarget::Object, self.callback(scope, |_| Some(SyncEventKind::OwnerChanged))),
			(
				SubscriptionTarget::Validation,
				self.callback(scope, |notification| match notification {
					StoreNotification::Validation(validation) => Some(SyncEventKind::Validation(validation)),
					StoreNotification::Changed => None,
				}),
			),
			(
				SubscriptionTarget::Attribute(reference.to_string()),
				self.callback(scope, |_| Some(SyncEventKind::ReferenceChanged)),
			),
		];

		let handles: Vec<SubscriptionHandle> = watches
			.into_iter()
			.map(|(target, callback)| {
				self.store.subscribe(SubscriptionSpec {
					owner: owner.clone(),
					target,
					callback,
				})
			})
			.collect();
		let count = handles.len();
		self.active.lock().extend(handles);
		tracing::debug!(owner = %owner, generation = scope.generation(), count, "Subscribed to owner");
		count
	}

	/// Tears down every held subscription. Returns how many were removed.
	pub fn unbind(&self) -> usize {
		let handles = std::mem::take(&mut *self.active.lock());
		for handle in &handles {
			self.store.unsubscribe(*handle);
		}
		handles.len()
	}

	/// Number of live subscriptions.
	pub fn active(&self) -> usize {
		self.active.lock().len()
	}

	fn callback(&self, scope: &OwnerScope, to_kind: fn(StoreNotification) -> Option<SyncEventKind>) -> SubscriptionCallback {
		let events = self.events.clone();
		let scope = scope.clone();
		Arc::new(move |notification| {
			if scope.is_cancelled() {
				return;
			}
			if let Some(kind) = to_kind(notification) {
				let _ = events.send(SyncEvent {
					generation: scope.generation(),
					kind,
				});
			}
		})
	}
}

impl Drop for SubscriptionManager {
	fn drop(&mut self) {
		self.unbind();
	}
}
