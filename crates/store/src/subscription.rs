//! Change subscriptions and validation feeds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ObjectId;

/// Handle of one live watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	pub const fn raw(self) -> u64 {
		self.0
	}
}

/// What a subscription watches on its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionTarget {
	/// Any change to the record.
	Object,
	/// Changes to one attribute or reference.
	Attribute(String),
	/// Validation results reported for the record.
	Validation,
}

/// Payload delivered to a subscription callback.
#[derive(Debug, Clone)]
pub enum StoreNotification {
	Changed,
	Validation(ObjectValidation),
}

/// Callback invoked by the store when a watch fires.
pub type SubscriptionCallback = Arc<dyn Fn(StoreNotification) + Send + Sync>;

/// Request to watch one record.
#[derive(Clone)]
pub struct SubscriptionSpec {
	pub owner: ObjectId,
	pub target: SubscriptionTarget,
	pub callback: SubscriptionCallback,
}

impl fmt::Debug for SubscriptionSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SubscriptionSpec")
			.field("owner", &self.owner)
			.field("target", &self.target)
			.finish_non_exhaustive()
	}
}

/// Field validation errors reported by the host for one record.
///
/// Clones share the same reasons, so a reason taken by one holder is gone for
/// every holder until the next validation cycle reports it again.
#[derive(Debug, Clone)]
pub struct ObjectValidation {
	id: ObjectId,
	reasons: Arc<Mutex<BTreeMap<String, String>>>,
}

impl ObjectValidation {
	pub fn new(id: ObjectId) -> Self {
		Self {
			id,
			reasons: Arc::default(),
		}
	}

	/// Builder form of [`ObjectValidation::add_reason`].
	pub fn with_reason(self, attribute: impl Into<String>, reason: impl Into<String>) -> Self {
		self.add_reason(attribute, reason);
		self
	}

	pub fn id(&self) -> &ObjectId {
		&self.id
	}

	pub fn add_reason(&self, attribute: impl Into<String>, reason: impl Into<String>) {
		self.reasons.lock().insert(attribute.into(), reason.into());
	}

	/// Returns the reason for `attribute` without consuming it.
	pub fn reason(&self, attribute: &str) -> Option<String> {
		self.reasons.lock().get(attribute).cloned()
	}

	/// Returns and removes the reason for `attribute`.
	pub fn take_reason(&self, attribute: &str) -> Option<String> {
		self.reasons.lock().remove(attribute)
	}

	pub fn is_empty(&self) -> bool {
		self.reasons.lock().is_empty()
	}
}
