//! Record snapshots and identifiers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Stable identifier of a store record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
	/// Wraps a raw identifier.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Returns the raw identifier.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ObjectId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for ObjectId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// Live record instance shared between the host and the synchronizer.
pub type SharedRecord = Arc<RwLock<Record>>;

/// Snapshot of one store record.
///
/// Attributes are string valued. Reference sets are ordered and never hold the
/// same identifier twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
	id: ObjectId,
	entity: String,
	attributes: BTreeMap<String, String>,
	references: BTreeMap<String, Vec<ObjectId>>,
	readonly: BTreeSet<String>,
}

impl Record {
	/// Creates an empty record.
	pub fn new(id: impl Into<ObjectId>, entity: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			entity: entity.into(),
			attributes: BTreeMap::new(),
			references: BTreeMap::new(),
			readonly: BTreeSet::new(),
		}
	}

	/// Builder form of [`Record::set`].
	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.set(name, value);
		self
	}

	/// Builder form of [`Record::add_reference`].
	pub fn with_reference(mut self, name: impl Into<String>, id: impl Into<ObjectId>) -> Self {
		self.add_reference(name, id.into());
		self
	}

	/// Wraps the record for sharing.
	pub fn into_shared(self) -> SharedRecord {
		Arc::new(RwLock::new(self))
	}

	pub fn id(&self) -> &ObjectId {
		&self.id
	}

	pub fn entity(&self) -> &str {
		&self.entity
	}

	/// Returns an attribute value.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}

	/// Sets an attribute value.
	pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.attributes.insert(name.into(), value.into());
	}

	/// Returns the identifiers held under reference `name`, in order.
	pub fn references(&self, name: &str) -> &[ObjectId] {
		self.references.get(name).map(Vec::as_slice).unwrap_or_default()
	}

	/// Appends `id` to reference `name`. Returns `false` if it was already present.
	pub fn add_reference(&mut self, name: impl Into<String>, id: ObjectId) -> bool {
		let ids = self.references.entry(name.into()).or_default();
		if ids.contains(&id) {
			return false;
		}
		ids.push(id);
		true
	}

	/// Inserts `id` into reference `name` at `index`, clamped to its length.
	/// Returns `false` if it was already present.
	pub fn insert_reference(&mut self, name: impl Into<String>, index: usize, id: ObjectId) -> bool {
		let ids = self.references.entry(name.into()).or_default();
		if ids.contains(&id) {
			return false;
		}
		ids.insert(index.min(ids.len()), id);
		true
	}

	/// Removes `ids` from reference `name`. Returns how many were removed.
	pub fn remove_references(&mut self, name: &str, ids: &[ObjectId]) -> usize {
		let Some(held) = self.references.get_mut(name) else {
			return 0;
		};
		let before = held.len();
		held.retain(|id| !ids.contains(id));
		before - held.len()
	}

	/// Returns true if reference `name` holds `id`.
	pub fn has_reference(&self, name: &str, id: &ObjectId) -> bool {
		self.references(name).contains(id)
	}

	/// Returns true if any reference set of this record holds `id`.
	pub fn is_referenced(&self, id: &ObjectId) -> bool {
		self.references.values().any(|ids| ids.contains(id))
	}

	/// Marks or unmarks an attribute or reference as read-only for the current user.
	pub fn set_readonly_attr(&mut self, name: impl Into<String>, readonly: bool) {
		let name = name.into();
		if readonly {
			self.readonly.insert(name);
		} else {
			self.readonly.remove(&name);
		}
	}

	pub fn is_readonly_attr(&self, name: &str) -> bool {
		self.readonly.contains(name)
	}
}
