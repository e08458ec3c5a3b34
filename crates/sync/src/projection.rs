//! Local, optimistic projection of the owner's reference set.

/// Store-side state of one displayed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStatus {
	/// Shown optimistically; its store sequence has not finished.
	Pending,
	/// Reflected by the committed reference set.
	Committed,
	/// Its store sequence failed and the projection was not rolled back.
	Failed,
}

/// One displayed tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
	pub value: String,
	pub status: TagStatus,
}

impl TagEntry {
	fn new(value: impl Into<String>, status: TagStatus) -> Self {
		Self {
			value: value.into(),
			status,
		}
	}
}

/// Ordered tag values of the bound owner.
///
/// One entry per reference, so reloaded values may repeat (unresolved
/// references all show as `""`). Values added locally are unique. Values whose
/// detach is queued but not yet committed are tracked separately so a reload
/// landing in between does not bring them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagListState {
	entries: Vec<TagEntry>,
	detaching: Vec<String>,
}

impl TagListState {
	/// Builds a projection of committed values, one entry per value.
	pub fn from_committed<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut state = Self::default();
		state.rebuild(values.into_iter().map(Into::into).collect());
		state
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn contains(&self, value: &str) -> bool {
		self.position(value).is_some()
	}

	pub fn position(&self, value: &str) -> Option<usize> {
		self.entries.iter().position(|entry| entry.value == value)
	}

	pub fn status(&self, value: &str) -> Option<TagStatus> {
		self.entries.iter().find(|entry| entry.value == value).map(|entry| entry.status)
	}

	pub fn entries(&self) -> &[TagEntry] {
		&self.entries
	}

	pub fn values(&self) -> Vec<String> {
		self.entries.iter().map(|entry| entry.value.clone()).collect()
	}

	pub fn is_detaching(&self, value: &str) -> bool {
		self.detaching.iter().any(|held| held == value)
	}

	pub(crate) fn push_pending(&mut self, value: &str) {
		debug_assert!(!self.contains(value), "duplicate values must be rejected before projection");
		self.entries.push(TagEntry::new(value, TagStatus::Pending));
	}

	pub(crate) fn set_status(&mut self, value: &str, status: TagStatus) -> bool {
		match self.entries.iter_mut().find(|entry| entry.value == value) {
			Some(entry) => {
				entry.status = status;
				true
			}
			None => false,
		}
	}

	pub(crate) fn remove(&mut self, value: &str) -> Option<(usize, TagEntry)> {
		let index = self.position(value)?;
		Some((index, self.entries.remove(index)))
	}

	/// Reinserts an entry at `index`, clamped to the current length.
	pub(crate) fn restore(&mut self, index: usize, entry: TagEntry) {
		if self.contains(&entry.value) {
			return;
		}
		let index = index.min(self.entries.len());
		self.entries.insert(index, entry);
	}

	/// Removes `value` from display and remembers that its detach is queued.
	pub(crate) fn begin_detach(&mut self, value: &str) -> Option<(usize, TagEntry)> {
		let removed = self.remove(value)?;
		self.detaching.push(value.to_string());
		Some(removed)
	}

	pub(crate) fn end_detach(&mut self, value: &str) {
		if let Some(index) = self.detaching.iter().position(|held| held == value) {
			self.detaching.swap_remove(index);
		}
	}

	/// Replaces the projection with freshly resolved values, one entry per
	/// reference in reference order.
	///
	/// Values with a queued detach are skipped. Pending entries survive: each
	/// keeps its status on the first resolved entry with its value and is
	/// appended when the reload does not reflect it yet. Failed entries are
	/// dropped.
	pub(crate) fn rebuild(&mut self, resolved: Vec<String>) {
		let mut pending: Vec<&str> = self
			.entries
			.iter()
			.filter(|entry| entry.status == TagStatus::Pending)
			.map(|entry| entry.value.as_str())
			.collect();
		let mut next: Vec<TagEntry> = Vec::with_capacity(resolved.len() + pending.len());
		for value in resolved {
			if self.is_detaching(&value) {
				continue;
			}
			let status = match pending.iter().position(|held| *held == value) {
				Some(index) => {
					pending.swap_remove(index);
					TagStatus::Pending
				}
				None => TagStatus::Committed,
			};
			next.push(TagEntry::new(value, status));
		}
		let unreflected: Vec<TagEntry> = self
			.entries
			.iter()
			.filter(|entry| entry.status == TagStatus::Pending && pending.contains(&entry.value.as_str()))
			.cloned()
			.collect();
		next.extend(unreflected);
		self.entries = next;
	}
}
