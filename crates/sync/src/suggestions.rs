//! Suggestion sourcing: one query feeding the autocomplete set, the candidate
//! cache used for match resolution, and the displayed tag list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use indexmap::IndexSet;
use regex::{NoExpand, Regex};
use taglink_config::TagConfig;
use taglink_store::{ObjectId, ObjectStore, Query, Record};

/// Placeholder in the constraint template replaced by the owner identifier.
pub const OWNER_PLACEHOLDER: &str = "[%CurrentObject%]";

static OWNER_PLACEHOLDER_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)\[%CurrentObject%\]").expect("owner placeholder pattern must compile"));

/// Replaces every occurrence of [`OWNER_PLACEHOLDER`], ignoring case.
pub fn substitute_owner(template: &str, owner: &ObjectId) -> String {
	OWNER_PLACEHOLDER_RE.replace_all(template, NoExpand(owner.as_str())).into_owned()
}

/// De-duplicated tag values offered for autocomplete, in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionSet {
	values: IndexSet<String>,
}

impl SuggestionSet {
	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn contains(&self, value: &str) -> bool {
		self.values.contains(value)
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.values.iter().map(String::as_str)
	}

	pub(crate) fn insert(&mut self, value: impl Into<String>) -> bool {
		self.values.insert(value.into())
	}

	/// Suggestions starting with `input` (ignoring case), minus values in `exclude`.
	///
	/// Blank input yields nothing.
	pub fn complete(&self, input: &str, exclude: &[String]) -> Vec<String> {
		let needle = input.trim().to_lowercase();
		if needle.is_empty() {
			return Vec::new();
		}
		self.values
			.iter()
			.filter(|value| value.to_lowercase().starts_with(&needle))
			.filter(|value| !exclude.contains(value))
			.cloned()
			.collect()
	}
}

impl<S: Into<String>> FromIterator<S> for SuggestionSet {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self {
			values: iter.into_iter().map(Into::into).collect(),
		}
	}
}

/// Views derived from one suggestion query.
#[derive(Debug, Clone, Default)]
pub struct LoadedTags {
	pub suggestions: SuggestionSet,
	/// Values of referenced records, in reference order; `""` for identifiers
	/// that did not resolve.
	pub tags: Vec<String>,
	/// Raw result set, scanned when resolving a typed value.
	pub candidates: Vec<Record>,
}

/// Issues the suggestion query for an owner and projects its result.
pub struct SuggestionProvider {
	store: Arc<dyn ObjectStore>,
	entity: String,
	attribute: String,
	constraint: Option<String>,
}

impl SuggestionProvider {
	pub fn new(store: Arc<dyn ObjectStore>, config: &TagConfig) -> Self {
		Self {
			store,
			entity: config.entity().to_string(),
			attribute: config.tag_attribute.clone(),
			constraint: config.tag_constraint.clone(),
		}
	}

	/// Query for every tag entity matching the constraint, bound to `owner`.
	pub fn query_for(&self, owner: &ObjectId) -> Query {
		match &self.constraint {
			Some(template) => Query::constrained(&self.entity, substitute_owner(template, owner)),
			None => Query::all(&self.entity),
		}
	}

	pub async fn fetch(&self, owner: &ObjectId) -> taglink_store::Result<Vec<Record>> {
		let query = self.query_for(owner);
		tracing::debug!(owner = %owner, query = %query, "Loading tag suggestions");
		self.store.query(&query).await
	}

	/// Splits one result set into suggestions and the referenced tag values.
	pub fn project(&self, records: Vec<Record>, references: &[ObjectId]) -> LoadedTags {
		let suggestions = records.iter().filter_map(|record| record.get(&self.attribute)).collect();
		let tags = references
			.iter()
			.map(|id| {
				records
					.iter()
					.find(|record| record.id() == id)
					.and_then(|record| record.get(&self.attribute))
					.unwrap_or_default()
					.to_string()
			})
			.collect();
		LoadedTags {
			suggestions,
			tags,
			candidates: records,
		}
	}
}

/// Single-flight guard for suggestion loads of one binding.
///
/// A request arriving while a load is in flight is folded into one follow-up
/// load run by the holder of the current ticket.
#[derive(Debug, Default)]
pub(crate) struct LoadFlight {
	in_flight: AtomicBool,
	rerun: AtomicBool,
}

impl LoadFlight {
	/// Returns a ticket, or `None` after recording a follow-up request.
	pub fn begin(self: &Arc<Self>) -> Option<LoadTicket> {
		if self.in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
			self.rerun.store(true, Ordering::Release);
			return None;
		}
		Some(LoadTicket { flight: Arc::clone(self) })
	}

	pub fn is_in_flight(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}
}

pub(crate) struct LoadTicket {
	flight: Arc<LoadFlight>,
}

impl LoadTicket {
	/// Consumes a pending follow-up request.
	pub fn take_rerun(&self) -> bool {
		self.flight.rerun.swap(false, Ordering::AcqRel)
	}
}

impl Drop for LoadTicket {
	fn drop(&mut self) {
		self.flight.rerun.store(false, Ordering::Release);
		self.flight.in_flight.store(false, Ordering::Release);
	}
}
