//! Tag synchronizer: the optimistic tag list of one bound owner record.
//!
//! # Operation flow
//!
//! [`TagSynchronizer::add_tag`] and [`TagSynchronizer::remove_tag`] split into a
//! synchronous prefix and an asynchronous tail:
//!
//! 1. Validation and the optimistic projection update run under the state lock
//!    before the first suspension point, so they apply in call order.
//! 2. The store sequence waits for the owner's operation gate, a FIFO
//!    `tokio::sync::Mutex`, so at most one mutation per owner is in flight.
//! 3. Every store and workflow await runs under the binding's [`OwnerScope`].
//!    A rebind cancels the scope and every state write re-checks the binding
//!    generation, so a late completion never touches another owner's state.
//!
//! Subscription callbacks only queue [`SyncEvent`](crate::SyncEvent)s. The host
//! drains them with [`TagSynchronizer::process_events`] or
//! [`TagSynchronizer::next_event`].

use std::sync::Arc;

use parking_lot::Mutex;
use taglink_config::{Editable, TagConfig};
use taglink_store::{NotificationSink, ObjectId, ObjectStore, Query, Record, SharedRecord, StoreError, WorkflowContext};
use tokio::sync::{OwnedMutexGuard, mpsc};

use crate::alert::Alert;
use crate::error::{Result, SyncError};
use crate::projection::{TagEntry, TagListState, TagStatus};
use crate::scope::{GenerationClock, OwnerScope};
use crate::subscriptions::{SubscriptionManager, SyncEvent, SyncEventKind, SyncEventReceiver};
use crate::suggestions::{LoadFlight, SuggestionProvider, SuggestionSet};
use crate::workflow::{DispatchReport, WorkflowDispatcher};

/// Result of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
	/// The projection was rebuilt from a fresh query.
	Loaded { tags: usize, suggestions: usize },
	/// A load was already in flight; it runs once more when it finishes.
	Suppressed,
	/// Lazy mode: nothing is loaded until the first suggestion request.
	Deferred,
	/// No owner is bound, or suggestions were already loaded.
	Skipped,
}

/// Result of a successful [`TagSynchronizer::add_tag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
	/// An existing tag record was attached.
	Attached { id: ObjectId, workflows: DispatchReport },
	/// A new tag record was created and attached.
	Created { id: ObjectId, workflows: DispatchReport },
}

impl AddOutcome {
	pub fn id(&self) -> &ObjectId {
		match self {
			Self::Attached { id, .. } | Self::Created { id, .. } => id,
		}
	}

	pub fn workflows(&self) -> &DispatchReport {
		match self {
			Self::Attached { workflows, .. } | Self::Created { workflows, .. } => workflows,
		}
	}
}

/// Result of a successful [`TagSynchronizer::remove_tag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
	/// The tag record was detached and the owner committed.
	Detached { id: ObjectId, workflows: DispatchReport },
	/// The value is not in the tag list. Nothing changed.
	NotPresent,
	/// No tag record holds the value anymore. The entry is gone, nothing was committed.
	Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AddPlan {
	Attach(ObjectId),
	Create,
}

/// Live binding to one owner record.
struct Binding {
	owner: SharedRecord,
	owner_id: ObjectId,
	scope: OwnerScope,
	gate: Arc<tokio::sync::Mutex<()>>,
	loads: Arc<LoadFlight>,
	/// A load was started for this binding.
	loaded: bool,
}

impl Binding {
	fn new(owner: SharedRecord, owner_id: ObjectId, scope: OwnerScope) -> Self {
		Self {
			owner,
			owner_id,
			scope,
			gate: Arc::default(),
			loads: Arc::default(),
			loaded: false,
		}
	}

	fn op_context(&self) -> OpContext {
		OpContext {
			owner: self.owner.clone(),
			owner_id: self.owner_id.clone(),
			scope: self.scope.clone(),
			gate: self.gate.clone(),
			loads: self.loads.clone(),
		}
	}
}

/// What an operation carries across its awaits.
struct OpContext {
	owner: SharedRecord,
	owner_id: ObjectId,
	scope: OwnerScope,
	gate: Arc<tokio::sync::Mutex<()>>,
	loads: Arc<LoadFlight>,
}

impl OpContext {
	fn generation(&self) -> u64 {
		self.scope.generation()
	}
}

#[derive(Default)]
struct State {
	binding: Option<Binding>,
	tags: TagListState,
	suggestions: SuggestionSet,
	candidates: Vec<Record>,
	alert: Option<Alert>,
}

impl State {
	fn generation(&self) -> Option<u64> {
		self.binding.as_ref().map(|binding| binding.scope.generation())
	}

	fn is_current(&self, generation: u64) -> bool {
		self.generation() == Some(generation)
	}
}

/// Keeps an editable tag list in sync with the reference set of an owner
/// record.
pub struct TagSynchronizer {
	config: TagConfig,
	store: Arc<dyn ObjectStore>,
	notifier: Arc<dyn NotificationSink>,
	suggestions: SuggestionProvider,
	subscriptions: SubscriptionManager,
	workflows: WorkflowDispatcher,
	clock: GenerationClock,
	state: Mutex<State>,
	events: tokio::sync::Mutex<SyncEventReceiver>,
}

impl TagSynchronizer {
	pub fn new(config: TagConfig, store: Arc<dyn ObjectStore>, notifier: Arc<dyn NotificationSink>) -> Self {
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		Self {
			suggestions: SuggestionProvider::new(store.clone(), &config),
			subscriptions: SubscriptionManager::new(store.clone(), events_tx),
			workflows: WorkflowDispatcher::from_config(store.clone(), notifier.clone(), &config),
			clock: GenerationClock::default(),
			state: Mutex::new(State::default()),
			events: tokio::sync::Mutex::new(events_rx),
			config,
			store,
			notifier,
		}
	}

	pub fn config(&self) -> &TagConfig {
		&self.config
	}

	/// Binds the synchronizer to `owner`.
	///
	/// Binding the same owner identity again keeps the subscriptions and
	/// refreshes. A different identity tears the previous binding down,
	/// cancelling its in-flight operations, and starts from an empty projection.
	/// `None` unbinds.
	pub async fn bind(&self, owner: Option<SharedRecord>) -> Result<LoadOutcome> {
		let Some(owner) = owner else {
			self.unbind();
			return Ok(LoadOutcome::Skipped);
		};
		let owner_id = owner.read().id().clone();

		let same_owner = {
			let mut state = self.state.lock();
			match state.binding.as_mut() {
				Some(binding) if binding.owner_id == owner_id => {
					binding.owner = owner.clone();
					true
				}
				_ => false,
			}
		};
		if same_owner {
			tracing::debug!(owner = %owner_id, "Owner unchanged, refreshing");
			return self.refresh().await;
		}

		self.unbind();
		let scope = OwnerScope::new(self.clock.next());
		self.state.lock().binding = Some(Binding::new(owner, owner_id.clone(), scope.clone()));
		self.subscriptions.bind(Some(&owner_id), self.config.reference(), &scope);
		tracing::debug!(owner = %owner_id, generation = scope.generation(), lazy = self.config.lazy_load, "Bound owner");

		if self.config.lazy_load {
			return Ok(LoadOutcome::Deferred);
		}
		self.load().await
	}

	/// Drops the binding: clears the projection, cancels in-flight operations,
	/// and removes every subscription.
	pub fn unbind(&self) {
		let previous = std::mem::take(&mut *self.state.lock()).binding;
		if let Some(binding) = previous {
			binding.scope.cancel();
			tracing::debug!(owner = %binding.owner_id, generation = binding.scope.generation(), "Unbound owner");
		}
		self.subscriptions.unbind();
	}

	/// Loads suggestions and rebuilds the tag list from the owner's references.
	///
	/// At most one load per binding is in flight. Requests arriving meanwhile
	/// return [`LoadOutcome::Suppressed`] and cause one follow-up load.
	pub async fn load(&self) -> Result<LoadOutcome> {
		let Some(op) = self.mark_loaded() else {
			return Ok(LoadOutcome::Skipped);
		};
		let Some(ticket) = op.loads.begin() else {
			tracing::trace!(owner = %op.owner_id, "Load in flight, queued a follow-up");
			return Ok(LoadOutcome::Suppressed);
		};

		loop {
			let result = op.scope.guard(self.suggestions.fetch(&op.owner_id)).await?;
			let outcome = match result {
				Ok(records) => self.apply_load(&op, records),
				Err(error) => {
					let message = format!("An error occurred while retrieving tags ({}): {error}", self.config.entity());
					Err(self.store_failure(&op, "query", &message, error))
				}
			};
			if !ticket.take_rerun() {
				return outcome;
			}
			tracing::trace!(owner = %op.owner_id, "Running follow-up load");
		}
	}

	/// First user interaction with the input. Loads once per binding in lazy mode.
	pub async fn request_suggestions(&self) -> Result<LoadOutcome> {
		let loaded = match &self.state.lock().binding {
			Some(binding) => binding.loaded,
			None => return Ok(LoadOutcome::Skipped),
		};
		if loaded {
			return Ok(LoadOutcome::Skipped);
		}
		self.load().await
	}

	/// Reloads unless a lazy binding has not been loaded yet.
	async fn refresh(&self) -> Result<LoadOutcome> {
		let loaded = self.state.lock().binding.as_ref().is_some_and(|binding| binding.loaded);
		if self.config.lazy_load && !loaded {
			return Ok(LoadOutcome::Deferred);
		}
		self.load().await
	}

	fn mark_loaded(&self) -> Option<OpContext> {
		let mut state = self.state.lock();
		let binding = state.binding.as_mut()?;
		binding.loaded = true;
		Some(binding.op_context())
	}

	fn apply_load(&self, op: &OpContext, records: Vec<Record>) -> Result<LoadOutcome> {
		let references = op.owner.read().references(self.config.reference()).to_vec();
		let loaded = self.suggestions.project(records, &references);

		let mut state = self.state.lock();
		if !state.is_current(op.generation()) {
			return Err(SyncError::Cancelled);
		}
		state.tags.rebuild(loaded.tags);
		state.suggestions = loaded.suggestions;
		state.candidates = loaded.candidates;
		if let Some(limit) = self.config.limit()
			&& state.tags.len() > limit
		{
			state.alert = Some(Alert::limit(self.config.limit_message()));
		}

		let outcome = LoadOutcome::Loaded {
			tags: state.tags.len(),
			suggestions: state.suggestions.len(),
		};
		tracing::debug!(owner = %op.owner_id, ?outcome, "Applied load");
		Ok(outcome)
	}

	/// Whether mutation is disabled: no owner, `editable = never`, or the host
	/// marks the reference read-only.
	pub fn is_read_only(&self) -> bool {
		match &self.state.lock().binding {
			Some(binding) => self.owner_read_only(&binding.owner),
			None => true,
		}
	}

	fn owner_read_only(&self, owner: &SharedRecord) -> bool {
		self.config.editable == Editable::Never || owner.read().is_readonly_attr(self.config.reference())
	}

	/// Adds `value` to the tag list and attaches a matching tag record, creating
	/// one when none exists.
	///
	/// Checks run in this order: guards, limit, duplicate, match. A rejected
	/// value never reaches the store.
	pub async fn add_tag(&self, value: &str) -> Result<AddOutcome> {
		let value = value.trim();
		let (op, plan) = self.plan_add(value)?;
		tracing::debug!(owner = %op.owner_id, value, ?plan, "Adding tag");

		let result = {
			let _turn = self.enter_gate(&op).await?;
			self.commit_add(&op, value, plan).await
		};
		self.settle_add(&op, value, &result);
		let (id, created) = result?;

		let workflows = self.dispatch(&op).await;
		if created {
			Ok(AddOutcome::Created { id, workflows })
		} else {
			Ok(AddOutcome::Attached { id, workflows })
		}
	}

	fn plan_add(&self, value: &str) -> Result<(OpContext, AddPlan)> {
		let mut state = self.state.lock();
		let op = state.binding.as_ref().map(Binding::op_context).ok_or(SyncError::NotBound)?;
		if self.owner_read_only(&op.owner) {
			return Err(SyncError::ReadOnly);
		}
		if value.is_empty() {
			return Err(SyncError::EmptyTag);
		}

		if let Some(limit) = self.config.limit()
			&& state.tags.len() >= limit
		{
			let message = self.config.limit_message();
			state.alert = Some(Alert::limit(message.clone()));
			return Err(SyncError::LimitExceeded { limit, message });
		}
		if state.tags.contains(value) {
			state.alert = Some(Alert::duplicate(value));
			return Err(SyncError::DuplicateTag(value.to_string()));
		}

		let attribute = &self.config.tag_attribute;
		let matched = state
			.candidates
			.iter()
			.find(|record| record.get(attribute) == Some(value))
			.map(|record| record.id().clone());
		let plan = match matched {
			Some(id) => {
				let referenced = op.owner.read().has_reference(self.config.reference(), &id);
				// A referenced record is only attachable again once its queued detach ran.
				if referenced && !state.tags.is_detaching(value) {
					state.alert = Some(Alert::duplicate(value));
					return Err(SyncError::DuplicateTag(value.to_string()));
				}
				AddPlan::Attach(id)
			}
			None => AddPlan::Create,
		};

		state.tags.push_pending(value);
		state.alert = None;
		Ok((op, plan))
	}

	/// Returns the attached identifier and whether it was created.
	async fn commit_add(&self, op: &OpContext, value: &str, plan: AddPlan) -> Result<(ObjectId, bool)> {
		let entity = self.config.entity();
		let reference = self.config.reference();

		let (id, created) = match plan {
			AddPlan::Attach(id) => (id, false),
			AddPlan::Create => {
				let mut record = op
					.scope
					.guard(self.store.create(entity))
					.await?
					.map_err(|error| self.store_failure(op, "create", &format!("Error creating tag object {entity}, {error}"), error))?;
				record.set(self.config.tag_attribute.clone(), value);
				op.scope
					.guard(self.store.commit(&record))
					.await?
					.map_err(|error| self.store_failure(op, "commit", &format!("Error occurred attempting to commit: {error}"), error))?;
				let id = record.id().clone();
				self.remember_candidate(op, value, record);
				(id, true)
			}
		};

		let (added, snapshot) = {
			let mut owner = op.owner.write();
			let added = owner.add_reference(reference, id.clone());
			(added, Record::clone(&owner))
		};
		let committed = op.scope.guard(self.store.commit(&snapshot)).await;
		// The owner instance is shared with the host: undo the reference unless the commit landed.
		if added && !matches!(committed, Ok(Ok(()))) {
			op.owner.write().remove_references(reference, std::slice::from_ref(&id));
		}
		if let Err(error) = committed? {
			return Err(self.store_failure(op, "commit", &format!("Error occurred attempting to commit: {error}"), error));
		}
		tracing::debug!(owner = %op.owner_id, value, id = %id, created, "Attached tag");
		Ok((id, created))
	}

	fn remember_candidate(&self, op: &OpContext, value: &str, record: Record) {
		let mut state = self.state.lock();
		if !state.is_current(op.generation()) {
			return;
		}
		state.suggestions.insert(value);
		state.candidates.push(record);
	}

	fn settle_add(&self, op: &OpContext, value: &str, result: &Result<(ObjectId, bool)>) {
		let mut state = self.state.lock();
		if !state.is_current(op.generation()) {
			return;
		}
		match result {
			Ok(_) => {
				state.tags.set_status(value, TagStatus::Committed);
			}
			Err(_) if self.config.rollback_on_failure => {
				state.tags.remove(value);
			}
			Err(_) => {
				state.tags.set_status(value, TagStatus::Failed);
			}
		}
	}

	/// Removes `value` from the tag list and detaches its tag record.
	///
	/// Removing an absent value changes nothing, the alert included.
	pub async fn remove_tag(&self, value: &str) -> Result<RemoveOutcome> {
		let Some((op, removed)) = self.plan_remove(value)? else {
			return Ok(RemoveOutcome::NotPresent);
		};
		tracing::debug!(owner = %op.owner_id, value, "Removing tag");

		let result = {
			let _turn = self.enter_gate(&op).await?;
			self.commit_remove(&op, value).await
		};
		self.settle_remove(&op, value, removed, &result);

		match result? {
			Some(id) => {
				let workflows = self.dispatch(&op).await;
				Ok(RemoveOutcome::Detached { id, workflows })
			}
			None => Ok(RemoveOutcome::Unresolved),
		}
	}

	fn plan_remove(&self, value: &str) -> Result<Option<(OpContext, (usize, TagEntry))>> {
		let mut state = self.state.lock();
		let op = state.binding.as_ref().map(Binding::op_context).ok_or(SyncError::NotBound)?;
		if self.owner_read_only(&op.owner) {
			return Err(SyncError::ReadOnly);
		}
		let Some(removed) = state.tags.begin_detach(value) else {
			return Ok(None);
		};
		state.alert = None;
		Ok(Some((op, removed)))
	}

	/// Returns the detached identifier, or `None` when no record holds `value`.
	async fn commit_remove(&self, op: &OpContext, value: &str) -> Result<Option<ObjectId>> {
		let reference = self.config.reference();
		let query = Query::attribute_equals(self.config.entity(), self.config.tag_attribute.clone(), value);
		let records = op.scope.guard(self.store.query(&query)).await?.map_err(|error| {
			let message = format!("An error occurred while retrieving tags ({}): {error}", self.config.entity());
			self.store_failure(op, "query", &message, error)
		})?;

		let found = {
			let owner = op.owner.read();
			records
				.iter()
				.find(|record| owner.has_reference(reference, record.id()))
				.or_else(|| records.first())
				.map(|record| record.id().clone())
		};
		let Some(id) = found else {
			tracing::debug!(owner = %op.owner_id, value, "No tag record holds the value");
			return Ok(None);
		};

		let (position, snapshot) = {
			let mut owner = op.owner.write();
			let position = owner.references(reference).iter().position(|held| *held == id);
			owner.remove_references(reference, std::slice::from_ref(&id));
			(position, Record::clone(&owner))
		};
		let committed = op.scope.guard(self.store.commit(&snapshot)).await;
		if let Some(index) = position
			&& !matches!(committed, Ok(Ok(())))
		{
			op.owner.write().insert_reference(reference, index, id.clone());
		}
		if let Err(error) = committed? {
			return Err(self.store_failure(op, "commit", &format!("Error occurred attempting to commit: {error}"), error));
		}
		tracing::debug!(owner = %op.owner_id, value, id = %id, "Detached tag");
		Ok(Some(id))
	}

	fn settle_remove(&self, op: &OpContext, value: &str, (index, entry): (usize, TagEntry), result: &Result<Option<ObjectId>>) {
		let mut state = self.state.lock();
		if !state.is_current(op.generation()) {
			return;
		}
		state.tags.end_detach(value);
		if result.is_err() && self.config.rollback_on_failure {
			state.tags.restore(index, entry);
		}
	}

	async fn enter_gate(&self, op: &OpContext) -> Result<OwnedMutexGuard<()>> {
		tracing::trace!(owner = %op.owner_id, "Waiting for operation gate");
		Ok(op.scope.guard(op.gate.clone().lock_owned()).await?)
	}

	async fn dispatch(&self, op: &OpContext) -> DispatchReport {
		let context = WorkflowContext::for_record(&op.owner.read());
		self.workflows.dispatch(&context, &op.scope).await
	}

	fn store_failure(&self, op: &OpContext, operation: &'static str, message: &str, error: StoreError) -> SyncError {
		tracing::warn!(owner = %op.owner_id, operation, error = %error, "Store operation failed");
		self.notifier.error(message);
		SyncError::StoreOperationFailed { operation, source: error }
	}

	/// Handles every queued subscription event without waiting.
	///
	/// Change events are folded into at most one load. Returns the number of
	/// events taken off the queue, stale ones included.
	pub async fn process_events(&self) -> Result<usize> {
		let mut drained = 0;
		let mut reload = false;
		{
			let mut events = self.events.lock().await;
			while let Ok(event) = events.try_recv() {
				drained += 1;
				reload |= self.handle_event(event);
			}
		}
		if reload {
			self.refresh().await?;
		}
		Ok(drained)
	}

	/// Waits for one subscription event and handles it.
	///
	/// Returns `false` once the event channel is closed.
	pub async fn next_event(&self) -> Result<bool> {
		let event = {
			let mut events = self.events.lock().await;
			events.recv().await
		};
		let Some(event) = event else {
			return Ok(false);
		};
		if self.handle_event(event) {
			self.refresh().await?;
		}
		Ok(true)
	}

	/// Applies an event to local state. Returns whether it asks for a reload.
	fn handle_event(&self, event: SyncEvent) -> bool {
		let mut state = self.state.lock();
		if !state.is_current(event.generation) {
			tracing::debug!(generation = event.generation, current = ?state.generation(), "Dropped stale event");
			return false;
		}
		match event.kind {
			SyncEventKind::OwnerChanged | SyncEventKind::ReferenceChanged => true,
			SyncEventKind::Validation(validation) => {
				if let Some(reason) = validation.take_reason(self.config.reference()) {
					state.alert = Some(Alert::validation(reason));
				}
				false
			}
		}
	}

	/// Displayed tag values, in order.
	pub fn tags(&self) -> Vec<String> {
		self.state.lock().tags.values()
	}

	/// Displayed tags with their store status.
	pub fn entries(&self) -> Vec<TagEntry> {
		self.state.lock().tags.entries().to_vec()
	}

	pub fn alert(&self) -> Option<Alert> {
		self.state.lock().alert.clone()
	}

	pub fn dismiss_alert(&self) {
		self.state.lock().alert = None;
	}

	pub fn suggestions(&self) -> SuggestionSet {
		self.state.lock().suggestions.clone()
	}

	/// Autocomplete candidates for `input`, minus values already shown.
	///
	/// Empty when suggestions are disabled.
	pub fn complete(&self, input: &str) -> Vec<String> {
		if !self.config.enable_suggestions {
			return Vec::new();
		}
		let state = self.state.lock();
		state.suggestions.complete(input, &state.tags.values())
	}

	pub fn owner_id(&self) -> Option<ObjectId> {
		self.state.lock().binding.as_ref().map(|binding| binding.owner_id.clone())
	}

	/// Generation of the current binding.
	pub fn generation(&self) -> Option<u64> {
		self.state.lock().generation()
	}

	pub fn is_bound(&self) -> bool {
		self.state.lock().binding.is_some()
	}

	/// Whether a suggestion load is in flight for the current binding.
	pub fn is_loading(&self) -> bool {
		self.state.lock().binding.as_ref().is_some_and(|binding| binding.loads.is_in_flight())
	}
}

impl Drop for TagSynchronizer {
	fn drop(&mut self) {
		self.unbind();
	}
}

#[cfg(test)]
mod tests;
