//! In-process [`ObjectStore`] with a call log and failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
	FlowDescriptor, NotificationSink, ObjectId, ObjectStore, ObjectValidation, Query, QueryFilter, Record, Result, SharedRecord, StoreError,
	StoreNotification, SubscriptionCallback, SubscriptionHandle, SubscriptionSpec, SubscriptionTarget, WorkflowContext,
};

/// Store operation kinds, used for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
	Query,
	Create,
	Commit,
	RunAction,
	RunFlow,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
	/// Query rendered in XPath form.
	Query(String),
	Create(String),
	Commit(ObjectId),
	Subscribe(ObjectId, SubscriptionTarget),
	Unsubscribe(SubscriptionHandle),
	/// Action name and the context it ran with.
	RunAction(String, WorkflowContext),
	/// Flow name and the context it ran with.
	RunFlow(String, WorkflowContext),
}

type ConstraintPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

#[derive(Default)]
struct Inner {
	order: Vec<ObjectId>,
	records: HashMap<ObjectId, SharedRecord>,
	next_id: u64,
	next_handle: u64,
	subscriptions: Vec<(SubscriptionHandle, SubscriptionSpec)>,
	constraints: HashMap<String, ConstraintPredicate>,
	failing_ops: HashSet<StoreOp>,
	failing_workflows: HashSet<String>,
	calls: Vec<StoreCall>,
	latency: usize,
}

/// In-memory object store.
///
/// Committed records are kept as shared instances: [`MemoryStore::get`] hands
/// out the same `SharedRecord` the store updates on commit, which mirrors a
/// client-side object cache. Created records become visible to queries once
/// committed.
#[derive(Default)]
pub struct MemoryStore {
	inner: Mutex<Inner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds a committed record without logging a call.
	pub fn insert(&self, record: Record) -> SharedRecord {
		let mut inner = self.inner.lock();
		let id = record.id().clone();
		let shared = record.into_shared();
		if inner.records.insert(id.clone(), shared.clone()).is_none() {
			inner.order.push(id);
		}
		shared
	}

	/// Returns the shared instance of a committed record.
	pub fn get(&self, id: &ObjectId) -> Option<SharedRecord> {
		self.inner.lock().records.get(id).cloned()
	}

	/// Returns snapshots of every committed record of `entity`, in insertion order.
	pub fn records_of(&self, entity: &str) -> Vec<Record> {
		let inner = self.inner.lock();
		inner
			.order
			.iter()
			.filter_map(|id| inner.records.get(id))
			.map(|shared| shared.read().clone())
			.filter(|record| record.entity() == entity)
			.collect()
	}

	/// Registers how a constraint expression is evaluated.
	pub fn register_constraint(&self, constraint: impl Into<String>, predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) {
		self.inner.lock().constraints.insert(constraint.into(), Arc::new(predicate));
	}

	/// Makes every subsequent call of `op` fail.
	pub fn fail(&self, op: StoreOp) {
		self.inner.lock().failing_ops.insert(op);
	}

	pub fn clear_failure(&self, op: StoreOp) {
		self.inner.lock().failing_ops.remove(&op);
	}

	/// Makes the named action or flow fail.
	pub fn fail_workflow(&self, name: impl Into<String>) {
		self.inner.lock().failing_workflows.insert(name.into());
	}

	/// Number of cooperative yields every async operation performs before completing.
	pub fn set_latency(&self, yields: usize) {
		self.inner.lock().latency = yields;
	}

	pub fn calls(&self) -> Vec<StoreCall> {
		self.inner.lock().calls.clone()
	}

	pub fn clear_calls(&self) {
		self.inner.lock().calls.clear();
	}

	pub fn create_count(&self) -> usize {
		self.count(|call| matches!(call, StoreCall::Create(_)))
	}

	pub fn query_count(&self) -> usize {
		self.count(|call| matches!(call, StoreCall::Query(_)))
	}

	pub fn commit_count(&self, id: &ObjectId) -> usize {
		self.count(|call| matches!(call, StoreCall::Commit(committed) if committed == id))
	}

	pub fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
		self.inner.lock().calls.iter().filter(|call| pred(call)).count()
	}

	/// Number of live subscriptions.
	pub fn subscription_count(&self) -> usize {
		self.inner.lock().subscriptions.len()
	}

	/// Fires object-level subscriptions of `id`.
	pub fn notify_changed(&self, id: &ObjectId) {
		self.fire(id, |target| *target == SubscriptionTarget::Object, StoreNotification::Changed);
	}

	/// Fires subscriptions of `id` watching `attribute`.
	pub fn notify_attribute(&self, id: &ObjectId, attribute: &str) {
		self.fire(
			id,
			|target| matches!(target, SubscriptionTarget::Attribute(name) if name == attribute),
			StoreNotification::Changed,
		);
	}

	/// Delivers a validation result to the validation subscriptions of its record.
	pub fn report_validation(&self, validation: ObjectValidation) {
		let id = validation.id().clone();
		self.fire(&id, |target| *target == SubscriptionTarget::Validation, StoreNotification::Validation(validation));
	}

	fn fire(&self, id: &ObjectId, matches: impl Fn(&SubscriptionTarget) -> bool, notification: StoreNotification) {
		let callbacks: Vec<SubscriptionCallback> = {
			let inner = self.inner.lock();
			inner
				.subscriptions
				.iter()
				.filter(|(_, spec)| &spec.owner == id && matches(&spec.target))
				.map(|(_, spec)| spec.callback.clone())
				.collect()
		};
		for callback in callbacks {
			callback(notification.clone());
		}
	}

	fn record_call(&self, call: StoreCall, op: StoreOp) -> Result<usize> {
		let mut inner = self.inner.lock();
		inner.calls.push(call);
		if inner.failing_ops.contains(&op) {
			return Err(StoreError::Backend(format!("injected {op:?} failure")));
		}
		Ok(inner.latency)
	}

	async fn settle(yields: usize) {
		for _ in 0..yields {
			tokio::task::yield_now().await;
		}
	}

	fn run_workflow(&self, name: &str, call: StoreCall, op: StoreOp) -> Result<usize> {
		let latency = self.record_call(call, op)?;
		if self.inner.lock().failing_workflows.contains(name) {
			return Err(StoreError::Rejected(format!("{name} failed")));
		}
		Ok(latency)
	}
}

#[async_trait]
impl ObjectStore for MemoryStore {
	async fn query(&self, query: &Query) -> Result<Vec<Record>> {
		let latency = self.record_call(StoreCall::Query(query.to_string()), StoreOp::Query)?;
		Self::settle(latency).await;

		let predicate: Option<ConstraintPredicate> = match &query.filter {
			QueryFilter::Constraint(constraint) => Some(
				self.inner
					.lock()
					.constraints
					.get(constraint)
					.cloned()
					.ok_or_else(|| StoreError::UnsupportedConstraint(constraint.clone()))?,
			),
			_ => None,
		};

		let records = self
			.records_of(&query.entity)
			.into_iter()
			.filter(|record| match &query.filter {
				QueryFilter::All => true,
				QueryFilter::Constraint(_) => predicate.as_ref().is_some_and(|pred| pred(record)),
				QueryFilter::AttributeEquals { attribute, value } => record.get(attribute) == Some(value.as_str()),
			})
			.collect();
		Ok(records)
	}

	async fn create(&self, entity: &str) -> Result<Record> {
		let latency = self.record_call(StoreCall::Create(entity.to_string()), StoreOp::Create)?;
		Self::settle(latency).await;

		let mut inner = self.inner.lock();
		inner.next_id += 1;
		Ok(Record::new(format!("obj-{}", inner.next_id), entity))
	}

	async fn commit(&self, record: &Record) -> Result<()> {
		let latency = self.record_call(StoreCall::Commit(record.id().clone()), StoreOp::Commit)?;
		Self::settle(latency).await;

		let existing = self.get(record.id());
		match existing {
			Some(shared) => *shared.write() = record.clone(),
			None => {
				self.insert(record.clone());
			}
		}
		tracing::trace!(id = %record.id(), entity = record.entity(), "memory_store.commit");

		let id = record.id().clone();
		self.fire(&id, |target| *target != SubscriptionTarget::Validation, StoreNotification::Changed);
		Ok(())
	}

	fn subscribe(&self, spec: SubscriptionSpec) -> SubscriptionHandle {
		let mut inner = self.inner.lock();
		inner.next_handle += 1;
		let handle = SubscriptionHandle::new(inner.next_handle);
		inner.calls.push(StoreCall::Subscribe(spec.owner.clone(), spec.target.clone()));
		inner.subscriptions.push((handle, spec));
		handle
	}

	fn unsubscribe(&self, handle: SubscriptionHandle) {
		let mut inner = self.inner.lock();
		inner.calls.push(StoreCall::Unsubscribe(handle));
		inner.subscriptions.retain(|(held, _)| *held != handle);
	}

	async fn run_action(&self, name: &str, context: &WorkflowContext) -> Result<()> {
		let call = StoreCall::RunAction(name.to_string(), context.clone());
		let latency = self.run_workflow(name, call, StoreOp::RunAction)?;
		Self::settle(latency).await;
		Ok(())
	}

	async fn run_flow(&self, flow: &FlowDescriptor, context: &WorkflowContext) -> Result<()> {
		let call = StoreCall::RunFlow(flow.name.clone(), context.clone());
		let latency = self.run_workflow(&flow.name, call, StoreOp::RunFlow)?;
		Self::settle(latency).await;
		Ok(())
	}
}

/// Notification sink that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
	messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn messages(&self) -> Vec<String> {
		self.messages.lock().clone()
	}

	pub fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.messages.lock())
	}
}

impl NotificationSink for RecordingNotifier {
	fn error(&self, message: &str) {
		self.messages.lock().push(message.to_string());
	}
}
