//! Tag synchronizer tests against the in-memory store.

use pretty_assertions::assert_eq;
use taglink_store::memory::{MemoryStore, RecordingNotifier, StoreCall, StoreOp};
use taglink_store::{FlowDescriptor, ObjectValidation};

use super::*;
use crate::alert::AlertKind;

mod adding;
mod removing;

const REFERENCE: &str = "Post_Tag";
const ENTITY: &str = "Blog.Tag";
const ATTRIBUTE: &str = "Name";
const OWNER: &str = "post-1";

fn config() -> TagConfig {
	TagConfig::new("Post_Tag/Blog.Tag", "Name").unwrap()
}

fn tag_id(value: &str) -> ObjectId {
	ObjectId::new(format!("t-{value}"))
}

/// Seeds a committed tag record holding `value`.
fn seed_tag(store: &MemoryStore, value: &str) -> ObjectId {
	let id = tag_id(value);
	store.insert(Record::new(id.clone(), ENTITY).with_attribute(ATTRIBUTE, value));
	id
}

/// Seeds an owner record referencing a fresh tag record per value.
fn seed_owner(store: &MemoryStore, id: &str, values: &[&str]) -> SharedRecord {
	let mut owner = Record::new(id, "Blog.Post");
	for value in values {
		owner.add_reference(REFERENCE, seed_tag(store, value));
	}
	store.insert(owner)
}

struct Fixture {
	store: Arc<MemoryStore>,
	notifier: Arc<RecordingNotifier>,
	sync: TagSynchronizer,
	owner: SharedRecord,
}

impl Fixture {
	/// Unbound synchronizer over an owner referencing `values`.
	fn new(config: TagConfig, values: &[&str]) -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let store = Arc::new(MemoryStore::new());
		let notifier = Arc::new(RecordingNotifier::new());
		let owner = seed_owner(&store, OWNER, values);
		let sync = TagSynchronizer::new(config, store.clone(), notifier.clone());
		Self {
			store,
			notifier,
			sync,
			owner,
		}
	}

	/// Bound and loaded synchronizer, with the store call log cleared.
	async fn bound(config: TagConfig, values: &[&str]) -> Self {
		let fixture = Self::new(config, values);
		fixture.bind().await;
		fixture.store.clear_calls();
		fixture
	}

	async fn bind(&self) -> LoadOutcome {
		self.sync.bind(Some(self.owner.clone())).await.unwrap()
	}

	fn references(&self) -> Vec<ObjectId> {
		self.owner.read().references(REFERENCE).to_vec()
	}

	fn owner_id(&self) -> ObjectId {
		ObjectId::new(OWNER)
	}

	fn owner_commits(&self) -> usize {
		self.store.commit_count(&self.owner_id())
	}
}

/// Workflow context of the default owner.
fn owner_context() -> WorkflowContext {
	WorkflowContext {
		entity: "Blog.Post".into(),
		id: ObjectId::new(OWNER),
	}
}

fn statuses(sync: &TagSynchronizer) -> Vec<(String, TagStatus)> {
	sync.entries().into_iter().map(|entry| (entry.value, entry.status)).collect()
}

#[tokio::test]
async fn eager_bind_loads_tags_in_reference_order() {
	let fixture = Fixture::new(config(), &["rust", "async"]);
	seed_tag(&fixture.store, "unused");

	let outcome = fixture.bind().await;

	assert_eq!(outcome, LoadOutcome::Loaded { tags: 2, suggestions: 3 });
	assert_eq!(fixture.sync.tags(), vec!["rust", "async"]);
	assert_eq!(fixture.sync.suggestions().iter().collect::<Vec<_>>(), vec!["rust", "async", "unused"]);
	assert_eq!(fixture.sync.owner_id(), Some(fixture.owner_id()));
	assert_eq!(fixture.sync.generation(), Some(1));
	assert!(!fixture.sync.is_loading());
	assert!(statuses(&fixture.sync).iter().all(|(_, status)| *status == TagStatus::Committed));
}

#[tokio::test]
async fn unresolved_reference_shows_as_blank_value() {
	let fixture = Fixture::new(config(), &["rust"]);
	fixture.owner.write().add_reference(REFERENCE, ObjectId::new("gone"));

	fixture.bind().await;

	assert_eq!(fixture.sync.tags(), vec!["rust", ""]);
}

#[tokio::test]
async fn constraint_template_is_bound_to_the_owner() {
	let fixture = Fixture::new(config().with_constraint("[Owner = '[%CurrentObject%]']"), &[]);
	fixture.store.register_constraint("[Owner = 'post-1']", |record| record.get("Owner") == Some(OWNER));
	fixture
		.store
		.insert(Record::new("t-mine", ENTITY).with_attribute(ATTRIBUTE, "mine").with_attribute("Owner", OWNER));
	fixture
		.store
		.insert(Record::new("t-theirs", ENTITY).with_attribute(ATTRIBUTE, "theirs").with_attribute("Owner", "post-2"));

	fixture.bind().await;

	assert!(fixture.store.calls().contains(&StoreCall::Query("//Blog.Tag[Owner = 'post-1']".into())));
	assert_eq!(fixture.sync.suggestions().iter().collect::<Vec<_>>(), vec!["mine"]);
}

#[tokio::test]
async fn query_failure_notifies_and_keeps_the_projection() {
	let fixture = Fixture::bound(config(), &["rust"]).await;
	fixture.store.fail(StoreOp::Query);

	let err = fixture.sync.load().await.unwrap_err();

	assert!(matches!(err, SyncError::StoreOperationFailed { operation: "query", .. }), "got {err:?}");
	assert_eq!(
		fixture.notifier.messages(),
		vec!["An error occurred while retrieving tags (Blog.Tag): backend error: injected Query failure"]
	);
	assert_eq!(fixture.sync.tags(), vec!["rust"]);
	assert_eq!(fixture.sync.suggestions().len(), 1);
}

#[tokio::test]
async fn complete_offers_suggestions_not_yet_shown() {
	let fixture = Fixture::new(config(), &["apple"]);
	for value in ["avocado", "Apricot", "banana"] {
		seed_tag(&fixture.store, value);
	}
	fixture.bind().await;

	assert_eq!(fixture.sync.complete("a"), vec!["avocado", "Apricot"]);
	assert_eq!(fixture.sync.complete("B"), vec!["banana"]);
	assert!(fixture.sync.complete("").is_empty());
}

#[tokio::test]
async fn complete_is_empty_when_suggestions_are_disabled() {
	let fixture = Fixture::new(config().with_suggestions(false), &["apple"]);
	seed_tag(&fixture.store, "avocado");
	fixture.bind().await;

	assert!(fixture.sync.complete("a").is_empty());
	assert_eq!(fixture.sync.suggestions().len(), 2);
}

#[tokio::test]
async fn dropping_the_synchronizer_releases_subscriptions() {
	let fixture = Fixture::bound(config(), &["rust"]).await;
	assert_eq!(fixture.store.subscription_count(), 3);

	let Fixture { store, sync, .. } = fixture;
	drop(sync);

	assert_eq!(store.subscription_count(), 0);
}
