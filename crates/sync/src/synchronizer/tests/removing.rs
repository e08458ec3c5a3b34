use pretty_assertions::assert_eq;

use super::*;

#[tokio::test]
async fn removing_a_present_value_detaches_it() {
	let fixture = Fixture::bound(config(), &["a", "b"]).await;
	let _ = fixture.sync.add_tag("a").await;
	fixture.store.clear_calls();

	let outcome = fixture.sync.remove_tag("a").await.unwrap();

	assert!(matches!(outcome, RemoveOutcome::Detached { ref id, .. } if *id == tag_id("a")), "got {outcome:?}");
	assert_eq!(fixture.sync.tags(), vec!["b"]);
	assert_eq!(fixture.sync.alert(), None);
	assert_eq!(fixture.references(), vec![tag_id("b")]);
	assert_eq!(
		fixture.store.calls(),
		vec![StoreCall::Query("//Blog.Tag[Name = 'a']".into()), StoreCall::Commit(fixture.owner_id())]
	);
}

#[tokio::test]
async fn removing_an_absent_value_changes_nothing() {
	let fixture = Fixture::bound(config(), &["a"]).await;
	let _ = fixture.sync.add_tag("a").await;
	let alert = fixture.sync.alert();
	assert!(alert.is_some());

	assert_eq!(fixture.sync.remove_tag("zzz").await.unwrap(), RemoveOutcome::NotPresent);

	assert_eq!(fixture.sync.alert(), alert);
	assert_eq!(fixture.sync.tags(), vec!["a"]);
	assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn detach_prefers_the_record_the_owner_references() {
	let fixture = Fixture::new(config(), &[]);
	fixture.store.insert(Record::new("t-old", ENTITY).with_attribute(ATTRIBUTE, "rust"));
	fixture.store.insert(Record::new("t-used", ENTITY).with_attribute(ATTRIBUTE, "rust"));
	fixture.owner.write().add_reference(REFERENCE, ObjectId::new("t-used"));
	fixture.bind().await;

	let outcome = fixture.sync.remove_tag("rust").await.unwrap();

	assert!(matches!(outcome, RemoveOutcome::Detached { ref id, .. } if id.as_str() == "t-used"), "got {outcome:?}");
	assert!(fixture.references().is_empty());
}

#[tokio::test]
async fn value_without_a_record_is_unresolved() {
	let fixture = Fixture::bound(config(), &["a"]).await;
	fixture.store.get(&tag_id("a")).unwrap().write().set(ATTRIBUTE, "renamed");

	assert_eq!(fixture.sync.remove_tag("a").await.unwrap(), RemoveOutcome::Unresolved);

	assert!(fixture.sync.tags().is_empty());
	assert_eq!(fixture.owner_commits(), 0);
	assert_eq!(fixture.references(), vec![tag_id("a")]);
}

#[tokio::test]
async fn commit_failure_restores_the_reference_in_place() {
	let fixture = Fixture::bound(config(), &["a", "b", "c"]).await;
	fixture.store.fail(StoreOp::Commit);

	let err = fixture.sync.remove_tag("b").await.unwrap_err();

	assert!(matches!(err, SyncError::StoreOperationFailed { operation: "commit", .. }), "got {err:?}");
	assert_eq!(fixture.notifier.messages(), vec!["Error occurred attempting to commit: backend error: injected Commit failure"]);
	assert_eq!(fixture.references(), vec![tag_id("a"), tag_id("b"), tag_id("c")]);
	assert_eq!(fixture.sync.tags(), vec!["a", "c"]);

	fixture.store.clear_failure(StoreOp::Commit);
	fixture.sync.load().await.unwrap();
	assert_eq!(fixture.sync.tags(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn rollback_policy_reinserts_the_removed_entry() {
	let fixture = Fixture::bound(config().with_rollback_on_failure(true), &["a", "b", "c"]).await;
	fixture.store.fail(StoreOp::Commit);

	assert!(fixture.sync.remove_tag("b").await.is_err());

	assert_eq!(fixture.sync.tags(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn workflows_run_after_a_detach() {
	let fixture = Fixture::bound(config().with_on_change_action("Tags.OnChange"), &["a"]).await;

	let outcome = fixture.sync.remove_tag("a").await.unwrap();

	let RemoveOutcome::Detached { workflows, .. } = outcome else {
		panic!("expected a detached tag");
	};
	assert_eq!(workflows.succeeded, vec!["Tags.OnChange"]);
	assert_eq!(fixture.store.calls().last(), Some(&StoreCall::RunAction("Tags.OnChange".into(), owner_context())));
}

#[tokio::test]
async fn unresolved_removal_skips_workflows() {
	let fixture = Fixture::bound(config().with_on_change_action("Tags.OnChange"), &[]).await;
	fixture.owner.write().add_reference(REFERENCE, ObjectId::new("gone"));
	fixture.sync.load().await.unwrap();
	fixture.store.clear_calls();

	assert_eq!(fixture.sync.remove_tag("").await.unwrap(), RemoveOutcome::Unresolved);

	assert_eq!(fixture.store.count(|call| matches!(call, StoreCall::RunAction(..))), 0);
}
