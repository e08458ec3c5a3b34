use pretty_assertions::assert_eq;

use super::*;

#[tokio::test]
async fn full_list_rejects_new_value_with_limit_message() {
	let fixture = Fixture::bound(config().with_limit(2, "Max {limit} tags"), &["a", "b"]).await;

	let err = fixture.sync.add_tag("c").await.unwrap_err();

	assert!(matches!(err, SyncError::LimitExceeded { limit: 2, ref message } if message == "Max 2 tags"), "got {err:?}");
	assert_eq!(fixture.sync.alert(), Some(Alert::limit("Max 2 tags")));
	assert_eq!(fixture.sync.tags(), vec!["a", "b"]);
	assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn unresolved_references_count_toward_the_limit() {
	let fixture = Fixture::new(config().with_limit(3, "Max {limit} tags"), &["a"]);
	fixture.owner.write().add_reference(REFERENCE, ObjectId::new("gone-1"));
	fixture.owner.write().add_reference(REFERENCE, ObjectId::new("gone-2"));
	fixture.bind().await;
	fixture.store.clear_calls();

	let err = fixture.sync.add_tag("c").await.unwrap_err();

	assert!(matches!(err, SyncError::LimitExceeded { limit: 3, .. }), "got {err:?}");
	assert_eq!(fixture.sync.tags(), vec!["a", "", ""]);
	assert_eq!(fixture.references().len(), 3);
	assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn limit_is_checked_before_duplicates() {
	let fixture = Fixture::bound(config().with_limit(1, "Max {limit} tags"), &["a"]).await;

	let err = fixture.sync.add_tag("a").await.unwrap_err();

	assert!(matches!(err, SyncError::LimitExceeded { .. }), "got {err:?}");
	assert_eq!(fixture.sync.alert().map(|alert| alert.kind), Some(AlertKind::LimitExceeded));
}

#[tokio::test]
async fn duplicate_value_is_rejected_locally() {
	let fixture = Fixture::bound(config(), &["a"]).await;

	let err = fixture.sync.add_tag(" a ").await.unwrap_err();

	assert!(matches!(err, SyncError::DuplicateTag(ref value) if value == "a"), "got {err:?}");
	assert_eq!(fixture.sync.alert(), Some(Alert::duplicate("a")));
	assert_eq!(fixture.sync.alert().unwrap().message, "Duplicate a");
	assert_eq!(fixture.sync.tags(), vec!["a"]);
	assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn matching_candidate_is_attached_without_create() {
	let fixture = Fixture::new(config(), &["a"]);
	let b = seed_tag(&fixture.store, "b");
	fixture.bind().await;
	fixture.store.clear_calls();

	let outcome = fixture.sync.add_tag("b").await.unwrap();

	assert_eq!(outcome.id(), &b);
	assert!(matches!(outcome, AddOutcome::Attached { .. }));
	assert_eq!(fixture.sync.tags(), vec!["a", "b"]);
	assert_eq!(fixture.store.create_count(), 0);
	assert_eq!(fixture.owner_commits(), 1);
	assert_eq!(fixture.references(), vec![tag_id("a"), b]);
	assert_eq!(statuses(&fixture.sync)[1], ("b".to_string(), TagStatus::Committed));
}

#[tokio::test]
async fn unknown_value_creates_one_record_then_attaches_it() {
	let fixture = Fixture::bound(config(), &[]).await;

	let outcome = fixture.sync.add_tag("new").await.unwrap();

	let AddOutcome::Created { id, .. } = outcome.clone() else {
		panic!("expected a created tag, got {outcome:?}");
	};
	assert_eq!(fixture.store.create_count(), 1);
	assert_eq!(fixture.store.commit_count(&id), 1);
	assert_eq!(fixture.owner_commits(), 1);
	assert_eq!(fixture.sync.tags(), vec!["new"]);
	assert_eq!(fixture.references(), vec![id.clone()]);
	assert_eq!(fixture.store.get(&id).unwrap().read().get(ATTRIBUTE), Some("new"));
	assert!(fixture.sync.suggestions().contains("new"));
	assert_eq!(
		fixture.store.calls(),
		vec![StoreCall::Create(ENTITY.into()), StoreCall::Commit(id), StoreCall::Commit(fixture.owner_id())]
	);
}

#[tokio::test]
async fn created_record_is_reused_for_the_next_match() {
	let fixture = Fixture::bound(config(), &[]).await;
	fixture.sync.add_tag("new").await.unwrap();
	fixture.sync.remove_tag("new").await.unwrap();
	fixture.store.clear_calls();

	let outcome = fixture.sync.add_tag("new").await.unwrap();

	assert!(matches!(outcome, AddOutcome::Attached { .. }), "got {outcome:?}");
	assert_eq!(fixture.store.create_count(), 0);
}

#[tokio::test]
async fn blank_value_is_rejected_without_alert() {
	let fixture = Fixture::bound(config(), &["a"]).await;

	assert!(matches!(fixture.sync.add_tag("   ").await, Err(SyncError::EmptyTag)));
	assert_eq!(fixture.sync.alert(), None);
	assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn unbound_synchronizer_rejects_edits() {
	let fixture = Fixture::new(config(), &[]);

	assert!(matches!(fixture.sync.add_tag("a").await, Err(SyncError::NotBound)));
	assert!(fixture.sync.is_read_only());
}

#[tokio::test]
async fn never_editable_is_read_only() {
	let fixture = Fixture::bound(config().with_editable(Editable::Never), &["a"]).await;

	assert!(fixture.sync.is_read_only());
	assert!(matches!(fixture.sync.add_tag("b").await, Err(SyncError::ReadOnly)));
	assert!(matches!(fixture.sync.remove_tag("a").await, Err(SyncError::ReadOnly)));
	assert_eq!(fixture.sync.tags(), vec!["a"]);
}

#[tokio::test]
async fn read_only_reference_blocks_edits() {
	let fixture = Fixture::bound(config(), &["a"]).await;
	assert!(!fixture.sync.is_read_only());

	fixture.owner.write().set_readonly_attr(REFERENCE, true);

	assert!(fixture.sync.is_read_only());
	assert!(matches!(fixture.sync.add_tag("b").await, Err(SyncError::ReadOnly)));
	assert!(fixture.store.calls().is_empty());
}

#[tokio::test]
async fn successful_add_clears_the_alert() {
	let fixture = Fixture::bound(config(), &["a"]).await;
	let _ = fixture.sync.add_tag("a").await;
	assert!(fixture.sync.alert().is_some());

	fixture.sync.add_tag("b").await.unwrap();

	assert_eq!(fixture.sync.alert(), None);
}

#[tokio::test]
async fn create_failure_marks_the_entry_failed() {
	let fixture = Fixture::bound(config(), &["a"]).await;
	fixture.store.fail(StoreOp::Create);

	let err = fixture.sync.add_tag("x").await.unwrap_err();

	assert!(matches!(err, SyncError::StoreOperationFailed { operation: "create", .. }), "got {err:?}");
	assert_eq!(fixture.notifier.messages(), vec!["Error creating tag object Blog.Tag, backend error: injected Create failure"]);
	assert_eq!(
		statuses(&fixture.sync),
		vec![("a".to_string(), TagStatus::Committed), ("x".to_string(), TagStatus::Failed)]
	);
	assert_eq!(fixture.owner_commits(), 0);
}

#[tokio::test]
async fn commit_failure_reverts_the_owner_reference() {
	let fixture = Fixture::new(config(), &["a"]);
	seed_tag(&fixture.store, "b");
	fixture.bind().await;
	fixture.store.fail(StoreOp::Commit);

	let err = fixture.sync.add_tag("b").await.unwrap_err();

	assert!(matches!(err, SyncError::StoreOperationFailed { operation: "commit", .. }), "got {err:?}");
	assert_eq!(fixture.notifier.messages(), vec!["Error occurred attempting to commit: backend error: injected Commit failure"]);
	assert_eq!(fixture.references(), vec![tag_id("a")]);
	assert_eq!(fixture.sync.entries()[1].status, TagStatus::Failed);

	fixture.store.clear_failure(StoreOp::Commit);
	fixture.sync.load().await.unwrap();
	assert_eq!(fixture.sync.tags(), vec!["a"]);
}

#[tokio::test]
async fn rollback_policy_removes_the_failed_entry() {
	let fixture = Fixture::bound(config().with_rollback_on_failure(true), &["a"]).await;
	fixture.store.fail(StoreOp::Create);

	assert!(fixture.sync.add_tag("x").await.is_err());

	assert_eq!(fixture.sync.tags(), vec!["a"]);
	assert_eq!(fixture.notifier.messages().len(), 1);
}

#[tokio::test]
async fn workflows_run_after_a_committed_add() {
	let config = config()
		.with_after_create_action("Tags.AfterCreate")
		.with_on_change_flow(FlowDescriptor::new("Tags.OnChange").with_param("mode", "sync"));
	let fixture = Fixture::bound(config, &[]).await;

	let outcome = fixture.sync.add_tag("new").await.unwrap();

	assert_eq!(outcome.workflows().succeeded, vec!["Tags.AfterCreate", "Tags.OnChange"]);
	let calls = fixture.store.calls();
	assert_eq!(
		&calls[calls.len() - 2..],
		&[
			StoreCall::RunAction("Tags.AfterCreate".into(), owner_context()),
			StoreCall::RunFlow("Tags.OnChange".into(), owner_context()),
		]
	);
}

#[tokio::test]
async fn failing_workflow_keeps_the_tag() {
	let fixture = Fixture::bound(config().with_on_change_action("Tags.Audit"), &[]).await;
	fixture.store.fail_workflow("Tags.Audit");

	let outcome = fixture.sync.add_tag("new").await.unwrap();

	assert_eq!(outcome.workflows().failed.len(), 1);
	assert_eq!(fixture.notifier.messages(), vec!["Error while executing action Tags.Audit: Tags.Audit failed"]);
	assert_eq!(statuses(&fixture.sync), vec![("new".to_string(), TagStatus::Committed)]);
}

#[tokio::test]
async fn failed_store_sequence_skips_workflows() {
	let fixture = Fixture::bound(config().with_on_change_action("Tags.Audit"), &[]).await;
	fixture.store.fail(StoreOp::Commit);

	assert!(fixture.sync.add_tag("new").await.is_err());

	assert_eq!(fixture.store.count(|call| matches!(call, StoreCall::RunAction(..))), 0);
}
