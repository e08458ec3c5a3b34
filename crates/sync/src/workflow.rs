//! Post-change workflow dispatch.

use std::fmt;
use std::sync::Arc;

use taglink_config::TagConfig;
use taglink_store::{FlowDescriptor, NotificationSink, ObjectStore, StoreError, WorkflowContext};
use thiserror::Error;

use crate::scope::OwnerScope;

/// When a workflow is configured to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowTrigger {
	AfterCreate,
	OnChange,
}

impl WorkflowTrigger {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AfterCreate => "after create",
			Self::OnChange => "on change",
		}
	}
}

impl fmt::Display for WorkflowTrigger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A configured post-change procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowAction {
	NamedAction { name: String },
	ParamFlow { descriptor: FlowDescriptor },
}

impl WorkflowAction {
	pub fn name(&self) -> &str {
		match self {
			Self::NamedAction { name } => name,
			Self::ParamFlow { descriptor } => &descriptor.name,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.name().trim().is_empty()
	}
}

/// An action bound to its trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredWorkflow {
	pub trigger: WorkflowTrigger,
	pub action: WorkflowAction,
}

impl ConfiguredWorkflow {
	/// Non-empty workflows of `config` in dispatch order: after-create action,
	/// on-change action, after-create flow, on-change flow.
	pub fn from_config(config: &TagConfig) -> Vec<Self> {
		let named = |trigger, name: &Option<String>| {
			name.clone().map(|name| Self {
				trigger,
				action: WorkflowAction::NamedAction { name },
			})
		};
		let flow = |trigger, descriptor: &Option<FlowDescriptor>| {
			descriptor.clone().map(|descriptor| Self {
				trigger,
				action: WorkflowAction::ParamFlow { descriptor },
			})
		};

		[
			named(WorkflowTrigger::AfterCreate, &config.after_create_action),
			named(WorkflowTrigger::OnChange, &config.on_change_action),
			flow(WorkflowTrigger::AfterCreate, &config.after_create_flow),
			flow(WorkflowTrigger::OnChange, &config.on_change_flow),
		]
		.into_iter()
		.flatten()
		.filter(|workflow| !workflow.action.is_empty())
		.collect()
	}
}

/// One failed workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{trigger} workflow {name} failed: {error}")]
pub struct WorkflowFailure {
	pub trigger: WorkflowTrigger,
	pub name: String,
	pub error: StoreError,
}

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
	/// Names of workflows that completed, in order.
	pub succeeded: Vec<String>,
	pub failed: Vec<WorkflowFailure>,
	/// The owner scope was cancelled before every workflow ran.
	pub cancelled: bool,
}

/// Runs configured workflows after a tag was attached or detached.
pub struct WorkflowDispatcher {
	store: Arc<dyn ObjectStore>,
	notifier: Arc<dyn NotificationSink>,
	workflows: Vec<ConfiguredWorkflow>,
}

impl WorkflowDispatcher {
	pub fn new(store: Arc<dyn ObjectStore>, notifier: Arc<dyn NotificationSink>, workflows: Vec<ConfiguredWorkflow>) -> Self {
		Self { store, notifier, workflows }
	}

	pub fn from_config(store: Arc<dyn ObjectStore>, notifier: Arc<dyn NotificationSink>, config: &TagConfig) -> Self {
		Self::new(store, notifier, ConfiguredWorkflow::from_config(config))
	}

	pub fn workflows(&self) -> &[ConfiguredWorkflow] {
		&self.workflows
	}

	/// Runs every workflow in order with `context`.
	///
	/// A failure is reported to the notifier and does not stop the remaining
	/// workflows. Cancellation of `scope` does.
	pub async fn dispatch(&self, context: &WorkflowContext, scope: &OwnerScope) -> DispatchReport {
		let mut report = DispatchReport::default();
		for workflow in &self.workflows {
			let invocation = async {
				match &workflow.action {
					WorkflowAction::NamedAction { name } => self.store.run_action(name, context).await,
					WorkflowAction::ParamFlow { descriptor } => self.store.run_flow(descriptor, context).await,
				}
			};
			let Ok(result) = scope.guard(invocation).await else {
				report.cancelled = true;
				break;
			};

			let name = workflow.action.name().to_string();
			match result {
				Ok(()) => {
					tracing::debug!(owner = %context.id, trigger = %workflow.trigger, workflow = %name, "Workflow completed");
					report.succeeded.push(name);
				}
				Err(error) => {
					tracing::warn!(owner = %context.id, trigger = %workflow.trigger, workflow = %name, error = %error, "Workflow failed");
					self.notifier.error(&failure_message(workflow, &error));
					report.failed.push(WorkflowFailure {
						trigger: workflow.trigger,
						name,
						error,
					});
				}
			}
		}
		report
	}
}

fn failure_message(workflow: &ConfiguredWorkflow, error: &StoreError) -> String {
	match &workflow.action {
		WorkflowAction::NamedAction { name } => format!("Error while executing action {name}: {error}"),
		WorkflowAction::ParamFlow { descriptor } => {
			format!("An error occurred while executing the {} flow {}: {error}", workflow.trigger, descriptor.name)
		}
	}
}
