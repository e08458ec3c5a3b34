//! Workflow invocation payloads.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{ObjectId, Record};

/// Context handed to every workflow: the owner record's type and identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowContext {
	pub entity: String,
	pub id: ObjectId,
}

impl WorkflowContext {
	pub fn for_record(record: &Record) -> Self {
		Self {
			entity: record.entity().to_string(),
			id: record.id().clone(),
		}
	}
}

/// A parameterized flow, as configured by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlowDescriptor {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub params: BTreeMap<String, String>,
}

impl FlowDescriptor {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			params: BTreeMap::new(),
		}
	}

	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.insert(key.into(), value.into());
		self
	}

	/// A flow without a name is not configured.
	pub fn is_empty(&self) -> bool {
		self.name.trim().is_empty()
	}
}
