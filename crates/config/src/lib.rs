//! Configuration for tag list synchronization.
//!
//! A [`TagConfig`] describes which reference of the owner record holds the tags,
//! which entity and attribute back each tag, how suggestions are sourced, the
//! tag limit, and which workflows run after a change. It is usually written by
//! the host in TOML or JSON using camelCase keys:
//!
//! ```toml
//! tagEntity = "Blog.Post_Tag/Blog.Tag"
//! tagAttribute = "Name"
//! tagConstraint = "[Blog.Tag_Owner = '[%CurrentObject%]']"
//! tagLimit = 5
//! tagLimitMessage = "At most {limit} tags"
//! editable = "default"
//! enableSuggestions = true
//! lazyLoad = false
//! onChangeAction = "Blog.OnTagsChanged"
//!
//! [afterCreateFlow]
//! name = "Blog.AfterTagCreate"
//! params = { Progress = "none" }
//! ```

pub mod error;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
pub use error::{ConfigError, Result};
pub use taglink_store::FlowDescriptor;

/// Placeholder in [`TagConfig::tag_limit_message`] replaced by the limit.
pub const LIMIT_PLACEHOLDER: &str = "{limit}";

/// Default message shown when the tag limit is reached.
pub const DEFAULT_LIMIT_MESSAGE: &str = "Tag limit of {limit} reached";

/// Reference name plus target entity, parsed from `"Reference/Entity"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct EntityPath {
	pub reference: String,
	pub entity: String,
}

impl FromStr for EntityPath {
	type Err = ConfigError;

	fn from_str(path: &str) -> Result<Self> {
		let segments: Vec<&str> = path.split('/').map(str::trim).collect();
		let (Some(reference), Some(entity)) = (segments.first(), segments.last()) else {
			return Err(ConfigError::InvalidEntityPath(path.to_string()));
		};
		if segments.len() < 2 || reference.is_empty() || entity.is_empty() {
			return Err(ConfigError::InvalidEntityPath(path.to_string()));
		}
		Ok(Self {
			reference: reference.to_string(),
			entity: entity.to_string(),
		})
	}
}

impl TryFrom<String> for EntityPath {
	type Error = ConfigError;

	fn try_from(path: String) -> Result<Self> {
		path.parse()
	}
}

impl fmt::Display for EntityPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.reference, self.entity)
	}
}

/// Whether the tag list may be edited at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Editable {
	/// Editable unless the host marks the reference read-only.
	#[default]
	Default,
	/// Never editable.
	Never,
}

/// Tag list configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagConfig {
	/// Reference on the owner and the tag entity it points at.
	pub tag_entity: EntityPath,
	/// Attribute of the tag entity holding the tag text.
	pub tag_attribute: String,
	/// Constraint template appended to the suggestion query.
	#[serde(default)]
	pub tag_constraint: Option<String>,
	/// Maximum number of tags, `0` for unlimited.
	#[serde(default)]
	pub tag_limit: u32,
	#[serde(default = "default_limit_message")]
	pub tag_limit_message: String,
	#[serde(default)]
	pub editable: Editable,
	#[serde(default = "default_true")]
	pub enable_suggestions: bool,
	/// Defer the first suggestion load until the user interacts with the input.
	#[serde(default)]
	pub lazy_load: bool,
	#[serde(default)]
	pub after_create_action: Option<String>,
	#[serde(default)]
	pub on_change_action: Option<String>,
	#[serde(default)]
	pub after_create_flow: Option<FlowDescriptor>,
	#[serde(default)]
	pub on_change_flow: Option<FlowDescriptor>,
	/// Undo the optimistic projection when a store operation fails.
	#[serde(default)]
	pub rollback_on_failure: bool,
}

fn default_limit_message() -> String {
	DEFAULT_LIMIT_MESSAGE.to_string()
}

fn default_true() -> bool {
	true
}

impl TagConfig {
	/// Creates a configuration with defaults for everything but the entity path and attribute.
	pub fn new(tag_entity: &str, tag_attribute: impl Into<String>) -> Result<Self> {
		let config = Self {
			tag_entity: tag_entity.parse()?,
			tag_attribute: tag_attribute.into(),
			tag_constraint: None,
			tag_limit: 0,
			tag_limit_message: default_limit_message(),
			editable: Editable::Default,
			enable_suggestions: true,
			lazy_load: false,
			after_create_action: None,
			on_change_action: None,
			after_create_flow: None,
			on_change_flow: None,
			rollback_on_failure: false,
		};
		config.validate()?;
		Ok(config)
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Parses and validates a JSON document.
	pub fn from_json_str(input: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks invariants serde cannot express.
	pub fn validate(&self) -> Result<()> {
		if self.tag_attribute.trim().is_empty() {
			return Err(ConfigError::MissingField("tagAttribute"));
		}
		Ok(())
	}

	pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
		self.tag_constraint = Some(constraint.into());
		self
	}

	pub fn with_limit(mut self, limit: u32, message: impl Into<String>) -> Self {
		self.tag_limit = limit;
		self.tag_limit_message = message.into();
		self
	}

	pub fn with_editable(mut self, editable: Editable) -> Self {
		self.editable = editable;
		self
	}

	pub fn with_lazy_load(mut self, lazy_load: bool) -> Self {
		self.lazy_load = lazy_load;
		self
	}

	pub fn with_suggestions(mut self, enabled: bool) -> Self {
		self.enable_suggestions = enabled;
		self
	}

	pub fn with_after_create_action(mut self, name: impl Into<String>) -> Self {
		self.after_create_action = Some(name.into());
		self
	}

	pub fn with_on_change_action(mut self, name: impl Into<String>) -> Self {
		self.on_change_action = Some(name.into());
		self
	}

	pub fn with_after_create_flow(mut self, flow: FlowDescriptor) -> Self {
		self.after_create_flow = Some(flow);
		self
	}

	pub fn with_on_change_flow(mut self, flow: FlowDescriptor) -> Self {
		self.on_change_flow = Some(flow);
		self
	}

	pub fn with_rollback_on_failure(mut self, rollback: bool) -> Self {
		self.rollback_on_failure = rollback;
		self
	}

	/// Reference name on the owner record.
	pub fn reference(&self) -> &str {
		&self.tag_entity.reference
	}

	/// Tag entity type name.
	pub fn entity(&self) -> &str {
		&self.tag_entity.entity
	}

	/// Effective limit, `None` when unlimited.
	pub fn limit(&self) -> Option<usize> {
		(self.tag_limit > 0).then_some(self.tag_limit as usize)
	}

	/// Limit message with the first `{limit}` replaced by the configured limit.
	pub fn limit_message(&self) -> String {
		self.tag_limit_message.replacen(LIMIT_PLACEHOLDER, &self.tag_limit.to_string(), 1)
	}
}
