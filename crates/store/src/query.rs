//! Query descriptions.

use std::fmt;

/// Filter applied to one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
	/// Every record of the entity.
	All,
	/// Store-specific constraint expression, already substituted.
	Constraint(String),
	/// Records whose attribute equals a value exactly.
	AttributeEquals { attribute: String, value: String },
}

/// A query over one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
	pub entity: String,
	pub filter: QueryFilter,
}

impl Query {
	pub fn all(entity: impl Into<String>) -> Self {
		Self {
			entity: entity.into(),
			filter: QueryFilter::All,
		}
	}

	/// Builds a constrained query. A blank constraint means no constraint.
	pub fn constrained(entity: impl Into<String>, constraint: impl Into<String>) -> Self {
		let constraint = constraint.into();
		if constraint.trim().is_empty() {
			return Self::all(entity);
		}
		Self {
			entity: entity.into(),
			filter: QueryFilter::Constraint(constraint),
		}
	}

	pub fn attribute_equals(entity: impl Into<String>, attribute: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			entity: entity.into(),
			filter: QueryFilter::AttributeEquals {
				attribute: attribute.into(),
				value: value.into(),
			},
		}
	}
}

/// Renders the query in XPath form, e.g. `//Blog.Tag[Name = 'rust']`.
impl fmt::Display for Query {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "//{}", self.entity)?;
		match &self.filter {
			QueryFilter::All => Ok(()),
			QueryFilter::Constraint(constraint) => f.write_str(constraint),
			QueryFilter::AttributeEquals { attribute, value } => write!(f, "[{attribute} = '{}']", value.replace('\'', "''")),
		}
	}
}
