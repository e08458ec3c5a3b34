//! Error types for configuration parsing.

use thiserror::Error;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error parsing JSON syntax or shape.
	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	/// The tag entity path is not of the form `Reference/Entity`.
	#[error("invalid tag entity path: {0:?} (expected 'Reference/Entity')")]
	InvalidEntityPath(String),

	/// A required field is missing or blank.
	#[error("missing required field: {0}")]
	MissingField(&'static str),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
