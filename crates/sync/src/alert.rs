//! Single-slot alert shown under the tag input.

use std::fmt;

/// Why the alert was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
	/// The configured tag limit is reached or exceeded.
	LimitExceeded,
	/// The value is already in the tag list.
	Duplicate,
	/// The host reported a validation error for the reference.
	ValidationRejected,
}

/// Transient message; the last write wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
	pub kind: AlertKind,
	pub message: String,
}

impl Alert {
	pub fn limit(message: impl Into<String>) -> Self {
		Self {
			kind: AlertKind::LimitExceeded,
			message: message.into(),
		}
	}

	pub fn duplicate(value: &str) -> Self {
		Self {
			kind: AlertKind::Duplicate,
			message: format!("Duplicate {value}"),
		}
	}

	pub fn validation(reason: impl Into<String>) -> Self {
		Self {
			kind: AlertKind::ValidationRejected,
			message: reason.into(),
		}
	}
}

impl fmt::Display for Alert {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.message)
	}
}
