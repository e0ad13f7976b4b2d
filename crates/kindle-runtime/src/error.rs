//! Error types for the component runtime

use kindle_reactive::ReactivityError;
use thiserror::Error;

/// Failure reported by an async component loader
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LoadError {
	message: String,
}

impl LoadError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

impl From<&str> for LoadError {
	fn from(message: &str) -> Self {
		Self::new(message)
	}
}

impl From<String> for LoadError {
	fn from(message: String) -> Self {
		Self::new(message)
	}
}

/// Errors surfaced through the runtime's error reporting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
	/// An async component loader failed
	#[error("{0}")]
	Load(#[from] LoadError),

	/// An async component did not resolve in time
	#[error("Async component timed out after {timeout_ms}ms.")]
	Timeout { timeout_ms: u64 },

	/// A proxy operation failed inside a hook or job
	#[error(transparent)]
	Reactivity(#[from] ReactivityError),

	/// A lifecycle hook returned an error
	#[error("{hook} hook failed: {message}")]
	Hook { hook: &'static str, message: String },
}

impl RuntimeError {
	/// Shorthand for a [`RuntimeError::Hook`] failure
	pub fn hook(hook: &'static str, message: impl Into<String>) -> Self {
		Self::Hook {
			hook,
			message: message.into(),
		}
	}
}

/// Errors while loading [`RuntimeSettings`](crate::settings::RuntimeSettings)
#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("Invalid settings document: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Invalid value {value:?} for {var}: {reason}")]
	InvalidEnv {
		var: &'static str,
		value: String,
		reason: String,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_timeout_message() {
		let err = RuntimeError::Timeout { timeout_ms: 3000 };
		assert_eq!(err.to_string(), "Async component timed out after 3000ms.");
	}

	#[test]
	fn test_load_error_displays_message() {
		let err = RuntimeError::from(LoadError::from("network down"));
		assert_eq!(err.to_string(), "network down");
	}
}
