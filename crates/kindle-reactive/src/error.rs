//! Error types for the reactive layer

/// Errors returned by proxy operations.
///
/// Every variant is also reported as a dev warning at the point of failure;
/// callers that only care about the happy path may ignore the `Result`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactivityError {
	/// A write was attempted through a readonly proxy
	#[error("{operation} operation on key \"{key}\" failed: target is readonly")]
	ReadonlyMutation {
		/// Operation name (`set`, `delete`, `add`, `clear`, ...)
		operation: &'static str,
		/// Key involved, or empty for key-less operations
		key: String,
	},

	/// The operation does not exist for this kind of target
	#[error("operation '{operation}' is not supported on {target_type} targets")]
	UnsupportedOperation {
		operation: &'static str,
		/// Raw type name of the target
		target_type: &'static str,
	},

	/// The key cannot address a property of this target
	#[error("invalid key {key} for {target_type} target")]
	InvalidKey { key: String, target_type: &'static str },
}
