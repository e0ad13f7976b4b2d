//! Runtime settings
//!
//! Settings are plain serde structures with defaults for every field, so a
//! partial JSON document or a partial environment is enough to build them.
//!
//! | Field | Environment variable | Default |
//! |-------|----------------------|---------|
//! | `dev_warnings` | `KINDLE_DEV_WARNINGS` | debug builds only |
//! | `async_component.default_delay_ms` | `KINDLE_ASYNC_DELAY_MS` | 200 |
//! | `scheduler.recursion_limit` | `KINDLE_RECURSION_LIMIT` | 100 |
//! | `keep_alive.default_max` | `KINDLE_KEEP_ALIVE_MAX` | unlimited |
//!
//! Settings take effect per thread once [`RuntimeSettings::install`] is
//! called.

use core::cell::RefCell;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

pub const ENV_DEV_WARNINGS: &str = "KINDLE_DEV_WARNINGS";
pub const ENV_ASYNC_DELAY_MS: &str = "KINDLE_ASYNC_DELAY_MS";
pub const ENV_RECURSION_LIMIT: &str = "KINDLE_RECURSION_LIMIT";
pub const ENV_KEEP_ALIVE_MAX: &str = "KINDLE_KEEP_ALIVE_MAX";

thread_local! {
	static CURRENT: RefCell<RuntimeSettings> = RefCell::new(RuntimeSettings::default());
}

/// Top-level runtime settings
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
	/// Emit development warnings
	pub dev_warnings: bool,
	pub async_component: AsyncComponentSettings,
	pub scheduler: SchedulerSettings,
	pub keep_alive: KeepAliveSettings,
}

impl Default for RuntimeSettings {
	fn default() -> Self {
		Self {
			dev_warnings: cfg!(debug_assertions),
			async_component: AsyncComponentSettings::default(),
			scheduler: SchedulerSettings::default(),
			keep_alive: KeepAliveSettings::default(),
		}
	}
}

/// Async component defaults
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncComponentSettings {
	/// Delay before the loading component is shown, in milliseconds
	pub default_delay_ms: u64,
}

impl Default for AsyncComponentSettings {
	fn default() -> Self {
		Self {
			default_delay_ms: 200,
		}
	}
}

/// Job queue limits
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
	/// Maximum runs of a single job within one flush
	pub recursion_limit: usize,
}

impl Default for SchedulerSettings {
	fn default() -> Self {
		Self {
			recursion_limit: 100,
		}
	}
}

/// Keep-alive defaults
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveSettings {
	/// Cache size used when a keep-alive sets no `max`; `None` is unlimited
	pub default_max: Option<usize>,
}

impl RuntimeSettings {
	/// Parse settings from a JSON document; missing fields keep their defaults
	pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
		Ok(serde_json::from_str(json)?)
	}

	/// Build settings from the process environment
	pub fn from_env() -> Result<Self, SettingsError> {
		Self::from_lookup(|var| std::env::var(var).ok())
	}

	/// Build settings from an arbitrary variable lookup
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
		let mut settings = Self::default();
		if let Some(value) = lookup(ENV_DEV_WARNINGS) {
			settings.dev_warnings = parse_flag(ENV_DEV_WARNINGS, &value)?;
		}
		if let Some(value) = lookup(ENV_ASYNC_DELAY_MS) {
			settings.async_component.default_delay_ms = parse_number(ENV_ASYNC_DELAY_MS, &value)?;
		}
		if let Some(value) = lookup(ENV_RECURSION_LIMIT) {
			settings.scheduler.recursion_limit = parse_number(ENV_RECURSION_LIMIT, &value)?;
		}
		if let Some(value) = lookup(ENV_KEEP_ALIVE_MAX) {
			let max: usize = parse_number(ENV_KEEP_ALIVE_MAX, &value)?;
			settings.keep_alive.default_max = (max > 0).then_some(max);
		}
		Ok(settings)
	}

	/// Make these the settings of the current thread
	pub fn install(&self) {
		kindle_reactive::logging::set_dev_warnings(self.dev_warnings);
		CURRENT.with(|current| *current.borrow_mut() = self.clone());
		tracing::debug!(target: "kindle", settings = ?self, "runtime settings installed");
	}

	/// The settings installed on the current thread
	pub fn current() -> Self {
		CURRENT.with(|current| current.borrow().clone())
	}
}

/// Read one field of the current thread's settings
pub(crate) fn with_current<R>(f: impl FnOnce(&RuntimeSettings) -> R) -> R {
	CURRENT.with(|current| f(&current.borrow()))
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, SettingsError> {
	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(SettingsError::InvalidEnv {
			var,
			value: value.to_string(),
			reason: "expected a boolean".to_string(),
		}),
	}
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, SettingsError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	value
		.trim()
		.parse()
		.map_err(|err: T::Err| SettingsError::InvalidEnv {
			var,
			value: value.to_string(),
			reason: err.to_string(),
		})
}
