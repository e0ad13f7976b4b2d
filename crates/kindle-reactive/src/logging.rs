//! Development warnings
//!
//! Misuse of the reactive API (wrapping a primitive, writing through a
//! readonly proxy, ...) is reported as a development warning instead of an
//! error. Warnings are emitted through [`dev_warn!`]:
//!
//! | Condition | Destination |
//! |-----------|-------------|
//! | dev warnings disabled | nothing |
//! | warn handler installed | the handler |
//! | otherwise | `tracing::warn!` on target `kindle` |
//!
//! Dev warnings default to on in debug builds (`debug_assertions`) and are
//! configured per thread, like the rest of the reactive runtime.
//!
//! ## Example
//!
//! ```ignore
//! use kindle_reactive::dev_warn;
//!
//! dev_warn!("value cannot be made reactive: {}", value);
//! ```

use core::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handler receiving formatted dev warnings
pub type WarnHandler = Rc<dyn Fn(&str)>;

thread_local! {
	static DEV_WARNINGS: Cell<bool> = const { Cell::new(cfg!(debug_assertions)) };
	static WARN_HANDLER: RefCell<Option<WarnHandler>> = const { RefCell::new(None) };
}

/// Enable or disable dev warnings on the current thread
pub fn set_dev_warnings(enabled: bool) {
	DEV_WARNINGS.with(|flag| flag.set(enabled));
}

/// Whether dev warnings are enabled on the current thread
pub fn dev_warnings_enabled() -> bool {
	DEV_WARNINGS.try_with(Cell::get).unwrap_or(false)
}

/// Route dev warnings to `handler` instead of `tracing`.
///
/// Returns the previously installed handler.
pub fn set_warn_handler(handler: impl Fn(&str) + 'static) -> Option<WarnHandler> {
	WARN_HANDLER.with(|slot| slot.borrow_mut().replace(Rc::new(handler)))
}

/// Remove the installed warn handler
pub fn clear_warn_handler() -> Option<WarnHandler> {
	WARN_HANDLER.with(|slot| slot.borrow_mut().take())
}

#[doc(hidden)]
pub fn emit_dev_warning(message: String) {
	let handler = WARN_HANDLER
		.try_with(|slot| slot.borrow().clone())
		.ok()
		.flatten();
	match handler {
		Some(handler) => handler(&message),
		None => tracing::warn!(target: "kindle", "[kindle warn]: {}", message),
	}
}

/// Emits a development warning
///
/// No-op unless dev warnings are enabled on the current thread.
///
/// # Example
///
/// ```ignore
/// dev_warn!("Set operation on key \"{}\" failed: target is readonly.", key);
/// ```
#[macro_export]
macro_rules! dev_warn {
	($($arg:tt)*) => {{
		if $crate::logging::dev_warnings_enabled() {
			$crate::logging::emit_dev_warning(format!($($arg)*));
		}
	}};
}
