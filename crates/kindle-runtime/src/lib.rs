//! # Kindle Runtime
//!
//! The component layer on top of `kindle-reactive`: batched job
//! scheduling, component instances and their lifecycle, watchers, error
//! reporting, async components and keep-alive caching.
//!
//! ## Modules
//!
//! - **scheduler**: the job queue; component updates, pre and post jobs
//! - **component** / **lifecycle**: instances, setup, lifecycle hooks
//! - **renderer**: the contract a host renderer implements
//! - **watch**: `watch`, `watch_effect` and friends
//! - **async_component**: `define_async_component`
//! - **keep_alive**: the `KeepAlive` component and activation hooks
//! - **error_handling**: `report_error` and the error-captured chain
//! - **settings**: runtime settings from JSON or the environment
//! - **task**: the local executor used for loads and timers
//!
//! ## Example
//!
//! ```ignore
//! use kindle_runtime::{RuntimeSettings, keep_alive, scheduler};
//!
//! RuntimeSettings::from_env()?.install();
//! scheduler::use_tokio_scheduler();
//!
//! let app = VNode::component(&keep_alive(), Props::new(), vec![current_view]);
//! renderer.render(&app, &root);
//! ```

pub mod async_component;
pub mod component;
pub mod error;
pub mod error_handling;
pub mod keep_alive;
pub mod lifecycle;
pub mod renderer;
pub mod scheduler;
pub mod settings;
pub mod task;
pub mod vnode;
pub mod watch;

pub use async_component::{
	AsyncComponentOptions, AsyncLoader, FailHandle, LoadState, RetryHandle,
	define_async_component, define_async_loader, error_prop,
};
pub use component::{
	AppContext, ComponentDef, ComponentInstance, RenderFn, WeakInstance, current_instance,
	render_component_root, setup_component,
};
pub use error::{LoadError, RuntimeError, SettingsError};
pub use error_handling::{ErrorCode, report_error, take_unhandled_errors};
pub use keep_alive::{
	KeepAliveContext, KeepAliveProps, is_keep_alive, keep_alive, on_activated, on_deactivated,
	regex_pattern,
};
pub use lifecycle::{
	HookId, HookType, inject_hook, on_before_mount, on_before_unmount, on_before_update,
	on_error_captured, on_mounted, on_unmounted, on_updated,
};
pub use renderer::{MoveType, PatchContext, RendererInternals, setup_render_effect};
pub use scheduler::{SchedulerJob, flush_jobs, next_tick, queue_job, queue_post_flush_cb};
pub use settings::RuntimeSettings;
pub use vnode::{HostNode, Props, ShapeFlags, VNode, VNodeType, props};
pub use watch::{
	FlushTiming, WatchHandle, WatchOptions, WatchSource, watch, watch_effect, watch_post_effect,
	watch_sync_effect,
};
