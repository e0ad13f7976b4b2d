//! Job Scheduler
//!
//! Batches reactive work into flushes. Component updates and watcher
//! callbacks are queued as [`SchedulerJob`]s instead of running on every
//! write, so a component written to ten times in one tick renders once.
//!
//! ## Queues
//!
//! - **Main queue**: ordered by job id (component uid), so parents update
//!   before their children. `pre` jobs sort ahead of the update job with
//!   the same id.
//! - **Post-flush queue**: runs after the main queue drains (mounted and
//!   updated hooks, post watchers, keep-alive bookkeeping).
//!
//! ## Flushing
//!
//! The first enqueue of a tick requests a flush from the installed flush
//! scheduler. Without one (tests, headless hosts) flushes happen only on
//! [`flush_jobs`] or [`next_tick`]:
//!
//! ```ignore
//! use kindle_runtime::scheduler::{SchedulerJob, flush_jobs, queue_job};
//!
//! let job = SchedulerJob::new(|| println!("flushed"));
//! queue_job(job.clone());
//! queue_job(job); // deduplicated
//! flush_jobs(); // prints once
//! ```

use core::cell::{Cell, RefCell};
use core::cmp::Ordering;
use core::task::Poll;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use kindle_reactive::dev_warn;
use kindle_reactive::logging::dev_warnings_enabled;

use crate::settings;

/// A deferred flush, handed to the flush scheduler
pub type FlushTask = Box<dyn FnOnce()>;

type FlushScheduler = Rc<dyn Fn(FlushTask)>;

/// Run counts per job within one flush
type Seen = HashMap<usize, usize>;

struct JobInner {
	id: Option<u64>,
	pre: bool,
	active: Cell<bool>,
	allow_recurse: Cell<bool>,
	f: Box<dyn Fn()>,
}

/// A unit of work in the queue
///
/// Jobs are compared by identity: queueing a clone of a queued job is a
/// no-op.
#[derive(Clone)]
pub struct SchedulerJob(Rc<JobInner>);

impl SchedulerJob {
	/// A job without id; it runs after every job that has one
	pub fn new(f: impl Fn() + 'static) -> Self {
		Self::build(None, false, f)
	}

	/// A job ordered by `id`
	pub fn with_id(id: u64, f: impl Fn() + 'static) -> Self {
		Self::build(Some(id), false, f)
	}

	/// A job that runs ahead of the update job with the same id
	pub fn pre(id: Option<u64>, f: impl Fn() + 'static) -> Self {
		Self::build(id, true, f)
	}

	fn build(id: Option<u64>, pre: bool, f: impl Fn() + 'static) -> Self {
		Self(Rc::new(JobInner {
			id,
			pre,
			active: Cell::new(true),
			allow_recurse: Cell::new(false),
			f: Box::new(f),
		}))
	}

	pub fn id(&self) -> Option<u64> {
		self.0.id
	}

	pub fn is_pre(&self) -> bool {
		self.0.pre
	}

	pub fn is_active(&self) -> bool {
		self.0.active.get()
	}

	/// Inactive jobs stay queued but are skipped by flushes
	pub fn set_active(&self, active: bool) {
		self.0.active.set(active);
	}

	pub fn allows_recurse(&self) -> bool {
		self.0.allow_recurse.get()
	}

	/// Let the job re-queue itself while it is running
	pub fn set_allow_recurse(&self, allow: bool) {
		self.0.allow_recurse.set(allow);
	}

	/// Run the job now, outside any flush
	pub fn run(&self) {
		(self.0.f)();
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	fn sort_id(&self) -> u64 {
		self.0.id.unwrap_or(u64::MAX)
	}

	fn key(&self) -> usize {
		Rc::as_ptr(&self.0) as *const () as usize
	}
}

impl fmt::Debug for SchedulerJob {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SchedulerJob")
			.field("id", &self.0.id)
			.field("pre", &self.0.pre)
			.field("active", &self.0.active.get())
			.finish()
	}
}

fn compare(a: &SchedulerJob, b: &SchedulerJob) -> Ordering {
	a.sort_id()
		.cmp(&b.sort_id())
		.then_with(|| b.is_pre().cmp(&a.is_pre()))
}

struct Scheduler {
	queue: RefCell<Vec<SchedulerJob>>,
	flush_index: Cell<usize>,
	is_flushing: Cell<bool>,
	is_flush_pending: Cell<bool>,
	pending_post: RefCell<Vec<SchedulerJob>>,
	active_post: RefCell<Option<Vec<SchedulerJob>>>,
	post_index: Cell<usize>,
	flush_scheduler: RefCell<Option<FlushScheduler>>,
}

impl Scheduler {
	fn new() -> Self {
		Self {
			queue: RefCell::new(Vec::new()),
			flush_index: Cell::new(0),
			is_flushing: Cell::new(false),
			is_flush_pending: Cell::new(false),
			pending_post: RefCell::new(Vec::new()),
			active_post: RefCell::new(None),
			post_index: Cell::new(0),
			flush_scheduler: RefCell::new(None),
		}
	}
}

thread_local! {
	static SCHEDULER: Scheduler = Scheduler::new();
}

/// Install the function that runs requested flushes.
///
/// The scheduler is called at most once per tick, with a task that flushes
/// every queue when run.
///
/// # Example
///
/// ```ignore
/// kindle_runtime::scheduler::set_flush_scheduler(|task| {
///     my_event_loop::defer(task);
/// });
/// ```
pub fn set_flush_scheduler<F>(scheduler: F)
where
	F: Fn(FlushTask) + 'static,
{
	SCHEDULER.with(|s| *s.flush_scheduler.borrow_mut() = Some(Rc::new(scheduler)));
}

/// Go back to manual flushing
pub fn clear_flush_scheduler() {
	SCHEDULER.with(|s| *s.flush_scheduler.borrow_mut() = None);
}

/// Flush on the installed local executor (a tokio `LocalSet` by default)
pub fn use_tokio_scheduler() {
	set_flush_scheduler(|task| crate::task::spawn_local(async move { task() }));
}

/// Queue a job for the next flush
pub fn queue_job(job: SchedulerJob) {
	let queued = SCHEDULER.with(|s| {
		let mut queue = s.queue.borrow_mut();
		let flush_index = s.flush_index.get();
		let start = if s.is_flushing.get() && job.allows_recurse() {
			flush_index + 1
		} else {
			flush_index
		};
		if queue.iter().skip(start).any(|queued| queued.ptr_eq(&job)) {
			return false;
		}
		match job.id() {
			None => queue.push(job),
			Some(id) => {
				let at = insertion_index(&queue, flush_index, id);
				queue.insert(at, job);
			}
		}
		true
	});
	if queued {
		queue_flush();
	}
}

/// Binary search for `id` in the part of the queue that has not run yet
fn insertion_index(queue: &[SchedulerJob], flush_index: usize, id: u64) -> usize {
	let mut start = (flush_index + 1).min(queue.len());
	let mut end = queue.len();
	while start < end {
		let middle = (start + end) / 2;
		let job = &queue[middle];
		let middle_id = job.sort_id();
		if middle_id < id || (middle_id == id && job.is_pre()) {
			start = middle + 1;
		} else {
			end = middle;
		}
	}
	start
}

fn queue_flush() {
	let scheduler = SCHEDULER.with(|s| {
		if s.is_flushing.get() || s.is_flush_pending.get() {
			return None;
		}
		s.is_flush_pending.set(true);
		s.flush_scheduler.borrow().clone()
	});
	if let Some(schedule) = scheduler {
		schedule(Box::new(flush_jobs));
	}
}

/// Remove a queued job that has not started yet
pub fn invalidate_job(job: &SchedulerJob) {
	SCHEDULER.with(|s| {
		let mut queue = s.queue.borrow_mut();
		let flush_index = s.flush_index.get();
		let Some(at) = queue.iter().position(|queued| queued.ptr_eq(job)) else {
			return;
		};
		if at > flush_index || (!s.is_flushing.get() && at == flush_index) {
			queue.remove(at);
		}
	});
}

/// Queue a job for after the main queue drains
pub fn queue_post_flush_cb(job: SchedulerJob) {
	SCHEDULER.with(|s| {
		let active = s.active_post.borrow();
		let running = active.as_ref().is_some_and(|jobs| {
			let start = if job.allows_recurse() {
				s.post_index.get() + 1
			} else {
				s.post_index.get()
			};
			jobs.iter().skip(start).any(|queued| queued.ptr_eq(&job))
		});
		if !running {
			s.pending_post.borrow_mut().push(job);
		}
	});
	queue_flush();
}

/// Run queued `pre` jobs now, optionally only those owned by one component
pub fn flush_pre_flush_cbs(owner_uid: Option<u64>) {
	let mut index = SCHEDULER.with(|s| {
		if s.is_flushing.get() {
			s.flush_index.get() + 1
		} else {
			0
		}
	});
	loop {
		let next = SCHEDULER.with(|s| {
			let mut queue = s.queue.borrow_mut();
			let job = queue.get(index)?;
			let owned = owner_uid.is_none_or(|uid| job.id() == Some(uid));
			Some((job.is_pre() && owned).then(|| queue.remove(index)))
		});
		match next {
			None => break,
			Some(Some(job)) => {
				if job.is_active() {
					job.run();
				}
			}
			Some(None) => index += 1,
		}
	}
}

/// Run every pending post-flush job now
pub fn flush_post_flush_cbs() {
	let _guard = UnwindGuard;
	flush_post(&mut Seen::new());
}

/// Resets the flush state when a job panics, so later flushes still run.
///
/// Jobs left in the main queue are dropped; pending post-flush jobs are
/// kept for the next flush.
struct UnwindGuard;

impl Drop for UnwindGuard {
	fn drop(&mut self) {
		if !std::thread::panicking() {
			return;
		}
		let _ = SCHEDULER.try_with(|s| {
			s.queue.borrow_mut().clear();
			s.flush_index.set(0);
			s.is_flushing.set(false);
			s.is_flush_pending.set(false);
			*s.active_post.borrow_mut() = None;
			s.post_index.set(0);
		});
		tracing::error!(target: "kindle", "job panicked during flush; scheduler state reset");
	}
}

fn flush_post(seen: &mut Seen) {
	let started = SCHEDULER.with(|s| {
		let mut jobs: Vec<SchedulerJob> = Vec::new();
		for job in s.pending_post.borrow_mut().drain(..) {
			if !jobs.iter().any(|j| j.ptr_eq(&job)) {
				jobs.push(job);
			}
		}
		if jobs.is_empty() {
			return false;
		}
		let mut active = s.active_post.borrow_mut();
		if let Some(running) = active.as_mut() {
			running.extend(jobs);
			return false;
		}
		jobs.sort_by_key(SchedulerJob::sort_id);
		*active = Some(jobs);
		s.post_index.set(0);
		true
	});
	if !started {
		return;
	}

	let check = dev_warnings_enabled();
	loop {
		let job = SCHEDULER.with(|s| {
			let active = s.active_post.borrow();
			active.as_ref()?.get(s.post_index.get()).cloned()
		});
		let Some(job) = job else {
			break;
		};
		if job.is_active() && !(check && check_recursive_updates(seen, &job)) {
			job.run();
		}
		SCHEDULER.with(|s| s.post_index.set(s.post_index.get() + 1));
	}
	SCHEDULER.with(|s| {
		*s.active_post.borrow_mut() = None;
		s.post_index.set(0);
	});
}

/// Run the main queue, then post-flush jobs, until both are empty
pub fn flush_jobs() {
	flush_with(&mut Seen::new());
}

fn flush_with(seen: &mut Seen) {
	let started = SCHEDULER.with(|s| {
		if s.is_flushing.get() {
			return false;
		}
		s.is_flush_pending.set(false);
		s.is_flushing.set(true);
		s.queue.borrow_mut().sort_by(compare);
		true
	});
	if !started {
		return;
	}
	tracing::trace!(target: "kindle", "flush started");
	let _guard = UnwindGuard;

	let check = dev_warnings_enabled();
	loop {
		let job = SCHEDULER.with(|s| s.queue.borrow().get(s.flush_index.get()).cloned());
		let Some(job) = job else {
			break;
		};
		if job.is_active() && !(check && check_recursive_updates(seen, &job)) {
			job.run();
		}
		SCHEDULER.with(|s| s.flush_index.set(s.flush_index.get() + 1));
	}
	SCHEDULER.with(|s| {
		s.flush_index.set(0);
		s.queue.borrow_mut().clear();
	});

	flush_post(seen);

	let more = SCHEDULER.with(|s| {
		s.is_flushing.set(false);
		!s.queue.borrow().is_empty() || !s.pending_post.borrow().is_empty()
	});
	if more {
		flush_with(seen);
	}
}

fn check_recursive_updates(seen: &mut Seen, job: &SchedulerJob) -> bool {
	let limit = settings::with_current(|s| s.scheduler.recursion_limit);
	let count = seen.entry(job.key()).or_insert(0);
	if *count >= limit {
		match job.id() {
			Some(id) => dev_warn!(
				"Maximum recursive updates exceeded in job {}. A reactive effect is mutating its own dependencies and thus recursively triggering itself.",
				id
			),
			None => dev_warn!(
				"Maximum recursive updates exceeded. A reactive effect is mutating its own dependencies and thus recursively triggering itself."
			),
		}
		return true;
	}
	*count += 1;
	false
}

/// Whether any job is waiting for a flush
pub fn has_pending_jobs() -> bool {
	SCHEDULER.with(|s| !s.queue.borrow().is_empty() || !s.pending_post.borrow().is_empty())
}

/// Yield once to other local tasks, then run any pending flush
pub async fn next_tick() {
	let mut yielded = false;
	futures::future::poll_fn(|cx| {
		if yielded {
			Poll::Ready(())
		} else {
			yielded = true;
			cx.waker().wake_by_ref();
			Poll::Pending
		}
	})
	.await;
	flush_jobs();
}
