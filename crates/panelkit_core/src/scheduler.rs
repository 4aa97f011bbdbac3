//! Serial update scheduler
//!
//! A single FIFO queue of update tasks shared by every node of a panel. Tasks
//! run one at a time: a task starts only after the previous one (and anything
//! it awaits) has completed. This gives a total order over all update work, so
//! two nodes never interleave their hooks mid-update.
//!
//! The scheduler is single-threaded and cooperative. It is handed to nodes at
//! construction as a cloneable handle; all clones share one queue.
//!
//! # Driving the queue
//!
//! The host pumps the queue. [`UpdateScheduler::push`] only enqueues and never
//! drives anything itself; queued work runs only when the host calls
//! [`UpdateScheduler::drain`] (from its own executor) or
//! [`UpdateScheduler::run_until_idle`], typically once per turn of its event
//! loop after handling input. Until then `set_props` changes sit in the queue
//! and no hooks or `render` events fire.
//!
//! ```
//! use panelkit_core::scheduler::UpdateScheduler;
//!
//! let scheduler = UpdateScheduler::new();
//! scheduler.push(async { Ok(()) });
//! scheduler.push(async { Ok(()) });
//! assert_eq!(scheduler.pending(), 2);
//!
//! assert_eq!(scheduler.run_until_idle(), 2);
//! assert!(scheduler.is_idle());
//! ```
//!
//! # Failures
//!
//! A task that returns an error is logged at error level, counted in
//! [`SchedulerStats::failed`], and handed to the failure handler set with
//! [`UpdateScheduler::on_failure`]. The queue then moves on to the next task.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::{PanelError, Result};

/// A queued unit of update work
pub type UpdateTask = LocalBoxFuture<'static, Result<()>>;

/// Receives errors from failed tasks
pub type FailureHandler = Rc<dyn Fn(&PanelError)>;

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Name used in log output
    pub name: String,
    /// Queue length at which a warning is logged
    pub max_queue_warn: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "updates".to_string(),
            max_queue_warn: 256,
        }
    }
}

/// Counters describing scheduler activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub pushed: u64,
    pub completed: u64,
    pub failed: u64,
    pub pending: usize,
}

struct SchedulerInner {
    queue: VecDeque<UpdateTask>,
    draining: bool,
    /// Set once the queue crossed `max_queue_warn`, cleared when it drains
    warned: bool,
    failure_handler: Option<FailureHandler>,
    pushed: u64,
    completed: u64,
    failed: u64,
}

/// Shared FIFO executor for update tasks
#[derive(Clone)]
pub struct UpdateScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
    config: Rc<SchedulerConfig>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                queue: VecDeque::new(),
                draining: false,
                warned: false,
                failure_handler: None,
                pushed: 0,
                completed: 0,
                failed: 0,
            })),
            config: Rc::new(config),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Append a task to the queue
    ///
    /// The task never runs inline, and pushing does not start a drain; it
    /// runs the next time the host calls [`drain`](Self::drain) or
    /// [`run_until_idle`](Self::run_until_idle).
    pub fn push<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        inner.queue.push_back(Box::pin(task));
        inner.pushed += 1;

        let len = inner.queue.len();
        if len >= self.config.max_queue_warn && !inner.warned {
            inner.warned = true;
            tracing::warn!(
                scheduler = %self.config.name,
                pending = len,
                "update queue is growing; is anything draining it?"
            );
        }
        tracing::trace!(scheduler = %self.config.name, pending = len, "task queued");
    }

    /// Install the handler that receives errors from failed tasks
    pub fn on_failure<F>(&self, handler: F)
    where
        F: Fn(&PanelError) + 'static,
    {
        self.inner.borrow_mut().failure_handler = Some(Rc::new(handler));
    }

    /// Number of queued tasks not yet started
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.borrow().draining
    }

    /// No queued tasks and nothing running
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.queue.is_empty() && !inner.draining
    }

    pub fn stats(&self) -> SchedulerStats {
        let inner = self.inner.borrow();
        SchedulerStats {
            pushed: inner.pushed,
            completed: inner.completed,
            failed: inner.failed,
            pending: inner.queue.len(),
        }
    }

    /// Run queued tasks in order until the queue is empty
    ///
    /// Tasks pushed while draining run in the same pass. If a drain is
    /// already in progress this returns immediately with 0; the active drain
    /// will pick up anything new. Returns the number of tasks run.
    pub async fn drain(&self) -> usize {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.draining {
                return 0;
            }
            inner.draining = true;
        }
        let _guard = DrainGuard(&self.inner);

        let mut ran = 0;
        loop {
            let next = self.inner.borrow_mut().queue.pop_front();
            let Some(task) = next else {
                break;
            };

            let result = task.await;
            ran += 1;
            match result {
                Ok(()) => self.inner.borrow_mut().completed += 1,
                Err(err) => self.report_failure(err),
            }
        }

        if ran > 0 {
            tracing::debug!(scheduler = %self.config.name, ran, "update queue drained");
        }
        ran
    }

    /// Block the current thread until the queue is empty
    pub fn run_until_idle(&self) -> usize {
        futures::executor::block_on(self.drain())
    }

    fn report_failure(&self, err: PanelError) {
        let handler = {
            let mut inner = self.inner.borrow_mut();
            inner.failed += 1;
            inner.failure_handler.clone()
        };

        tracing::error!(scheduler = %self.config.name, error = %err, "update task failed");
        if let Some(handler) = handler {
            handler(&err);
        }
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("name", &self.config.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Clears the draining flag even if the drain future is dropped mid-task
struct DrainGuard<'a>(&'a RefCell<SchedulerInner>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.borrow_mut();
        inner.draining = false;
        if inner.queue.is_empty() {
            inner.warned = false;
        }
    }
}
