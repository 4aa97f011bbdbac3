//! Reactive nodes
//!
//! A [`Node`] is the unit every widget is built on. It ties together a
//! [`PropsStore`], an [`EventBus`], the component's [`Lifecycle`] hooks and
//! the shared [`UpdateScheduler`].
//!
//! `Node` is a cheap handle (`Rc`); clones refer to the same node. Nodes are
//! single-threaded.
//!
//! # Updates
//!
//! ```text
//! set_props(partial)
//!     ↓ reconcile against current props
//! modified && initialized?
//!     ↓ yes
//! scheduler.push(run_update)      (or run inline with SetProps::sync)
//!     ↓ later, in FIFO order
//! init? → render → commit → "render" event
//! ```
//!
//! A node that has not been initialized (see [`Node::mount`]) still records
//! changes but schedules nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{PanelError, Result};
use crate::events::{EventBus, RENDER_EVENT};
use crate::lifecycle::{self, Lifecycle};
use crate::props::{DepKeys, NodeType, PropsStore, UnknownKeys};
use crate::scheduler::UpdateScheduler;
use crate::value::{Callback, Props, Value};

/// Options for [`Node::set_props_with`]
#[derive(Debug, Clone, Default)]
pub struct SetProps {
    on_render_once: Option<Callback>,
    sync: bool,
    unknown_keys: UnknownKeys,
}

impl SetProps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` once, after the next render
    ///
    /// Registered whether or not this update changes anything, but not when
    /// the update is rejected.
    pub fn on_render_once(mut self, callback: Callback) -> Self {
        self.on_render_once = Some(callback);
        self
    }

    /// Run the update inline instead of queueing it
    ///
    /// The update may interleave with tasks other nodes already queued.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// How to treat keys the node type does not declare (default: reject)
    pub fn unknown_keys(mut self, policy: UnknownKeys) -> Self {
        self.unknown_keys = policy;
        self
    }
}

struct NodeInner {
    node_type: Rc<NodeType>,
    store: RefCell<PropsStore>,
    events: EventBus,
    scheduler: UpdateScheduler,
    lifecycle: Rc<dyn Lifecycle>,
    initialized: Cell<bool>,
    destroyed: Cell<bool>,
}

/// Handle to a reactive node
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    /// Create a node of `node_type` with `initial` merged over its defaults
    pub fn new(
        node_type: Rc<NodeType>,
        initial: Props,
        scheduler: UpdateScheduler,
        lifecycle: Rc<dyn Lifecycle>,
    ) -> Result<Self> {
        let store = PropsStore::new(node_type.clone(), &initial)?;
        tracing::trace!(node = %node_type.name(), "node created");

        Ok(Self {
            inner: Rc::new(NodeInner {
                node_type,
                store: RefCell::new(store),
                events: EventBus::new(),
                scheduler,
                lifecycle,
                initialized: Cell::new(false),
                destroyed: Cell::new(false),
            }),
        })
    }

    /// Like [`Node::new`], from an untyped value
    ///
    /// `initial` must be a record or null; anything else fails with
    /// [`PanelError::InvalidArgument`].
    pub fn from_value(
        node_type: Rc<NodeType>,
        initial: Value,
        scheduler: UpdateScheduler,
        lifecycle: Rc<dyn Lifecycle>,
    ) -> Result<Self> {
        let initial = match initial {
            Value::Map(props) => props,
            Value::Null => Props::new(),
            other => {
                return Err(PanelError::InvalidArgument(format!(
                    "initial props for {} must be a record, got {}",
                    node_type.name(),
                    other.kind()
                )))
            }
        };
        Self::new(node_type, initial, scheduler, lifecycle)
    }

    pub fn node_type(&self) -> &Rc<NodeType> {
        &self.inner.node_type
    }

    pub fn type_name(&self) -> &str {
        self.inner.node_type.name()
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.inner.scheduler
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub(crate) fn lifecycle(&self) -> Rc<dyn Lifecycle> {
        self.inner.lifecycle.clone()
    }

    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&PropsStore) -> R) -> R {
        f(&*self.inner.store.borrow())
    }

    pub(crate) fn with_store_mut<R>(&self, f: impl FnOnce(&mut PropsStore) -> R) -> R {
        f(&mut *self.inner.store.borrow_mut())
    }

    // =========================================================================
    // PROPS
    // =========================================================================

    /// Snapshot of the current props; safe to mutate
    pub fn props(&self) -> Props {
        self.get_props()
    }

    pub fn get_props(&self) -> Props {
        self.with_store(PropsStore::get_props)
    }

    /// Snapshot of a single prop
    pub fn prop(&self, key: &str) -> Option<Value> {
        self.with_store(|store| store.props().get(key).map(crate::clone::deep_clone))
    }

    /// Top-level keys changed since the last completed update
    pub fn changed_keys(&self) -> Vec<String> {
        self.with_store(|store| store.changed_keys().into_iter().map(str::to_string).collect())
    }

    /// Merge `partial` and queue an update if anything changed
    ///
    /// Returns whether an update was scheduled. The update has not run yet
    /// when this returns.
    pub fn set_props(&self, partial: Props) -> Result<bool> {
        let update = self.reconcile_partial(&partial, &SetProps::default())?;
        if update {
            self.schedule_update();
        }
        Ok(update)
    }

    /// Merge `partial` with explicit options
    ///
    /// With [`SetProps::sync`] the update runs before this returns and hook
    /// failures are returned here; otherwise it is queued like
    /// [`Node::set_props`].
    pub async fn set_props_with(&self, partial: Props, options: SetProps) -> Result<bool> {
        let update = self.reconcile_partial(&partial, &options)?;
        if update {
            if options.sync {
                lifecycle::run_update(self.clone()).await?;
            } else {
                self.schedule_update();
            }
        }
        Ok(update)
    }

    fn reconcile_partial(&self, partial: &Props, options: &SetProps) -> Result<bool> {
        if self.is_destroyed() {
            return Err(PanelError::Destroyed(self.type_name().to_string()));
        }

        let modified = self.with_store_mut(|store| store.apply(partial, options.unknown_keys))?;

        // A rejected update leaves no listener behind
        if let Some(callback) = &options.on_render_once {
            self.inner.events.once(RENDER_EVENT, callback.clone());
        }
        tracing::trace!(node = %self.type_name(), modified, "props reconciled");
        Ok(modified && self.is_initialized())
    }

    fn schedule_update(&self) {
        tracing::debug!(node = %self.type_name(), "update scheduled");
        self.inner.scheduler.push(lifecycle::run_update(self.clone()));
    }

    /// Declare prop keys whose change requires re-initialization
    pub fn init_props_dep(&self, keys: impl Into<DepKeys>) {
        let keys = keys.into();
        self.with_store_mut(|store| store.init_props_dep(keys));
    }

    /// Like [`Node::init_props_dep`], from an untyped value
    ///
    /// Fails with [`PanelError::InvalidArgument`] unless `keys` is a string or
    /// a list of strings.
    pub fn init_props_dep_value(&self, keys: &Value) -> Result<()> {
        let keys = DepKeys::try_from(keys)?;
        self.init_props_dep(keys);
        Ok(())
    }

    pub fn init_dependencies(&self) -> Vec<String> {
        self.with_store(|store| store.init_dependencies().to_vec())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.get()
    }

    /// Mark the node initialized without running any hooks
    ///
    /// For component layers that perform their first render themselves.
    pub fn mark_initialized(&self) {
        self.inner.initialized.set(true);
        self.with_store_mut(|store| store.commit());
    }

    /// Run init and render for the first time, then accept updates
    pub async fn mount(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(PanelError::Destroyed(self.type_name().to_string()));
        }
        lifecycle::run_mount(self.clone()).await?;
        self.inner.initialized.set(true);
        Ok(())
    }

    /// Stop accepting updates
    ///
    /// Updates already queued become no-ops and later `set_props` calls fail
    /// with [`PanelError::Destroyed`]. Event listeners are left to the owner.
    pub fn destroy(&self) {
        if !self.inner.destroyed.replace(true) {
            tracing::debug!(node = %self.type_name(), "node destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    pub fn on(&self, name: &str, callback: Callback) -> bool {
        self.inner.events.on(name, callback)
    }

    pub fn on_with(&self, name: &str, callback: Callback, strict: bool) -> bool {
        self.inner.events.on_with(name, callback, strict)
    }

    pub fn once(&self, name: &str, callback: Callback) -> bool {
        self.inner.events.once(name, callback)
    }

    pub fn off(&self, name: &str, callback: &Callback) -> bool {
        self.inner.events.off(name, callback)
    }

    pub fn trigger(&self, name: &str, args: &[Value]) -> usize {
        self.inner.events.trigger(name, args)
    }

    pub fn count(&self, name: &str) -> usize {
        self.inner.events.count(name)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.inner.events.has_event(name)
    }

    pub fn any_event(&self) -> bool {
        self.inner.events.any_event()
    }

    pub fn clean_event(&self, name: &str) {
        self.inner.events.clean_event(name)
    }

    pub fn clean_up_events(&self) {
        self.inner.events.clean_up_events()
    }

    pub fn clean_up_events_except(&self, ignore: &[&str]) {
        self.inner.events.clean_up_events_except(ignore)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.type_name())
            .field("initialized", &self.is_initialized())
            .field("destroyed", &self.is_destroyed())
            .field("events", &self.inner.events)
            .finish()
    }
}
