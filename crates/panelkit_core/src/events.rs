//! Per-node event bus
//!
//! Named events with ordered listener lists. Each node owns one bus; nothing
//! is shared between nodes.
//!
//! # Dispatch
//!
//! [`EventBus::trigger`] takes a snapshot of the listener list before calling
//! anything, so listeners may register, remove, or re-trigger freely:
//!
//! - listeners added during a dispatch run from the next trigger on
//! - listeners removed during a dispatch still run in the current one, unless
//!   they are `once` listeners that already fired
//! - a nested trigger of the same event runs to completion on the list as it
//!   is at that moment, then the outer dispatch resumes
//!
//! Panics raised by listeners are not caught.
//!
//! # Example
//!
//! ```
//! use panelkit_core::events::EventBus;
//! use panelkit_core::value::{Callback, Value};
//!
//! let bus = EventBus::new();
//! let cb = Callback::new(|args| assert_eq!(args, &[Value::Int(1)]));
//! bus.on("press", cb.clone());
//! assert_eq!(bus.trigger("press", &[Value::Int(1)]), 1);
//! assert!(bus.off("press", &cb));
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::value::{Callback, Value};

/// Fired after a node's init hook completes
pub const INIT_EVENT: &str = "init";
/// Fired after a node's render hook completes
pub const RENDER_EVENT: &str = "render";
/// Events kept by [`EventBus::clean_up_events`]
pub const LIFECYCLE_EVENTS: [&str; 2] = [INIT_EVENT, RENDER_EVENT];

#[derive(Clone)]
struct Listener {
    callback: Callback,
    once: bool,
    /// Shared with snapshots so a `once` listener fires at most one time
    fired: Rc<Cell<bool>>,
}

impl Listener {
    fn new(callback: Callback, once: bool) -> Self {
        Self {
            callback,
            once,
            fired: Rc::new(Cell::new(false)),
        }
    }
}

type ListenerList = SmallVec<[Listener; 2]>;

/// Named-event publish/subscribe
#[derive(Default)]
pub struct EventBus {
    events: RefCell<FxHashMap<String, ListenerList>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `name`
    ///
    /// Returns false if the same callback is already registered.
    pub fn on(&self, name: &str, callback: Callback) -> bool {
        self.on_with(name, callback, true)
    }

    /// Register `callback` for `name`, optionally with loose deduplication
    ///
    /// With `strict = false` registration is also skipped when a listener with
    /// the same callback name exists, which deduplicates handlers created at
    /// the same site.
    pub fn on_with(&self, name: &str, callback: Callback, strict: bool) -> bool {
        self.register(name, Listener::new(callback, false), strict)
    }

    /// Register `callback` to run on the next trigger of `name` only
    ///
    /// Returns false without registering if the same callback is present.
    pub fn once(&self, name: &str, callback: Callback) -> bool {
        self.register(name, Listener::new(callback, true), true)
    }

    fn register(&self, name: &str, listener: Listener, strict: bool) -> bool {
        let mut events = self.events.borrow_mut();
        let listeners = events.entry(name.to_string()).or_default();

        let duplicate = listeners.iter().any(|existing| {
            existing.callback.ptr_eq(&listener.callback)
                || (!strict && existing.callback.name() == listener.callback.name())
        });
        if duplicate {
            tracing::trace!(event = name, callback = listener.callback.name(), "listener already registered");
            return false;
        }

        listeners.push(listener);
        true
    }

    /// Remove `callback` from `name`
    pub fn off(&self, name: &str, callback: &Callback) -> bool {
        let mut events = self.events.borrow_mut();
        let Some(listeners) = events.get_mut(name) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|l| !l.callback.ptr_eq(callback));
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            events.remove(name);
        }
        removed
    }

    /// Call every listener of `name` in registration order
    ///
    /// Returns how many listeners ran.
    pub fn trigger(&self, name: &str, args: &[Value]) -> usize {
        let snapshot: ListenerList = match self.events.borrow().get(name) {
            Some(listeners) => listeners.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for listener in snapshot {
            if listener.once {
                if listener.fired.replace(true) {
                    continue;
                }
                self.remove_fired(name, &listener);
            }
            listener.callback.call(args);
            invoked += 1;
        }
        invoked
    }

    fn remove_fired(&self, name: &str, fired: &Listener) {
        let mut events = self.events.borrow_mut();
        if let Some(listeners) = events.get_mut(name) {
            listeners.retain(|l| !Rc::ptr_eq(&l.fired, &fired.fired));
            if listeners.is_empty() {
                events.remove(name);
            }
        }
    }

    /// Number of listeners registered for `name`
    pub fn count(&self, name: &str) -> usize {
        self.events.borrow().get(name).map_or(0, |l| l.len())
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    /// Whether any event has listeners
    pub fn any_event(&self) -> bool {
        self.events.borrow().values().any(|l| !l.is_empty())
    }

    /// Remove every listener of `name`
    pub fn clean_event(&self, name: &str) {
        self.events.borrow_mut().remove(name);
    }

    /// Remove all listeners except those of the lifecycle events
    pub fn clean_up_events(&self) {
        self.clean_up_events_except(&LIFECYCLE_EVENTS);
    }

    /// Remove all listeners except those of the events named in `ignore`
    pub fn clean_up_events_except(&self, ignore: &[&str]) {
        self.events
            .borrow_mut()
            .retain(|name, _| ignore.contains(&name.as_str()));
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self.events.borrow();
        let mut map = f.debug_map();
        for (name, listeners) in events.iter() {
            map.entry(name, &listeners.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<Vec<Value>>>>, Callback) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls_clone = calls.clone();
        let cb = Callback::new(move |args: &[Value]| calls_clone.borrow_mut().push(args.to_vec()));
        (calls, cb)
    }

    #[test]
    fn test_on_trigger_off() {
        let bus = EventBus::new();
        let (calls, cb) = recorder();

        assert!(bus.on("x", cb.clone()));
        assert_eq!(bus.trigger("x", &[Value::Int(1), Value::Int(2)]), 1);
        assert_eq!(*calls.borrow(), vec![vec![Value::Int(1), Value::Int(2)]]);

        assert!(bus.off("x", &cb));
        assert!(!bus.off("x", &cb));
        bus.trigger("x", &[]);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let bus = EventBus::new();
        let (calls, cb) = recorder();

        assert!(bus.on("x", cb.clone()));
        assert!(!bus.on("x", cb.clone()));
        assert_eq!(bus.count("x"), 1);

        bus.trigger("x", &[]);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_loose_registration_matches_by_name() {
        let bus = EventBus::new();
        let first = Callback::named("refresh", |_| {});
        let second = Callback::named("refresh", |_| {});

        assert!(bus.on("x", first));
        // Strict registration only compares references
        assert!(bus.on("x", second.clone()));
        assert_eq!(bus.count("x"), 2);

        let third = Callback::named("refresh", |_| {});
        assert!(!bus.on_with("x", third, false));
        assert_eq!(bus.count("x"), 2);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let bus = EventBus::new();
        let (calls, cb) = recorder();

        assert!(bus.once("x", cb.clone()));
        assert!(!bus.once("x", cb));

        bus.trigger("x", &[Value::Int(7)]);
        bus.trigger("x", &[Value::Int(8)]);
        assert_eq!(*calls.borrow(), vec![vec![Value::Int(7)]]);
        assert!(!bus.has_event("x"));
    }

    #[test]
    fn test_registration_order_is_kept() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            bus.on("x", Callback::new(move |_| order.borrow_mut().push(i)));
        }

        bus.trigger("x", &[]);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next_trigger() {
        let bus = Rc::new(EventBus::new());
        let (calls, late) = recorder();

        let bus_clone = bus.clone();
        bus.on(
            "x",
            Callback::new(move |_| {
                bus_clone.on("x", late.clone());
            }),
        );

        assert_eq!(bus.trigger("x", &[]), 1);
        assert!(calls.borrow().is_empty());

        assert_eq!(bus.trigger("x", &[]), 2);
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_recursive_trigger_does_not_refire_once() {
        let bus = Rc::new(EventBus::new());
        let depth = Rc::new(Cell::new(0));
        let (calls, cb) = recorder();

        bus.once("x", cb);
        let bus_clone = bus.clone();
        let depth_clone = depth.clone();
        bus.on(
            "x",
            Callback::new(move |_| {
                if depth_clone.get() == 0 {
                    depth_clone.set(1);
                    bus_clone.trigger("x", &[]);
                }
            }),
        );

        bus.trigger("x", &[]);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(depth.get(), 1);
    }

    #[test]
    fn test_clean_up_keeps_lifecycle_events() {
        let bus = EventBus::new();
        bus.on(RENDER_EVENT, Callback::new(|_| {}));
        bus.on(INIT_EVENT, Callback::new(|_| {}));
        bus.on("press", Callback::new(|_| {}));
        bus.on("release", Callback::new(|_| {}));

        bus.clean_up_events();
        assert!(bus.has_event(RENDER_EVENT));
        assert!(bus.has_event(INIT_EVENT));
        assert!(!bus.has_event("press"));
        assert!(!bus.has_event("release"));

        bus.clean_event(RENDER_EVENT);
        assert!(!bus.has_event(RENDER_EVENT));

        bus.clean_up_events_except(&[]);
        assert!(!bus.any_event());
    }
}
