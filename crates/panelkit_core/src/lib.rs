//! panelkit Core
//!
//! The reactive state core every panelkit widget is built on:
//!
//! - **Values**: Tagged prop values with ordered nested records
//! - **Props Store**: Default composition and recursive reconciliation of partial updates
//! - **Lifecycle Dispatch**: Decides per update between re-initialization and render-only
//! - **Update Scheduler**: One FIFO queue that serializes all update work of a panel
//! - **Event Bus**: Per-node named events with one-shot listeners
//! - **Deep Clone**: Defensive snapshots of props
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use panelkit_core::{props_from_json, NodeType, NoopLifecycle, PanelRuntime, Value};
//! use serde_json::json;
//!
//! let runtime = PanelRuntime::new();
//!
//! // Declare a node type with its defaults
//! let slider = NodeType::builder("slider")
//!     .defaults(props_from_json(json!({ "value": 0, "range": { "min": 0, "max": 100 } })).unwrap())
//!     .build();
//!
//! // Create and initialize a node
//! let node = runtime
//!     .create_node(&slider, props_from_json(json!({ "value": 10 })).unwrap(), Rc::new(NoopLifecycle))
//!     .unwrap();
//! node.mark_initialized();
//!
//! // Partial nested update
//! let scheduled = node
//!     .set_props(props_from_json(json!({ "range": { "max": 50 } })).unwrap())
//!     .unwrap();
//! assert!(scheduled);
//! runtime.run_until_idle();
//!
//! let props = node.get_props();
//! assert_eq!(props["value"], Value::Int(10));
//! assert_eq!(props["range"].as_map().unwrap()["max"], Value::Int(50));
//! ```

pub mod clone;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod node;
pub mod props;
pub mod runtime;
pub mod scheduler;
pub mod value;

pub use clone::{deep_clone, deep_clone_props};
pub use error::{PanelError, Result};
pub use events::{EventBus, INIT_EVENT, LIFECYCLE_EVENTS, RENDER_EVENT};
pub use lifecycle::{decide, HookFuture, Lifecycle, NoopLifecycle, Transition};
pub use node::{Node, SetProps};
pub use props::{reconcile, DepKeys, NodeType, NodeTypeBuilder, PropsStore, Reconciled, UnknownKeys};
pub use runtime::{PanelRuntime, RuntimeStats};
pub use scheduler::{SchedulerConfig, SchedulerStats, UpdateScheduler, UpdateTask};
pub use value::{
    props_from_json, props_identical, props_to_json, Callback, OpaqueHandle, OpaqueRef, Props,
    Value,
};
