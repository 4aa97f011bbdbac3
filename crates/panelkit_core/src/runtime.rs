//! Panel Runtime
//!
//! Owns the update scheduler shared by every node of a panel and hands it to
//! the nodes it creates.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::node::Node;
use crate::props::NodeType;
use crate::scheduler::{SchedulerConfig, SchedulerStats, UpdateScheduler};
use crate::value::Props;

/// The panel runtime - owns the shared scheduler and creates nodes
pub struct PanelRuntime {
    pub scheduler: UpdateScheduler,
    nodes_created: Cell<usize>,
}

impl PanelRuntime {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            scheduler: UpdateScheduler::with_config(config),
            nodes_created: Cell::new(0),
        }
    }

    /// Create a node wired to this runtime's scheduler
    pub fn create_node(
        &self,
        node_type: &Rc<NodeType>,
        initial: Props,
        lifecycle: Rc<dyn Lifecycle>,
    ) -> Result<Node> {
        let node = Node::new(node_type.clone(), initial, self.scheduler.clone(), lifecycle)?;
        self.nodes_created.set(self.nodes_created.get() + 1);
        Ok(node)
    }

    /// Run every queued update
    pub fn run_until_idle(&self) -> usize {
        self.scheduler.run_until_idle()
    }

    /// Get statistics about the runtime
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            scheduler: self.scheduler.stats(),
            nodes_created: self.nodes_created.get(),
        }
    }
}

impl Default for PanelRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the runtime
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    pub scheduler: SchedulerStats,
    pub nodes_created: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::NoopLifecycle;
    use crate::value::{props_from_json, Value};
    use serde_json::json;

    #[test]
    fn test_runtime_integration() {
        let runtime = PanelRuntime::new();
        let label = NodeType::builder("label")
            .defaults(props_from_json(json!({ "text": "" })).unwrap())
            .build();

        let a = runtime
            .create_node(&label, Props::new(), Rc::new(NoopLifecycle))
            .unwrap();
        let b = runtime
            .create_node(&label, Props::new(), Rc::new(NoopLifecycle))
            .unwrap();
        a.mark_initialized();
        b.mark_initialized();

        // Make changes
        let mut update = Props::new();
        update.insert("text".into(), Value::from("ready"));
        assert!(a.set_props(update.clone()).unwrap());
        assert!(b.set_props(update).unwrap());

        // Both nodes share one queue
        assert_eq!(runtime.scheduler.pending(), 2);
        assert_eq!(runtime.run_until_idle(), 2);

        // Check stats
        let stats = runtime.stats();
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.scheduler.completed, 2);
        assert_eq!(stats.scheduler.pending, 0);
    }
}
