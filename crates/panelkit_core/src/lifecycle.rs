//! Lifecycle dispatch
//!
//! Every update ends in one of two transitions, decided fresh each time:
//!
//! ```text
//!                  dependency key changed?
//!   update task ──────────┬──────────────────────────┐
//!                         │ yes                      │ no
//!                         ▼                          ▼
//!               REINIT_THEN_RENDER              RENDER_ONLY
//!               init().await                         │
//!               render().await                 render().await
//!                         └───────────┬──────────────┘
//!                                     ▼
//!                    commit prev_props, fire "render"
//! ```
//!
//! Hooks come from the component layer through the [`Lifecycle`] trait.

use futures::future::{FutureExt, LocalBoxFuture};

use crate::error::{PanelError, Result};
use crate::events::{INIT_EVENT, RENDER_EVENT};
use crate::node::Node;
use crate::value::{identical_opt, Props};

/// Future returned by lifecycle hooks
pub type HookFuture = LocalBoxFuture<'static, anyhow::Result<()>>;

/// Hooks supplied by a component
///
/// Both hooks default to doing nothing.
pub trait Lifecycle {
    /// Build (or rebuild) everything that depends on init dependency keys
    fn init(&self, _node: Node) -> HookFuture {
        futures::future::ready(Ok(())).boxed_local()
    }

    /// Bring the rendered output in line with the current props
    fn render(&self, _node: Node) -> HookFuture {
        futures::future::ready(Ok(())).boxed_local()
    }
}

/// Lifecycle with no hooks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLifecycle;

impl Lifecycle for NoopLifecycle {}

/// Which hooks an update runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    RenderOnly,
    ReinitThenRender,
}

/// Pick the transition for an update
///
/// Re-initialization is needed when any dependency key differs between the
/// current and the last committed props.
pub fn decide(props: &Props, prev_props: &Props, init_dependencies: &[String]) -> Transition {
    let reinit = init_dependencies
        .iter()
        .any(|key| !identical_opt(props.get(key), prev_props.get(key)));
    if reinit {
        Transition::ReinitThenRender
    } else {
        Transition::RenderOnly
    }
}

/// Run one update of `node`
///
/// This is the task pushed onto the scheduler. A destroyed node is skipped.
/// If a hook fails the update is not committed and no `render` event fires.
pub async fn run_update(node: Node) -> Result<()> {
    if node.is_destroyed() {
        tracing::debug!(node = %node.type_name(), "skipping update of destroyed node");
        return Ok(());
    }

    let transition = node.with_store(|store| {
        decide(store.props(), store.prev_props(), store.init_dependencies())
    });
    tracing::debug!(node = %node.type_name(), ?transition, "dispatching update");

    dispatch(&node, transition).await
}

/// Run init and render for a node being shown for the first time
pub(crate) async fn run_mount(node: Node) -> Result<()> {
    tracing::debug!(node = %node.type_name(), "mounting");
    dispatch(&node, Transition::ReinitThenRender).await
}

async fn dispatch(node: &Node, transition: Transition) -> Result<()> {
    let hooks = node.lifecycle();

    if transition == Transition::ReinitThenRender {
        hooks.init(node.clone()).await.map_err(PanelError::Hook)?;
        node.trigger(INIT_EVENT, &[]);
    }
    hooks.render(node.clone()).await.map_err(PanelError::Hook)?;

    node.with_store_mut(|store| store.commit());
    node.trigger(RENDER_EVENT, &[]);
    Ok(())
}
