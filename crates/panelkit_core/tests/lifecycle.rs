//! End-to-end behaviour of nodes sharing one update scheduler

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::FutureExt;
use panelkit_core::{
    props_from_json, Callback, HookFuture, Lifecycle, Node, NodeType, PanelError, PanelRuntime,
    Props, SetProps, Value, RENDER_EVENT,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn props(json: serde_json::Value) -> Props {
    props_from_json(json).unwrap()
}

/// Yields to the executor once, standing in for hook I/O
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

type Log = Rc<RefCell<Vec<String>>>;

/// A gauge whose hooks suspend and log what they see
struct Gauge {
    name: &'static str,
    log: Log,
    fail_render: bool,
}

impl Lifecycle for Gauge {
    fn init(&self, node: Node) -> HookFuture {
        let log = self.log.clone();
        let name = self.name;
        async move {
            log.borrow_mut().push(format!("{name}:init:start"));
            YieldNow(false).await;
            let mode = node.prop("mode").and_then(|v| v.as_str().map(str::to_string));
            log.borrow_mut()
                .push(format!("{name}:init:end:{}", mode.unwrap_or_default()));
            Ok(())
        }
        .boxed_local()
    }

    fn render(&self, node: Node) -> HookFuture {
        let log = self.log.clone();
        let name = self.name;
        let fail = self.fail_render;
        async move {
            log.borrow_mut().push(format!("{name}:render:start"));
            YieldNow(false).await;
            if fail {
                anyhow::bail!("{name} lost its canvas");
            }
            let value = node.prop("value").and_then(|v| v.as_i64()).unwrap_or_default();
            log.borrow_mut().push(format!("{name}:render:end:{value}"));
            Ok(())
        }
        .boxed_local()
    }
}

fn gauge_type() -> Rc<NodeType> {
    let base = NodeType::builder("component")
        .defaults(props(json!({ "enabled": true, "style": { "color": "gray" } })))
        .build();
    NodeType::builder("gauge")
        .extends(&base)
        .defaults(props(json!({ "value": 0, "mode": "linear" })))
        .build()
}

fn mount(runtime: &PanelRuntime, name: &'static str, log: &Log) -> Node {
    let node = runtime
        .create_node(
            &gauge_type(),
            Props::new(),
            Rc::new(Gauge {
                name,
                log: log.clone(),
                fail_render: false,
            }),
        )
        .unwrap();
    futures::executor::block_on(node.mount()).unwrap();
    log.borrow_mut().clear();
    node
}

#[test]
fn updates_of_different_nodes_never_interleave() {
    init_tracing();
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let a = mount(&runtime, "a", &log);
    let b = mount(&runtime, "b", &log);

    a.set_props(props(json!({ "value": 1 }))).unwrap();
    b.set_props(props(json!({ "value": 2 }))).unwrap();
    a.set_props(props(json!({ "value": 3 }))).unwrap();

    assert_eq!(runtime.run_until_idle(), 3);
    assert_eq!(
        *log.borrow(),
        vec![
            "a:render:start",
            "a:render:end:3",
            "b:render:start",
            "b:render:end:2",
            "a:render:start",
            "a:render:end:3",
        ]
    );
}

#[test]
fn dependency_change_runs_init_before_render() {
    init_tracing();
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let node = mount(&runtime, "g", &log);
    node.init_props_dep("mode");

    node.set_props(props(json!({ "mode": "radial" }))).unwrap();
    runtime.run_until_idle();
    assert_eq!(
        *log.borrow(),
        vec![
            "g:init:start",
            "g:init:end:radial",
            "g:render:start",
            "g:render:end:0",
        ]
    );

    log.borrow_mut().clear();
    node.set_props(props(json!({ "value": 7 }))).unwrap();
    runtime.run_until_idle();
    assert_eq!(*log.borrow(), vec!["g:render:start", "g:render:end:7"]);
}

#[test]
fn snapshot_round_trip_schedules_nothing() {
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let node = mount(&runtime, "g", &log);
    node.set_props(props(json!({ "value": 4, "style": { "color": "red" } })))
        .unwrap();
    runtime.run_until_idle();

    assert!(!node.set_props(node.get_props()).unwrap());
    assert_eq!(runtime.scheduler.pending(), 0);
}

#[test]
fn mutating_a_snapshot_leaves_the_node_alone() {
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let node = mount(&runtime, "g", &log);

    let mut snapshot = node.get_props();
    snapshot.insert("value".into(), Value::Int(100));
    if let Some(Value::Map(style)) = snapshot.get_mut("style") {
        style.insert("color".into(), Value::from("blue"));
    }

    let fresh = node.get_props();
    assert_eq!(fresh["value"], Value::Int(0));
    assert_eq!(fresh["style"].as_map().unwrap()["color"], Value::from("gray"));
}

#[test]
fn hook_failures_reach_the_failure_handler() {
    init_tracing();
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let failures = Rc::new(RefCell::new(Vec::new()));
    let failures_clone = failures.clone();
    runtime
        .scheduler
        .on_failure(move |err| failures_clone.borrow_mut().push(err.to_string()));

    let broken = runtime
        .create_node(
            &gauge_type(),
            Props::new(),
            Rc::new(Gauge {
                name: "broken",
                log: log.clone(),
                fail_render: true,
            }),
        )
        .unwrap();
    broken.mark_initialized();
    let healthy = mount(&runtime, "ok", &log);

    let rendered = Rc::new(RefCell::new(0));
    let rendered_clone = rendered.clone();
    broken.on(
        RENDER_EVENT,
        Callback::new(move |_| *rendered_clone.borrow_mut() += 1),
    );

    broken.set_props(props(json!({ "value": 1 }))).unwrap();
    healthy.set_props(props(json!({ "value": 2 }))).unwrap();
    assert_eq!(runtime.run_until_idle(), 2);

    assert_eq!(failures.borrow().len(), 1);
    assert!(failures.borrow()[0].contains("broken lost its canvas"));
    // A failed update is not committed and fires no render event
    assert_eq!(*rendered.borrow(), 0);
    assert_eq!(broken.changed_keys(), vec!["value".to_string()]);
    assert!(log.borrow().contains(&"ok:render:end:2".to_string()));

    let stats = runtime.stats();
    assert_eq!(stats.scheduler.failed, 1);
    assert_eq!(stats.scheduler.completed, 1);
}

#[test]
fn sync_update_returns_hook_failure_to_caller() {
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let node = runtime
        .create_node(
            &gauge_type(),
            Props::new(),
            Rc::new(Gauge {
                name: "g",
                log,
                fail_render: true,
            }),
        )
        .unwrap();
    node.mark_initialized();

    let result = futures::executor::block_on(
        node.set_props_with(props(json!({ "value": 9 })), SetProps::new().sync(true)),
    );
    assert!(matches!(result, Err(PanelError::Hook(_))));
}

#[test]
fn render_once_listener_sees_committed_props() {
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let node = mount(&runtime, "g", &log);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let seen_clone = seen.clone();
    let observer = node.clone();
    let options = SetProps::new().on_render_once(Callback::new(move |_| {
        seen_clone
            .borrow_mut()
            .push(observer.prop("value").and_then(|v| v.as_i64()));
        assert!(observer.changed_keys().is_empty());
    }));

    futures::executor::block_on(node.set_props_with(props(json!({ "value": 5 })), options))
        .unwrap();
    runtime.run_until_idle();
    node.set_props(props(json!({ "value": 6 }))).unwrap();
    runtime.run_until_idle();

    assert_eq!(*seen.borrow(), vec![Some(5)]);
}

#[test]
fn hooks_may_update_other_nodes() {
    let runtime = PanelRuntime::new();
    let log: Log = Rc::default();
    let follower = mount(&runtime, "follower", &log);
    let leader = mount(&runtime, "leader", &log);

    // Each render of the leader forwards its value to the follower
    let follower_clone = follower.clone();
    leader.on(
        RENDER_EVENT,
        Callback::new(move |_| {
            let mut update = Props::new();
            update.insert("value".into(), Value::Int(42));
            follower_clone.set_props(update).unwrap();
        }),
    );

    leader.set_props(props(json!({ "value": 1 }))).unwrap();
    assert_eq!(runtime.run_until_idle(), 2);
    assert_eq!(
        *log.borrow(),
        vec![
            "leader:render:start",
            "leader:render:end:1",
            "follower:render:start",
            "follower:render:end:42",
        ]
    );
}
