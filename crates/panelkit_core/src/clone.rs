//! Defensive deep copies of prop values
//!
//! Used to hand out snapshots that callers may mutate freely. One rule per
//! [`Value`] variant:
//!
//! | Variant | Copy |
//! |---|---|
//! | scalars | copied |
//! | `Callback` | shared (callables are not cloned) |
//! | `List` | new list, elements deep-copied |
//! | `Opaque` | duplicated by the handle, fresh id if it had one |
//! | `Map` | new record, entries deep-copied |
//!
//! A `Value` tree owns its children, so `List`/`Map` cannot form cycles.
//! Opaque handles are duplicated by their own facility and never traversed,
//! so no visited set is needed.

use uuid::Uuid;

use crate::value::{OpaqueRef, Props, Value};

/// Structurally independent copy of `value`
pub fn deep_clone(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => Value::Float(*f),
        Value::Str(s) => Value::Str(s.clone()),
        Value::Callback(cb) => Value::Callback(cb.clone()),
        Value::List(items) => Value::List(items.iter().map(deep_clone).collect()),
        Value::Opaque(handle) => Value::Opaque(duplicate_handle(handle)),
        Value::Map(map) => Value::Map(deep_clone_props(map)),
    }
}

/// Deep copy of a whole record
pub fn deep_clone_props(props: &Props) -> Props {
    props
        .iter()
        .map(|(key, value)| (key.clone(), deep_clone(value)))
        .collect()
}

fn duplicate_handle(handle: &OpaqueRef) -> OpaqueRef {
    let mut copy = handle.handle().duplicate();
    if handle.id().is_some() {
        // Two live handles must never share an identifier
        let fresh = Uuid::new_v4().to_string();
        tracing::trace!(from = ?handle.id(), to = %fresh, "reassigning id on duplicated handle");
        copy.set_id(fresh);
    }
    OpaqueRef::from_box(copy)
}
