//! Props store and reconciliation
//!
//! A node's configuration is a [`Props`] record whose key set is fixed by its
//! [`NodeType`]. Updates arrive as partial records and are merged by
//! [`reconcile`], which also reports whether anything actually changed.
//!
//! # Node types
//!
//! Default props are composed ahead of time with a builder. Each type lists
//! its bases explicitly; their defaults are merged left to right and the
//! type's own defaults are merged last, so the most derived value wins.
//!
//! ```
//! use panelkit_core::props::NodeType;
//! use panelkit_core::value::{props_from_json, Value};
//! use serde_json::json;
//!
//! let base = NodeType::builder("component")
//!     .defaults(props_from_json(json!({ "enabled": true, "label": "" })).unwrap())
//!     .build();
//! let button = NodeType::builder("button")
//!     .extends(&base)
//!     .defaults(props_from_json(json!({ "label": "OK", "on_click": null })).unwrap())
//!     .build();
//!
//! let defaults = button.default_props();
//! assert_eq!(defaults["enabled"], Value::Bool(true));
//! assert_eq!(defaults["label"], Value::from("OK"));
//! ```

use std::rc::Rc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::clone::deep_clone_props;
use crate::error::{PanelError, Result};
use crate::value::{identical_opt, Props, Value};

// =============================================================================
// NODE TYPES
// =============================================================================

/// A node type: its resolved default props and its no-check keys
#[derive(Debug)]
pub struct NodeType {
    name: String,
    defaults: Props,
    no_check: FxHashSet<String>,
}

impl NodeType {
    pub fn builder(name: impl Into<String>) -> NodeTypeBuilder {
        NodeTypeBuilder {
            name: name.into(),
            bases: Vec::new(),
            defaults: Props::new(),
            no_check: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full default record, including every base type's defaults
    pub fn default_props(&self) -> &Props {
        &self.defaults
    }

    /// Keys whose values are always compared as a whole, never diffed
    pub fn no_check(&self) -> &FxHashSet<String> {
        &self.no_check
    }

    pub fn is_no_check(&self, key: &str) -> bool {
        self.no_check.contains(key)
    }
}

/// Builder for [`NodeType`]
pub struct NodeTypeBuilder {
    name: String,
    bases: Vec<Rc<NodeType>>,
    defaults: Props,
    no_check: Vec<String>,
}

impl NodeTypeBuilder {
    /// Inherit from `base`; later bases override earlier ones
    pub fn extends(mut self, base: &Rc<NodeType>) -> Self {
        self.bases.push(base.clone());
        self
    }

    /// Merge `defaults` into this type's own defaults
    pub fn defaults(mut self, defaults: Props) -> Self {
        self.defaults = merge_defaults(&self.defaults, &defaults);
        self
    }

    /// Set a single default
    pub fn default_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Mark keys whose values must never be diffed structurally
    pub fn no_check<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.no_check.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Rc<NodeType> {
        let mut defaults = Props::new();
        let mut no_check = FxHashSet::default();

        for base in &self.bases {
            defaults = merge_defaults(&defaults, &base.defaults);
            no_check.extend(base.no_check.iter().cloned());
        }
        defaults = merge_defaults(&defaults, &self.defaults);
        no_check.extend(self.no_check);

        tracing::debug!(
            node_type = %self.name,
            bases = self.bases.len(),
            keys = defaults.len(),
            "node type resolved"
        );

        Rc::new(NodeType {
            name: self.name,
            defaults,
            no_check,
        })
    }
}

/// Merge `overlay` on top of `base`
///
/// Nested records merge key by key; any other overlay value replaces the base
/// value. Keys keep the position they first appeared at.
fn merge_defaults(base: &Props, overlay: &Props) -> Props {
    let mut merged = base.clone();
    for (key, value) in overlay {
        let combined = match (merged.get(key), value) {
            (Some(Value::Map(under)), Value::Map(over)) => Value::Map(merge_defaults(under, over)),
            _ => value.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

// =============================================================================
// RECONCILIATION
// =============================================================================

/// What to do with keys the previous record does not have
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Fail with [`PanelError::UnexpectedProps`] and merge nothing
    #[default]
    Reject,
    /// Append them to the record
    Merge,
    /// Drop them with a warning
    Ignore,
}

/// Output of [`reconcile`]
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub props: Props,
    pub modified: bool,
}

/// Merge the partial record `new` into `prev`
///
/// For every key of `prev`:
/// - not supplied: the previous value is carried over
/// - both sides are records and the key is not in `no_check`: recurse, with
///   unknown nested keys merged
/// - otherwise the new value replaces the old, and counts as a modification
///   unless it is identical
///
/// Keys only `new` has are handled by `unknown`.
pub fn reconcile(
    new: &Props,
    prev: &Props,
    unknown: UnknownKeys,
    no_check: &FxHashSet<String>,
) -> Result<Reconciled> {
    let rest: Vec<&String> = new.keys().filter(|key| !prev.contains_key(*key)).collect();
    if unknown == UnknownKeys::Reject && !rest.is_empty() {
        return Err(PanelError::UnexpectedProps {
            keys: rest.into_iter().cloned().collect(),
        });
    }

    let mut props = Props::with_capacity(prev.len());
    let mut modified = false;

    for (key, prev_value) in prev {
        let Some(new_value) = new.get(key) else {
            props.insert(key.clone(), prev_value.clone());
            continue;
        };

        match (prev_value, new_value) {
            (Value::Map(prev_map), Value::Map(new_map)) if !no_check.contains(key) => {
                let nested = reconcile(new_map, prev_map, UnknownKeys::Merge, no_check)?;
                modified |= nested.modified;
                props.insert(key.clone(), Value::Map(nested.props));
            }
            _ => {
                if !new_value.identical(prev_value) {
                    tracing::trace!(key = %key, "prop modified");
                    modified = true;
                }
                props.insert(key.clone(), new_value.clone());
            }
        }
    }

    match unknown {
        UnknownKeys::Merge => {
            for key in rest {
                props.insert(key.clone(), new[key].clone());
                modified = true;
            }
        }
        UnknownKeys::Ignore if !rest.is_empty() => {
            tracing::warn!(keys = ?rest, "ignoring unexpected props");
        }
        _ => {}
    }

    Ok(Reconciled { props, modified })
}

// =============================================================================
// DEPENDENCY KEYS
// =============================================================================

/// Prop names passed to [`PropsStore::init_props_dep`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepKeys(SmallVec<[String; 4]>);

impl DepKeys {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for DepKeys {
    fn from(key: &str) -> Self {
        DepKeys(smallvec::smallvec![key.to_string()])
    }
}

impl From<String> for DepKeys {
    fn from(key: String) -> Self {
        DepKeys(smallvec::smallvec![key])
    }
}

impl From<&[&str]> for DepKeys {
    fn from(keys: &[&str]) -> Self {
        DepKeys(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for DepKeys {
    fn from(keys: [&str; N]) -> Self {
        DepKeys(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl From<Vec<String>> for DepKeys {
    fn from(keys: Vec<String>) -> Self {
        DepKeys(keys.into_iter().collect())
    }
}

impl TryFrom<&Value> for DepKeys {
    type Error = PanelError;

    /// Accepts a string or a list of strings
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Str(key) => Ok(DepKeys::from(key.clone())),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        PanelError::InvalidArgument(format!(
                            "dependency keys must be strings, got {}",
                            item.kind()
                        ))
                    })
                })
                .collect::<Result<SmallVec<_>>>()
                .map(DepKeys),
            other => Err(PanelError::InvalidArgument(format!(
                "expected a string or a list of strings, got {}",
                other.kind()
            ))),
        }
    }
}

// =============================================================================
// PROPS STORE
// =============================================================================

/// Current and last-committed props of one node
#[derive(Debug)]
pub struct PropsStore {
    node_type: Rc<NodeType>,
    props: Props,
    prev_props: Props,
    init_dependencies: SmallVec<[String; 4]>,
}

impl PropsStore {
    /// Validate `initial` against the type's defaults
    ///
    /// Fails with [`PanelError::UnexpectedProps`] if `initial` has keys the
    /// type does not declare.
    pub fn new(node_type: Rc<NodeType>, initial: &Props) -> Result<Self> {
        let Reconciled { props, .. } = reconcile(
            initial,
            node_type.default_props(),
            UnknownKeys::Reject,
            node_type.no_check(),
        )?;

        Ok(Self {
            node_type,
            prev_props: props.clone(),
            props,
            init_dependencies: SmallVec::new(),
        })
    }

    pub fn node_type(&self) -> &Rc<NodeType> {
        &self.node_type
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Props as of the last completed update
    pub fn prev_props(&self) -> &Props {
        &self.prev_props
    }

    /// Deep copy of the current props
    pub fn get_props(&self) -> Props {
        deep_clone_props(&self.props)
    }

    /// Reconcile `partial` into the current props; returns whether anything changed
    pub fn apply(&mut self, partial: &Props, unknown: UnknownKeys) -> Result<bool> {
        let Reconciled { props, modified } =
            reconcile(partial, &self.props, unknown, self.node_type.no_check())?;
        if modified {
            self.props = props;
        }
        Ok(modified)
    }

    /// Make the current props the baseline for the next update
    pub fn commit(&mut self) {
        self.prev_props = self.props.clone();
    }

    /// Declare keys whose change requires re-initialization
    pub fn init_props_dep(&mut self, keys: impl Into<DepKeys>) {
        for key in keys.into().iter() {
            if !self.init_dependencies.iter().any(|k| k == key) {
                self.init_dependencies.push(key.to_string());
            }
        }
    }

    pub fn init_dependencies(&self) -> &[String] {
        &self.init_dependencies
    }

    /// Top-level keys that differ from the last committed props
    pub fn changed_keys(&self) -> Vec<&str> {
        self.props
            .iter()
            .filter(|(key, value)| !identical_opt(self.prev_props.get(*key), Some(*value)))
            .map(|(key, _)| key.as_str())
            .collect()
    }
}
