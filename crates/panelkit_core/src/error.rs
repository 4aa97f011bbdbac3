//! Error types for the props core

use thiserror::Error;

/// Errors raised by the props core
#[derive(Error, Debug)]
pub enum PanelError {
    /// A value of the wrong shape was passed where a record or key list was expected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A non-callable value was used as an event callback
    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    /// Reconciliation found keys that the node type does not declare
    #[error("Unexpected props: {}", keys.join(", "))]
    UnexpectedProps { keys: Vec<String> },

    /// An init or render hook failed
    #[error("Lifecycle hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    /// The node was destroyed and no longer accepts updates
    #[error("Node destroyed: {0}")]
    Destroyed(String),
}

/// Result type for props core operations
pub type Result<T> = std::result::Result<T, PanelError>;
