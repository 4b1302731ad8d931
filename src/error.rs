//! Error types for the tracker add-in.

use crate::session::SessionPhase;

/// Top-level error type for the add-in core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Panic in {context}: {message}")]
    Panic { context: String, message: String },
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by one of the host surfaces (output pane, command bar, tool window).
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Host object unavailable: {0}")]
    Unavailable(String),

    #[error("Command {name} already exists")]
    CommandExists { name: String },

    #[error("Command {name} not found")]
    CommandNotFound { name: String },

    #[error("Menu {menu} not found")]
    MenuNotFound { menu: String },

    #[error("Host surface {surface} has been disposed")]
    Disposed { surface: String },

    #[error("Host call {call} failed: {reason}")]
    CallFailed { call: String, reason: String },
}

/// Errors from the external connection controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Controller construction failed: {0}")]
    Construction(String),

    #[error("Controller request {request} rejected: {reason}")]
    RequestRejected { request: String, reason: String },

    #[error("Controller has been disposed")]
    Disposed,
}

/// Command registration and dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Command {name} is already registered")]
    Duplicate { name: String },

    #[error("Command {name} failed")]
    ActionFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

/// Session lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Cannot transition session from {from} to {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error("Component {component} failed to initialize")]
    Initialization {
        component: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias for the add-in core.
pub type Result<T> = std::result::Result<T, Error>;
