//! Tracker add-in: lifecycle and state coordination between an IDE host and
//! a task-tracking connection controller.

pub mod commands;
pub mod config;
pub mod connection;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod session;
pub mod toolwindow;

pub use host::HostAdapter;
pub use lifecycle::{ExtensionLifecycleManager, HostServices};
