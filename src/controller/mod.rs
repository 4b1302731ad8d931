//! Connection controller boundary.
//!
//! The controller owns the actual connect/disconnect logic and the remote
//! state. The add-in only sees this trait: requests are fire-and-forget and
//! results come back through the state-changed notification.

pub mod manual;
pub mod simulated;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::AddinConfig;
use crate::error::ControllerError;

pub use manual::{ManualController, ManualControllerFactory};
pub use simulated::{SimulatedController, SimulatedControllerFactory};

/// Whether a connect request may prompt the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectMode {
    /// Login command: the controller may show its login dialog.
    Interactive,
    /// Auto-login at startup: use stored credentials only.
    NonInteractive,
}

impl ConnectMode {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// A request a controller received, kept for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerRequest {
    Connect(ConnectMode),
    Disconnect,
    Options,
}

/// Payload of the controller's state-changed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub endpoint: Option<String>,
    pub connected: bool,
}

impl ConnectionEvent {
    pub fn connected(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            connected: true,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            endpoint: None,
            connected: false,
        }
    }
}

/// Callback registered for state changes. May be invoked from any thread.
pub type StateListener = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Identifies one subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// The external connection controller.
pub trait Controller: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Request a connection. Returns once the request is handed off.
    fn connect(&self, mode: ConnectMode) -> Result<(), ControllerError>;

    fn disconnect(&self) -> Result<(), ControllerError>;

    /// Open the controller's options surface.
    fn show_options(&self) -> Result<(), ControllerError>;

    /// Release network resources. Further requests fail with `Disposed`.
    fn dispose(&self) -> Result<(), ControllerError>;

    fn subscribe(&self, listener: StateListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Builds the controller during session initialization.
pub trait ControllerFactory: Send + Sync {
    fn create(&self, config: &AddinConfig) -> Result<Arc<dyn Controller>, ControllerError>;
}

/// Listener bookkeeping for controller implementations.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Mutex<Vec<(SubscriptionId, StateListener)>>,
    next_id: AtomicU64,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: StateListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    pub fn remove(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(existing, _)| *existing != id);
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener outside the lock so listeners may unsubscribe.
    pub fn notify(&self, event: &ConnectionEvent) {
        let listeners: Vec<StateListener> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}
