//! Connection state bridge.
//!
//! Keeps a cached snapshot of the controller's connection state for
//! synchronous enablement queries and keeps the tool window caption in step
//! with it. Notifications arrive on controller-owned threads; the snapshot is
//! swapped whole under a lock so readers never see a partial update.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::controller::{ConnectionEvent, Controller, SubscriptionId};
use crate::diagnostics::{self, DiagnosticSink};
use crate::error::Result;
use crate::toolwindow::ToolWindowHandle;

/// Connection status as last reported by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected { endpoint: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Connected { endpoint } => Some(endpoint),
            Self::Disconnected => None,
        }
    }

    /// Tool window caption for this state, e.g. `"Tracker Window - Disconnected"`.
    pub fn caption(&self, window_title: &str) -> String {
        match self {
            Self::Connected { endpoint } => format!("{window_title} - Connected to {endpoint}"),
            Self::Disconnected => format!("{window_title} - Disconnected"),
        }
    }
}

impl From<&ConnectionEvent> for ConnectionState {
    fn from(event: &ConnectionEvent) -> Self {
        if event.connected {
            Self::Connected {
                endpoint: event.endpoint.clone().unwrap_or_default(),
            }
        } else {
            Self::Disconnected
        }
    }
}

struct BridgeInner {
    state: RwLock<Arc<ConnectionState>>,
    window: Arc<ToolWindowHandle>,
    sink: Arc<DiagnosticSink>,
    window_title: String,
    detached: AtomicBool,
    applied: AtomicU64,
}

impl BridgeInner {
    fn on_event(&self, event: &ConnectionEvent) {
        if self.detached.load(Ordering::SeqCst) {
            tracing::debug!("Ignoring connection event after detach");
            return;
        }
        diagnostics::guard(Some(&self.sink), "Connection state update", || {
            self.apply(event)
        });
    }

    fn apply(&self, event: &ConnectionEvent) -> Result<()> {
        let state = Arc::new(ConnectionState::from(event));
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&state);
        self.applied.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            connected = state.is_connected(),
            endpoint = state.endpoint().unwrap_or(""),
            "Connection state changed"
        );

        self.window.set_caption(&state.caption(&self.window_title))?;
        Ok(())
    }
}

/// Subscribes to the controller and mirrors its state.
pub struct ConnectionStateBridge {
    inner: Arc<BridgeInner>,
    subscription: Mutex<Option<(Arc<dyn Controller>, SubscriptionId)>>,
}

impl ConnectionStateBridge {
    /// Seed a disconnected snapshot, set the matching caption, and subscribe.
    pub fn new(
        controller: &Arc<dyn Controller>,
        window: Arc<ToolWindowHandle>,
        sink: Arc<DiagnosticSink>,
        window_title: impl Into<String>,
    ) -> Self {
        let inner = Arc::new(BridgeInner {
            state: RwLock::new(Arc::new(ConnectionState::Disconnected)),
            window,
            sink,
            window_title: window_title.into(),
            detached: AtomicBool::new(false),
            applied: AtomicU64::new(0),
        });

        let initial = ConnectionState::Disconnected.caption(&inner.window_title);
        if let Err(e) = inner.window.set_caption(&initial) {
            inner.sink.write_error(&e);
        }

        let listener_inner = Arc::clone(&inner);
        let id = controller.subscribe(Arc::new(move |event: &ConnectionEvent| {
            listener_inner.on_event(event);
        }));

        Self {
            inner,
            subscription: Mutex::new(Some((Arc::clone(controller), id))),
        }
    }

    /// Current snapshot. Never blocks on the controller.
    pub fn state(&self) -> Arc<ConnectionState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Number of notifications whose state was cached.
    pub fn applied_events(&self) -> u64 {
        self.inner.applied.load(Ordering::SeqCst)
    }

    /// Feed a notification directly, as the controller's listener does.
    pub fn handle_event(&self, event: &ConnectionEvent) {
        self.inner.on_event(event);
    }

    /// Unsubscribe from the controller. Later notifications are ignored.
    pub fn detach(&self) {
        self.inner.detached.store(true, Ordering::SeqCst);
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some((controller, id)) = subscription {
            controller.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ManualController;
    use crate::host::memory::{MemoryOutput, MemoryToolWindow};

    struct Fixture {
        controller: Arc<ManualController>,
        window_surface: Arc<MemoryToolWindow>,
        window: Arc<ToolWindowHandle>,
        output: Arc<MemoryOutput>,
        bridge: ConnectionStateBridge,
    }

    fn fixture() -> Fixture {
        let controller = Arc::new(ManualController::new());
        let dyn_controller: Arc<dyn Controller> = controller.clone();
        let window_surface = Arc::new(MemoryToolWindow::new());
        let window = Arc::new(ToolWindowHandle::new(window_surface.clone(), "Tracker Window"));
        window.create().unwrap();
        let output = Arc::new(MemoryOutput::new("Tracker"));
        let sink = Arc::new(DiagnosticSink::new(output.clone()));
        let bridge = ConnectionStateBridge::new(
            &dyn_controller,
            Arc::clone(&window),
            sink,
            "Tracker Window",
        );
        Fixture {
            controller,
            window_surface,
            window,
            output,
            bridge,
        }
    }

    #[test]
    fn caption_follows_connection_state() {
        let f = fixture();
        assert_eq!(f.window.caption(), "Tracker Window - Disconnected");

        f.controller
            .emit(ConnectionEvent::connected("https://svc.example"));
        assert_eq!(
            f.window_surface.record().caption,
            "Tracker Window - Connected to https://svc.example"
        );
        assert!(f.bridge.is_connected());

        f.controller.emit(ConnectionEvent::disconnected());
        assert_eq!(f.window_surface.record().caption, "Tracker Window - Disconnected");
        assert_eq!(*f.bridge.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn handler_failure_does_not_block_next_update() {
        let f = fixture();
        f.window_surface.fail_next_captions(1);

        f.controller
            .emit(ConnectionEvent::connected("https://a.example"));
        assert!(f.output.contents().contains("Connection state update failed"));
        // State is cached before the caption is pushed.
        assert!(f.bridge.is_connected());

        f.controller.emit(ConnectionEvent::disconnected());
        assert_eq!(f.window_surface.record().caption, "Tracker Window - Disconnected");
        assert_eq!(f.bridge.applied_events(), 2);
    }

    #[test]
    fn detach_unsubscribes() {
        let f = fixture();
        f.bridge.detach();
        assert_eq!(f.controller.listener_count(), 0);

        f.bridge
            .handle_event(&ConnectionEvent::connected("https://svc.example"));
        assert!(!f.bridge.is_connected());
        assert_eq!(f.bridge.applied_events(), 0);
    }

    #[test]
    fn snapshots_are_whole_across_threads() {
        let f = fixture();
        let bridge = Arc::new(f.bridge);
        let writer = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                for i in 0..200 {
                    if i % 2 == 0 {
                        let endpoint = format!("https://{i}.example");
                        bridge.handle_event(&ConnectionEvent::connected(endpoint));
                    } else {
                        bridge.handle_event(&ConnectionEvent::disconnected());
                    }
                }
            })
        };
        for _ in 0..200 {
            let state = bridge.state();
            match &*state {
                ConnectionState::Connected { endpoint } => assert!(endpoint.ends_with(".example")),
                ConnectionState::Disconnected => {}
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn state_serializes_with_status_tag() {
        let json = serde_json::to_value(ConnectionState::Connected {
            endpoint: "https://svc.example".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "connected");
        assert_eq!(json["endpoint"], "https://svc.example");
    }
}
