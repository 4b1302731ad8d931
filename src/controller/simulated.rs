//! Simulated controller: a tokio-driven stand-in for the task-tracking service.
//!
//! Connect and disconnect are handed to a spawned task that waits the
//! configured latency and then fires the state-changed notification from the
//! runtime's worker thread, the same way a real network-backed controller
//! reports back on a thread the add-in does not own.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::AddinConfig;
use crate::controller::{
    ConnectMode, ConnectionEvent, Controller, ControllerFactory, ControllerRequest, ListenerSet,
    StateListener, SubscriptionId,
};
use crate::error::ControllerError;

struct Shared {
    endpoint: String,
    connected: AtomicBool,
    disposed: AtomicBool,
    listeners: ListenerSet,
}

pub struct SimulatedController {
    shared: Arc<Shared>,
    runtime: Handle,
    latency: Duration,
    /// Whether a non-interactive connect can succeed without prompting.
    stored_credentials: bool,
    data_dir: Option<PathBuf>,
    requests: Mutex<Vec<ControllerRequest>>,
    options_opened: AtomicU32,
}

impl SimulatedController {
    pub fn new(endpoint: impl Into<String>, runtime: Handle, latency: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                endpoint: endpoint.into(),
                connected: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                listeners: ListenerSet::new(),
            }),
            runtime,
            latency,
            stored_credentials: true,
            data_dir: None,
            requests: Mutex::new(Vec::new()),
            options_opened: AtomicU32::new(0),
        }
    }

    pub fn with_stored_credentials(mut self, stored: bool) -> Self {
        self.stored_credentials = stored;
        self
    }

    /// Directory the time-tracking repository lives in. Passed through, never read here.
    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn data_dir(&self) -> Option<&PathBuf> {
        self.data_dir.as_ref()
    }

    pub fn requests(&self) -> Vec<ControllerRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn options_opened(&self) -> u32 {
        self.options_opened.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    fn record(&self, request: ControllerRequest) -> Result<(), ControllerError> {
        if self.is_disposed() {
            return Err(ControllerError::Disposed);
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        Ok(())
    }

    /// Settle into `connected` after the latency elapses.
    fn schedule(&self, connected: bool) {
        let shared = Arc::clone(&self.shared);
        let latency = self.latency;
        self.runtime.spawn(async move {
            tokio::time::sleep(latency).await;
            if shared.disposed.load(Ordering::SeqCst) {
                return;
            }
            shared.connected.store(connected, Ordering::SeqCst);
            let event = if connected {
                ConnectionEvent::connected(shared.endpoint.clone())
            } else {
                ConnectionEvent::disconnected()
            };
            tracing::info!(
                connected,
                endpoint = %shared.endpoint,
                "Simulated controller state changed"
            );
            shared.listeners.notify(&event);
        });
    }
}

impl Controller for SimulatedController {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn connect(&self, mode: ConnectMode) -> Result<(), ControllerError> {
        self.record(ControllerRequest::Connect(mode))?;
        if !mode.is_interactive() && !self.stored_credentials {
            tracing::info!("No stored credentials, skipping non-interactive connect");
            return Ok(());
        }
        self.schedule(true);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ControllerError> {
        self.record(ControllerRequest::Disconnect)?;
        self.schedule(false);
        Ok(())
    }

    fn show_options(&self) -> Result<(), ControllerError> {
        self.record(ControllerRequest::Options)?;
        self.options_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&self) -> Result<(), ControllerError> {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::Disposed);
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        tracing::debug!("Simulated controller disposed");
        Ok(())
    }

    fn subscribe(&self, listener: StateListener) -> SubscriptionId {
        self.shared.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.listeners.remove(id);
    }
}

/// Builds a `SimulatedController` from the add-in configuration.
pub struct SimulatedControllerFactory {
    runtime: Handle,
    stored_credentials: bool,
    last: Mutex<Option<Arc<SimulatedController>>>,
}

impl SimulatedControllerFactory {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            stored_credentials: true,
            last: Mutex::new(None),
        }
    }

    pub fn with_stored_credentials(mut self, stored: bool) -> Self {
        self.stored_credentials = stored;
        self
    }

    /// The most recently built controller.
    pub fn last(&self) -> Option<Arc<SimulatedController>> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ControllerFactory for SimulatedControllerFactory {
    fn create(&self, config: &AddinConfig) -> Result<Arc<dyn Controller>, ControllerError> {
        if config.endpoint.trim().is_empty() {
            return Err(ControllerError::Construction(
                "no service endpoint configured".to_string(),
            ));
        }
        let controller = Arc::new(
            SimulatedController::new(
                config.endpoint.clone(),
                self.runtime.clone(),
                config.connect_latency,
            )
            .with_stored_credentials(self.stored_credentials)
            .with_data_dir(config.data_dir.clone()),
        );
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&controller));
        Ok(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn controller() -> SimulatedController {
        SimulatedController::new("https://svc.example", Handle::current(), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn connect_notifies_listeners_asynchronously() {
        let controller = controller();
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.subscribe(Arc::new(move |ev: &ConnectionEvent| {
            let _ = tx.send(ev.clone());
        }));

        controller.connect(ConnectMode::Interactive).unwrap();
        assert!(!controller.is_connected());

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, ConnectionEvent::connected("https://svc.example"));
        assert!(controller.is_connected());

        controller.disconnect().unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!event.connected);
    }

    #[tokio::test]
    async fn non_interactive_without_credentials_stays_disconnected() {
        let controller = controller().with_stored_credentials(false);
        controller.connect(ConnectMode::NonInteractive).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!controller.is_connected());
        assert_eq!(
            controller.requests(),
            vec![ControllerRequest::Connect(ConnectMode::NonInteractive)]
        );
    }

    #[tokio::test]
    async fn disposed_controller_rejects_requests() {
        let controller = controller();
        controller.dispose().unwrap();
        assert!(matches!(
            controller.connect(ConnectMode::Interactive),
            Err(ControllerError::Disposed)
        ));
        assert!(matches!(controller.dispose(), Err(ControllerError::Disposed)));
    }

    #[tokio::test]
    async fn factory_requires_endpoint() {
        let factory = SimulatedControllerFactory::new(Handle::current());
        let config = AddinConfig {
            endpoint: String::new(),
            ..AddinConfig::default()
        };
        assert!(factory.create(&config).is_err());
        assert!(factory.create(&AddinConfig::default()).is_ok());
        assert!(factory.last().is_some());
    }
}
