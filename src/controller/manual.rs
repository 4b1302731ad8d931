//! Manual controller. Notifications are fired by the embedder.
//!
//! Useful when the connection is driven by something outside the add-in
//! (another extension, a test) rather than by a network client.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::AddinConfig;
use crate::controller::{
    ConnectMode, ConnectionEvent, Controller, ControllerFactory, ControllerRequest, ListenerSet,
    StateListener, SubscriptionId,
};
use crate::error::ControllerError;

#[derive(Default)]
pub struct ManualController {
    listeners: ListenerSet,
    connected: AtomicBool,
    disposed: AtomicBool,
    disposals: AtomicU32,
    reject_requests: AtomicBool,
    requests: Mutex<Vec<ControllerRequest>>,
}

impl ManualController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update `is_connected` and notify subscribers, on the caller's thread.
    pub fn emit(&self, event: ConnectionEvent) {
        self.connected.store(event.connected, Ordering::SeqCst);
        self.listeners.notify(&event);
    }

    /// Change `is_connected` without notifying anyone.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every following request fail.
    pub fn set_reject_requests(&self, reject: bool) {
        self.reject_requests.store(reject, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ControllerRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Times `dispose` was called across every session it was handed to.
    pub fn disposals(&self) -> u32 {
        self.disposals.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn record(&self, request: ControllerRequest) -> Result<(), ControllerError> {
        if self.is_disposed() {
            return Err(ControllerError::Disposed);
        }
        if self.reject_requests.load(Ordering::SeqCst) {
            return Err(ControllerError::RequestRejected {
                request: format!("{request:?}"),
                reason: "rejected by embedder".to_string(),
            });
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        Ok(())
    }
}

impl Controller for ManualController {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self, mode: ConnectMode) -> Result<(), ControllerError> {
        self.record(ControllerRequest::Connect(mode))
    }

    fn disconnect(&self) -> Result<(), ControllerError> {
        self.record(ControllerRequest::Disconnect)
    }

    fn show_options(&self) -> Result<(), ControllerError> {
        self.record(ControllerRequest::Options)
    }

    fn dispose(&self) -> Result<(), ControllerError> {
        self.disposed.store(true, Ordering::SeqCst);
        self.disposals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self, listener: StateListener) -> SubscriptionId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }
}

/// Hands out one shared `ManualController`, live again on every successful
/// construction; can be told to fail.
#[derive(Default)]
pub struct ManualControllerFactory {
    controller: Arc<ManualController>,
    failures_left: AtomicU32,
    created: AtomicU32,
}

impl ManualControllerFactory {
    pub fn new(controller: Arc<ManualController>) -> Self {
        Self {
            controller,
            failures_left: AtomicU32::new(0),
            created: AtomicU32::new(0),
        }
    }

    /// Fail the next `count` constructions.
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn controller(&self) -> Arc<ManualController> {
        Arc::clone(&self.controller)
    }
}

impl ControllerFactory for ManualControllerFactory {
    fn create(&self, _config: &AddinConfig) -> Result<Arc<dyn Controller>, ControllerError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ControllerError::Construction(
                "service client unavailable".to_string(),
            ));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        self.controller.disposed.store(false, Ordering::SeqCst);
        Ok(self.controller.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_updates_state_and_notifies() {
        let controller = ManualController::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.subscribe(Arc::new(move |ev: &ConnectionEvent| {
            sink.lock().unwrap().push(ev.clone());
        }));

        controller.emit(ConnectionEvent::connected("https://svc.example"));
        assert!(controller.is_connected());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn rejected_requests_are_not_recorded() {
        let controller = ManualController::new();
        controller.set_reject_requests(true);
        assert!(controller.connect(ConnectMode::Interactive).is_err());
        assert!(controller.requests().is_empty());
    }

    #[test]
    fn factory_failures_count_down() {
        let factory = ManualControllerFactory::new(Arc::new(ManualController::new()));
        factory.fail_next(1);
        assert!(factory.create(&AddinConfig::default()).is_err());
        assert!(factory.create(&AddinConfig::default()).is_ok());
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn factory_revives_disposed_controller() {
        let controller = Arc::new(ManualController::new());
        let factory = ManualControllerFactory::new(Arc::clone(&controller));
        factory.create(&AddinConfig::default()).unwrap().dispose().unwrap();
        assert!(controller.is_disposed());
        assert!(controller.connect(ConnectMode::Interactive).is_err());

        factory.create(&AddinConfig::default()).unwrap();
        assert!(!controller.is_disposed());
        assert!(controller.connect(ConnectMode::Interactive).is_ok());
        assert_eq!(controller.disposals(), 1);
    }
}
