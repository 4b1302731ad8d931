//! Inbound host protocol.
//!
//! Thin translation of the host's extensibility callbacks into lifecycle
//! manager operations. Host calls are non-reentrant but may arrive on
//! different threads, so the manager sits behind a mutex. Each entry point is
//! shielded: a panic is logged and the host gets the neutral answer.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;

use serde::Serialize;

use crate::diagnostics::panic_message;
use crate::host::{CommandStatus, ExecMode, LoadMode, UnloadReason};
use crate::lifecycle::{ExtensionLifecycleManager, SessionSnapshot};

/// Reply to a host status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryStatusReply {
    pub status: CommandStatus,
    /// Command caption, when the host asked for text.
    pub text: Option<String>,
}

pub struct HostAdapter {
    manager: Mutex<ExtensionLifecycleManager>,
}

impl HostAdapter {
    pub fn new(manager: ExtensionLifecycleManager) -> Self {
        Self {
            manager: Mutex::new(manager),
        }
    }

    fn shielded<R>(
        &self,
        call: &str,
        fallback: R,
        f: impl FnOnce(&mut ExtensionLifecycleManager) -> R,
    ) -> R {
        let mut manager = self.manager.lock().unwrap_or_else(|e| e.into_inner());
        match catch_unwind(AssertUnwindSafe(|| f(&mut *manager))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(call, panic = %message, "Host callback panicked");
                if let Some(sink) = manager.sink() {
                    sink.write_line(&format!("{call} panicked: {message}"));
                }
                fallback
            }
        }
    }

    /// The add-in was loaded.
    pub fn on_connection(&self, mode: LoadMode) {
        self.shielded("OnConnection", (), |m| {
            m.on_load(mode);
        });
    }

    /// The add-in is being unloaded.
    pub fn on_disconnection(&self, reason: UnloadReason) {
        self.shielded("OnDisconnection", (), |m| {
            m.on_unload(reason);
        });
    }

    /// The host's add-in collection changed. The session is unaffected.
    pub fn on_addins_update(&self) {
        tracing::debug!("Add-in collection updated");
    }

    pub fn on_startup_complete(&self) {
        self.shielded("OnStartupComplete", (), |m| {
            m.on_startup_complete();
        });
    }

    /// Teardown waits for `on_disconnection`.
    pub fn on_begin_shutdown(&self) {
        tracing::debug!("Host shutdown started");
    }

    pub fn query_status(&self, name: &str, text_wanted: bool) -> QueryStatusReply {
        self.shielded("QueryStatus", QueryStatusReply::default(), |m| {
            QueryStatusReply {
                status: m.query_status(name),
                text: if text_wanted { m.query_text(name) } else { None },
            }
        })
    }

    /// Returns whether the command was handled; `false` lets the host try other targets.
    pub fn exec(&self, name: &str, mode: ExecMode) -> bool {
        self.shielded("Exec", false, |m| m.exec(name, mode))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.manager
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{AddinConfig, StaticSettings};
    use crate::controller::{ManualController, ManualControllerFactory};
    use crate::host::memory::{MemoryCommandSurface, MemoryOutput, MemoryToolWindow};
    use crate::lifecycle::HostServices;
    use crate::session::SessionPhase;

    fn adapter() -> (Arc<MemoryOutput>, HostAdapter) {
        let output = Arc::new(MemoryOutput::new("Tracker"));
        let host = HostServices {
            output: Some(output.clone()),
            commands: Arc::new(MemoryCommandSurface::new()),
            tool_window: Arc::new(MemoryToolWindow::new()),
            settings: Arc::new(StaticSettings::default()),
            controllers: Arc::new(ManualControllerFactory::new(Arc::new(ManualController::new()))),
        };
        let manager = ExtensionLifecycleManager::new(AddinConfig::default(), host);
        (output, HostAdapter::new(manager))
    }

    #[test]
    fn callbacks_drive_the_session() {
        let (_output, adapter) = adapter();
        adapter.on_connection(LoadMode::Startup);
        adapter.on_startup_complete();
        assert_eq!(adapter.snapshot().phase, SessionPhase::Ready);

        adapter.on_addins_update();
        adapter.on_begin_shutdown();
        assert_eq!(adapter.snapshot().phase, SessionPhase::Ready);

        adapter.on_disconnection(UnloadReason::HostShutdown);
        assert_eq!(adapter.snapshot().phase, SessionPhase::Disposed);
    }

    #[test]
    fn query_text_only_when_wanted() {
        let (_output, adapter) = adapter();
        adapter.on_connection(LoadMode::Startup);

        let reply = adapter.query_status("Tracker.Connect.Login", true);
        assert_eq!(reply.status, CommandStatus::ENABLED);
        assert_eq!(reply.text.as_deref(), Some("Login"));

        let reply = adapter.query_status("Tracker.Connect.Login", false);
        assert_eq!(reply.text, None);
    }

    #[test]
    fn panics_become_fallbacks() {
        let (output, adapter) = adapter();
        adapter.on_connection(LoadMode::Startup);
        let handled = adapter.shielded("Exec", false, |_| panic!("host object gone"));
        assert!(!handled);
        assert!(output.contents().contains("Exec panicked: host object gone"));
        // The mutex stays usable afterwards.
        assert!(adapter.exec("Tracker.Connect.Options", ExecMode::Default));
    }
}
