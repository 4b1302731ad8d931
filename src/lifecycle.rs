//! Extension lifecycle manager.
//!
//! Owns the session phase machine and every session component. The host's
//! load, startup-complete and unload notifications come in here; so do
//! command queries and executions, which are forwarded to the registry once
//! the session is ready. Nothing raised inside a phase escapes: failures end
//! at the nearest guard and become a diagnostic line at most.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::commands::{CommandContext, CommandDescriptor, CommandRegistry};
use crate::config::{AddinConfig, Settings};
use crate::connection::{ConnectionState, ConnectionStateBridge};
use crate::controller::{ConnectMode, Controller, ControllerFactory};
use crate::diagnostics::{self, DiagnosticSink};
use crate::error::{Error, HostError, LifecycleError, Result};
use crate::host::{
    CommandStatus, CommandSurface, ExecMode, LoadMode, OutputSurface, ToolWindowSurface,
    UnloadReason, tool_window_icon,
};
use crate::session::{AddInSession, SessionPhase};
use crate::toolwindow::{ToolWindowHandle, ToolWindowState};

/// Everything the host hands the add-in.
#[derive(Clone)]
pub struct HostServices {
    /// `None` when the host could not provide an output pane.
    pub output: Option<Arc<dyn OutputSurface>>,
    pub commands: Arc<dyn CommandSurface>,
    pub tool_window: Arc<dyn ToolWindowSurface>,
    pub settings: Arc<dyn Settings>,
    pub controllers: Arc<dyn ControllerFactory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Initialized,
    AlreadyLoaded,
    /// Construction failed; the session is back to `Uninitialized`.
    Failed,
    /// The session is shutting down or gone.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    AutoLogin,
    /// Auto-login is off.
    Skipped,
    /// Not ready, or startup was already handled.
    Ignored,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadOutcome {
    TornDown,
    /// Reason does not end the session.
    Ignored,
    /// A load is still in progress.
    Busy,
    AlreadyDisposed,
}

/// Serializable view of the session for status output.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub failed_loads: u32,
    pub connection: Option<ConnectionState>,
    pub window: Option<ToolWindowState>,
    pub commands: Vec<CommandSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandSnapshot {
    pub name: String,
    pub enabled: bool,
}

/// Components alive while the session is `Ready`.
struct Components {
    controller: Arc<dyn Controller>,
    window: Arc<ToolWindowHandle>,
    bridge: Arc<ConnectionStateBridge>,
    registry: CommandRegistry,
}

pub struct ExtensionLifecycleManager {
    config: AddinConfig,
    host: HostServices,
    session: AddInSession,
    /// Survives failed loads so retries report to the same pane.
    sink: Option<Arc<DiagnosticSink>>,
    components: Option<Components>,
    startup_handled: bool,
}

impl ExtensionLifecycleManager {
    pub fn new(config: AddinConfig, host: HostServices) -> Self {
        Self {
            config,
            host,
            session: AddInSession::new(),
            sink: None,
            components: None,
            startup_handled: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    pub fn session(&self) -> &AddInSession {
        &self.session
    }

    pub fn config(&self) -> &AddinConfig {
        &self.config
    }

    pub fn bridge(&self) -> Option<&Arc<ConnectionStateBridge>> {
        self.components.as_ref().map(|c| &c.bridge)
    }

    pub fn sink(&self) -> Option<&Arc<DiagnosticSink>> {
        self.sink.as_ref()
    }

    /// Host load notification.
    pub fn on_load(&mut self, mode: LoadMode) -> LoadOutcome {
        match self.session.phase {
            SessionPhase::Uninitialized => {}
            SessionPhase::Ready => return LoadOutcome::AlreadyLoaded,
            phase => {
                tracing::warn!(phase = %phase, "Load notification rejected");
                return LoadOutcome::Rejected;
            }
        }

        self.advance(SessionPhase::Initializing, Some(format!("load ({mode:?})")));

        let built = match catch_unwind(AssertUnwindSafe(|| self.build())) {
            Ok(result) => result,
            Err(payload) => Err(Error::Panic {
                context: "initialization".to_string(),
                message: diagnostics::panic_message(payload.as_ref()),
            }),
        };

        match built {
            Ok(components) => {
                self.components = Some(components);
                self.advance(SessionPhase::Ready, None);
                self.write_line(&format!("{} add-in initialized", self.config.product_name));
                tracing::info!(
                    session_id = %self.session.session_id,
                    mode = ?mode,
                    "Add-in initialized"
                );
                if mode == LoadMode::Deferred {
                    // The host only sends startup-complete to add-ins loaded during startup.
                    self.on_startup_complete();
                }
                LoadOutcome::Initialized
            }
            Err(e) => {
                self.advance(SessionPhase::Uninitialized, Some(e.to_string()));
                self.report("Initialization", &e);
                LoadOutcome::Failed
            }
        }
    }

    /// Construct every session component. On failure nothing is committed
    /// except the diagnostic sink.
    fn build(&mut self) -> Result<Components> {
        self.config.validate()?;

        let sink = match self.sink.clone() {
            Some(sink) => sink,
            None => {
                let output = self
                    .host
                    .output
                    .clone()
                    .ok_or_else(|| HostError::Unavailable("output pane".to_string()))?;
                let sink = Arc::new(DiagnosticSink::new(output));
                self.sink = Some(Arc::clone(&sink));
                sink
            }
        };

        if let Some(dir) = self.config.ensure_data_dir()? {
            tracing::debug!(data_dir = %dir.display(), "Time-tracking data directory ready");
        }

        let controller = self
            .host
            .controllers
            .create(&self.config)
            .map_err(|e| LifecycleError::Initialization {
                component: "controller".to_string(),
                source: Box::new(e.into()),
            })?;

        let window_title = self.config.window_title();
        let window = Arc::new(
            ToolWindowHandle::new(
                Arc::clone(&self.host.tool_window),
                ConnectionState::Disconnected.caption(&window_title),
            )
            .with_icon(tool_window_icon(self.config.tool_window_icon)),
        );

        // The registry answers status queries from the bridge's snapshot, so
        // the bridge subscribes first.
        let bridge = Arc::new(ConnectionStateBridge::new(
            &controller,
            Arc::clone(&window),
            Arc::clone(&sink),
            window_title,
        ));

        let mut registry = CommandRegistry::new(
            self.config.command_namespace.clone(),
            Arc::clone(&self.host.commands),
            CommandContext {
                controller: Arc::clone(&controller),
                window: Arc::clone(&window),
                bridge: Arc::clone(&bridge),
                sink: Arc::clone(&sink),
            },
        );
        let registered = registry
            .install_menu(
                &self.config.menu_bar,
                &self.config.product_name,
                self.config.menu_position,
            )
            .and_then(|()| {
                registry.register_all(CommandDescriptor::builtins(&self.config.product_name))
            });
        if let Err(e) = registered {
            abandon(&sink, &controller, &bridge, &mut registry);
            return Err(LifecycleError::Initialization {
                component: "command registry".to_string(),
                source: Box::new(e),
            }
            .into());
        }

        if let Err(e) = window.create() {
            abandon(&sink, &controller, &bridge, &mut registry);
            return Err(LifecycleError::Initialization {
                component: "tool window".to_string(),
                source: Box::new(e.into()),
            }
            .into());
        }

        Ok(Components {
            controller,
            window,
            bridge,
            registry,
        })
    }

    /// Host startup-complete notification. Runs auto-login at most once.
    pub fn on_startup_complete(&mut self) -> StartupOutcome {
        if self.session.phase != SessionPhase::Ready || self.startup_handled {
            return StartupOutcome::Ignored;
        }
        let Some(components) = &self.components else {
            return StartupOutcome::Ignored;
        };
        self.startup_handled = true;

        if !self.host.settings.auto_login() {
            return StartupOutcome::Skipped;
        }

        tracing::info!("Auto-login on startup");
        diagnostics::guard(self.sink.as_deref(), "Showing the to-do list", || {
            components.window.show().map_err(Error::from)
        });
        let outcome = diagnostics::guard(self.sink.as_deref(), "Auto-login", || {
            components
                .controller
                .connect(ConnectMode::NonInteractive)
                .map_err(Error::from)
        });
        match outcome {
            Some(()) => StartupOutcome::AutoLogin,
            None => StartupOutcome::Failed,
        }
    }

    /// Host unload notification.
    pub fn on_unload(&mut self, reason: UnloadReason) -> UnloadOutcome {
        if !reason.tears_down() {
            tracing::debug!(reason = %reason, "Unload reason does not end the session");
            return UnloadOutcome::Ignored;
        }
        match self.session.phase {
            SessionPhase::Ready | SessionPhase::Uninitialized => {}
            SessionPhase::Initializing => {
                tracing::warn!(reason = %reason, "Unload notification during load");
                return UnloadOutcome::Busy;
            }
            SessionPhase::Disposing | SessionPhase::Disposed => {
                return UnloadOutcome::AlreadyDisposed;
            }
        }

        self.advance(SessionPhase::Disposing, Some(reason.to_string()));
        let sink = self.sink.take();

        if let Some(mut components) = self.components.take() {
            diagnostics::guard(sink.as_deref(), "Menu removal", || {
                components.registry.teardown()
            });
            components.bridge.detach();
            diagnostics::guard(sink.as_deref(), "Controller dispose", || {
                components.controller.dispose().map_err(Error::from)
            });
        }

        if let Some(sink) = sink {
            sink.write_line(&format!("{} add-in unloaded ({reason})", self.config.product_name));
            sink.dispose();
        }

        self.advance(SessionPhase::Disposed, None);
        tracing::info!(session_id = %self.session.session_id, reason = %reason, "Add-in unloaded");
        UnloadOutcome::TornDown
    }

    /// Host status query. Nothing is supported outside the `Ready` phase.
    pub fn query_status(&self, name: &str) -> CommandStatus {
        match self.ready_components() {
            Some(components) => diagnostics::guard(self.sink.as_deref(), "Command status", || {
                Ok(components.registry.query_status(name))
            })
            .unwrap_or_default(),
            None => CommandStatus::NONE,
        }
    }

    pub fn query_text(&self, name: &str) -> Option<String> {
        self.ready_components()
            .and_then(|c| c.registry.query_text(name))
    }

    /// Host command execution. Returns whether the command was handled.
    pub fn exec(&self, name: &str, mode: ExecMode) -> bool {
        match self.ready_components() {
            Some(components) => components.registry.exec(name, mode),
            None => false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let components = self.components.as_ref();
        let connection = components.map(|c| (*c.bridge.state()).clone());
        let commands = components
            .map(|c| {
                c.registry
                    .names()
                    .into_iter()
                    .map(|name| CommandSnapshot {
                        name: name.to_string(),
                        enabled: c.registry.query_status(name).enabled,
                    })
                    .collect()
            })
            .unwrap_or_default();

        SessionSnapshot {
            session_id: self.session.session_id,
            phase: self.session.phase,
            failed_loads: self.session.failed_loads,
            connection,
            window: components.map(|c| c.window.snapshot()),
            commands,
        }
    }

    fn ready_components(&self) -> Option<&Components> {
        if self.session.phase == SessionPhase::Ready {
            self.components.as_ref()
        } else {
            None
        }
    }

    fn advance(&mut self, phase: SessionPhase, reason: Option<String>) {
        if let Err(e) = self.session.transition_to(phase, reason) {
            tracing::error!(error = %e, "Session phase table violated");
        }
    }

    fn write_line(&self, text: &str) {
        if let Some(sink) = &self.sink {
            sink.write_line(text);
        }
    }

    fn report(&self, context: &str, error: &Error) {
        match &self.sink {
            Some(sink) => {
                sink.write_line(&format!("{context} failed"));
                sink.write_error(error);
            }
            None => {
                tracing::debug!(context, error = %error, "Discarding error, no diagnostic sink")
            }
        }
    }
}

/// Undo what a failed load already placed on the host and release its controller.
fn abandon(
    sink: &DiagnosticSink,
    controller: &Arc<dyn Controller>,
    bridge: &ConnectionStateBridge,
    registry: &mut CommandRegistry,
) {
    bridge.detach();
    diagnostics::guard(Some(sink), "Menu removal", || registry.teardown());
    diagnostics::guard(Some(sink), "Controller dispose", || {
        controller.dispose().map_err(Error::from)
    });
}
