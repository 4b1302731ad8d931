//! Command registry: host registration, status queries and dispatch.

use std::sync::Arc;

use crate::commands::descriptor::{CommandAction, CommandDescriptor};
use crate::connection::ConnectionStateBridge;
use crate::controller::{ConnectMode, Controller};
use crate::diagnostics::{self, DiagnosticSink};
use crate::error::{CommandError, Error, HostError, Result};
use crate::host::{CommandHandle, CommandStatus, CommandSurface, ExecMode, MenuControl};
use crate::toolwindow::ToolWindowHandle;

/// Session components the command actions operate on.
#[derive(Clone)]
pub struct CommandContext {
    pub controller: Arc<dyn Controller>,
    pub window: Arc<ToolWindowHandle>,
    pub bridge: Arc<ConnectionStateBridge>,
    pub sink: Arc<DiagnosticSink>,
}

struct RegisteredCommand {
    descriptor: CommandDescriptor,
    handle: CommandHandle,
}

/// Fixed set of named commands for one session.
pub struct CommandRegistry {
    namespace: String,
    surface: Arc<dyn CommandSurface>,
    ctx: CommandContext,
    popup: Option<MenuControl>,
    commands: Vec<RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new(
        namespace: impl Into<String>,
        surface: Arc<dyn CommandSurface>,
        ctx: CommandContext,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            surface,
            ctx,
            popup: None,
            commands: Vec::new(),
        }
    }

    /// Add the product popup to `menu`. Commands registered afterwards are placed in it.
    pub fn install_menu(&mut self, menu: &str, caption: &str, position: u32) -> Result<()> {
        let popup = self.surface.add_menu_popup(menu, caption, position)?;
        tracing::debug!(menu, caption, position, "Installed menu popup");
        self.popup = Some(popup);
        Ok(())
    }

    pub fn full_name(&self, name: &str) -> String {
        format!("{}.{}", self.namespace, name)
    }

    /// Register with the host, re-using a command an earlier session left behind.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<&CommandHandle> {
        if self
            .commands
            .iter()
            .any(|c| c.descriptor.name == descriptor.name)
        {
            return Err(CommandError::Duplicate {
                name: descriptor.name,
            }
            .into());
        }

        let full_name = self.full_name(&descriptor.name);
        let handle = match self.surface.register_command(
            &full_name,
            &descriptor.caption,
            &descriptor.tooltip,
        ) {
            Ok(handle) => handle,
            Err(HostError::CommandExists { .. }) => {
                tracing::debug!(
                    command = %full_name,
                    "Command already registered with host, re-using"
                );
                self.surface.find_command(&full_name)?
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(popup) = &self.popup {
            let position = self.commands.len() as u32 + 1;
            self.surface.add_control(&handle, popup, position)?;
        }

        tracing::debug!(command = %full_name, "Registered command");
        self.commands.push(RegisteredCommand { descriptor, handle });
        let registered = self.commands.len() - 1;
        Ok(&self.commands[registered].handle)
    }

    /// Register every descriptor, stopping at the first failure.
    pub fn register_all(&mut self, descriptors: Vec<CommandDescriptor>) -> Result<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Accepts the host's fully qualified name or the short name.
    fn resolve(&self, name: &str) -> Option<&RegisteredCommand> {
        let short = name
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name);
        self.commands.iter().find(|c| c.descriptor.name == short)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Short names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .map(|c| c.descriptor.name.as_str())
            .collect()
    }

    pub fn handle(&self, name: &str) -> Option<&CommandHandle> {
        self.resolve(name).map(|c| &c.handle)
    }

    /// Status from the cached connection state. Unknown commands are
    /// reported supported but not enabled.
    pub fn query_status(&self, name: &str) -> CommandStatus {
        match self.resolve(name) {
            Some(command) => {
                let state = self.ctx.bridge.state();
                CommandStatus::from_enabled(command.descriptor.is_enabled(&state))
            }
            None => CommandStatus::SUPPORTED,
        }
    }

    /// Caption for hosts that ask for command text.
    pub fn query_text(&self, name: &str) -> Option<String> {
        self.resolve(name).map(|c| c.descriptor.caption.clone())
    }

    /// Run the command bound to `name`. Returns whether it was handled.
    pub fn exec(&self, name: &str, mode: ExecMode) -> bool {
        if mode != ExecMode::Default {
            return false;
        }
        let Some(command) = self.resolve(name) else {
            return false;
        };

        let short = command.descriptor.name.clone();
        let action = command.descriptor.action;
        let context = format!("Command {short}");
        diagnostics::guard(Some(&self.ctx.sink), &context, || {
            self.run(action).map_err(|e| {
                Error::from(CommandError::ActionFailed {
                    name: short.clone(),
                    source: Box::new(e),
                })
            })
        })
        .is_some()
    }

    fn run(&self, action: CommandAction) -> Result<()> {
        let controller = &self.ctx.controller;
        match action {
            CommandAction::Login => {
                if !controller.is_connected() {
                    controller.connect(ConnectMode::Interactive)?;
                }
            }
            CommandAction::Logout => {
                if controller.is_connected() {
                    controller.disconnect()?;
                }
            }
            CommandAction::ShowToDoList => self.ctx.window.show()?,
            CommandAction::Options => controller.show_options()?,
        }
        tracing::info!(action = ?action, "Command executed");
        Ok(())
    }

    /// Remove the product popup from the host menu bar.
    pub fn teardown(&mut self) -> Result<()> {
        if let Some(popup) = self.popup.take() {
            self.surface.remove_control(&popup)?;
            tracing::debug!(menu = %popup.menu, "Removed menu popup");
        }
        Ok(())
    }
}
