//! Command descriptors and the built-in command set.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionState;

/// What a command does when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Login,
    Logout,
    ShowToDoList,
    Options,
}

/// When a command is enabled, in terms of the cached connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enablement {
    Always,
    WhenConnected,
    WhenDisconnected,
}

impl Enablement {
    pub fn is_enabled(&self, state: &ConnectionState) -> bool {
        match self {
            Self::Always => true,
            Self::WhenConnected => state.is_connected(),
            Self::WhenDisconnected => !state.is_connected(),
        }
    }
}

/// One registrable command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Short name; the host sees it prefixed with the command namespace.
    pub name: String,
    pub caption: String,
    pub tooltip: String,
    pub action: CommandAction,
    pub enablement: Enablement,
}

impl CommandDescriptor {
    pub fn new(
        name: impl Into<String>,
        caption: impl Into<String>,
        tooltip: impl Into<String>,
        action: CommandAction,
        enablement: Enablement,
    ) -> Self {
        Self {
            name: name.into(),
            caption: caption.into(),
            tooltip: tooltip.into(),
            action,
            enablement,
        }
    }

    pub fn is_enabled(&self, state: &ConnectionState) -> bool {
        self.enablement.is_enabled(state)
    }

    /// Login, Logout, ToDoList and Options, in menu order.
    pub fn builtins(product: &str) -> Vec<CommandDescriptor> {
        vec![
            Self::new(
                "Login",
                "Login",
                format!("Connect to {product}"),
                CommandAction::Login,
                Enablement::WhenDisconnected,
            ),
            Self::new(
                "Logout",
                "Logout",
                format!("Disconnect from {product}"),
                CommandAction::Logout,
                Enablement::WhenConnected,
            ),
            Self::new(
                "ToDoList",
                "To-Do List",
                format!("Show the {product} to-do list"),
                CommandAction::ShowToDoList,
                Enablement::Always,
            ),
            Self::new(
                "Options",
                "Options...",
                format!("{product} options"),
                CommandAction::Options,
                Enablement::Always,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> ConnectionState {
        ConnectionState::Connected {
            endpoint: "https://svc.example".to_string(),
        }
    }

    #[test]
    fn login_and_logout_are_mutually_exclusive() {
        let builtins = CommandDescriptor::builtins("Tracker");
        let login = &builtins[0];
        let logout = &builtins[1];
        for state in [ConnectionState::Disconnected, connected()] {
            assert_ne!(login.is_enabled(&state), logout.is_enabled(&state));
            assert_eq!(login.is_enabled(&state), !state.is_connected());
        }
    }

    #[test]
    fn always_commands_ignore_state() {
        for descriptor in CommandDescriptor::builtins("Tracker")
            .iter()
            .filter(|d| d.enablement == Enablement::Always)
        {
            assert!(descriptor.is_enabled(&ConnectionState::Disconnected));
            assert!(descriptor.is_enabled(&connected()));
        }
    }

    #[test]
    fn builtin_names_unique() {
        let builtins = CommandDescriptor::builtins("Tracker");
        let mut names: Vec<_> = builtins.iter().map(|d| d.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names, vec!["Login", "Logout", "Options", "ToDoList"]);
    }
}
