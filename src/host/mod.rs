//! Host-facing surfaces.
//!
//! The IDE drives the add-in through callbacks and exposes a handful of
//! objects the add-in writes to:
//! - `OutputSurface`: a named output pane for diagnostics
//! - `CommandSurface`: command registration and the menu bar
//! - `ToolWindowSurface`: the single to-do list window
//!
//! `adapter` translates inbound host callbacks into lifecycle operations and
//! `memory` provides in-process implementations for the simulator and tests.

pub mod adapter;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

pub use adapter::HostAdapter;

/// How the host loaded the add-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Loaded while the host is starting; startup-complete will follow.
    Startup,
    /// Loaded after the host finished starting (e.g. from the add-in manager).
    Deferred,
}

/// Why the host is unloading the add-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnloadReason {
    HostShutdown,
    UserClosed,
    AddInsUpdated,
    SolutionReload,
    Other(String),
}

impl UnloadReason {
    /// Only host shutdown and an explicit user unload end the session.
    pub fn tears_down(&self) -> bool {
        matches!(self, Self::HostShutdown | Self::UserClosed)
    }

    /// Parse the textual reasons used by the simulator.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "shutdown" | "host_shutdown" => Self::HostShutdown,
            "user" | "user_closed" => Self::UserClosed,
            "addins" | "addins_updated" => Self::AddInsUpdated,
            "solution" | "solution_reload" => Self::SolutionReload,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for UnloadReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HostShutdown => write!(f, "host_shutdown"),
            Self::UserClosed => write!(f, "user_closed"),
            Self::AddInsUpdated => write!(f, "addins_updated"),
            Self::SolutionReload => write!(f, "solution_reload"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Execution mode the host passes with a command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// "Run now". The only mode that dispatches.
    Default,
    PromptUser,
    DoNotPromptUser,
    ShowHelp,
}

/// Answer to a host status query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    pub supported: bool,
    pub enabled: bool,
}

impl CommandStatus {
    /// Nothing known about the command.
    pub const NONE: Self = Self {
        supported: false,
        enabled: false,
    };

    /// Recognised by the host surface but not enabled.
    pub const SUPPORTED: Self = Self {
        supported: true,
        enabled: false,
    };

    pub const ENABLED: Self = Self {
        supported: true,
        enabled: true,
    };

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::ENABLED } else { Self::SUPPORTED }
    }
}

/// Opaque handle to a command registered with the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandHandle {
    /// Fully qualified name (`<namespace>.<name>`).
    pub full_name: String,
    pub id: u64,
}

/// Opaque handle to a menu control (popup) created on the host command bar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MenuControl {
    pub menu: String,
    pub caption: String,
    pub id: u64,
}

/// Host picture used as a window icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// Bitmap resource id in the add-in's satellite resources.
    pub resource_id: u32,
}

/// Convert the configured bitmap resource into the host's icon type.
pub fn tool_window_icon(resource_id: u32) -> Icon {
    Icon { resource_id }
}

/// Named output pane accepting raw text writes.
pub trait OutputSurface: Send + Sync {
    /// Bring the pane to the front.
    fn activate(&self) -> Result<(), HostError>;

    fn write(&self, text: &str) -> Result<(), HostError>;
}

/// Command registration and menu manipulation.
pub trait CommandSurface: Send + Sync {
    /// Register a new command. Fails with `HostError::CommandExists` when a
    /// previous session already registered it.
    fn register_command(
        &self,
        full_name: &str,
        caption: &str,
        tooltip: &str,
    ) -> Result<CommandHandle, HostError>;

    /// Look up an existing command by its fully qualified name.
    fn find_command(&self, full_name: &str) -> Result<CommandHandle, HostError>;

    /// Add a popup entry to a top-level menu.
    fn add_menu_popup(
        &self,
        menu: &str,
        caption: &str,
        position: u32,
    ) -> Result<MenuControl, HostError>;

    /// Place a command inside a popup.
    fn add_control(
        &self,
        command: &CommandHandle,
        popup: &MenuControl,
        position: u32,
    ) -> Result<(), HostError>;

    fn remove_control(&self, popup: &MenuControl) -> Result<(), HostError>;
}

/// The host side of the to-do list tool window.
pub trait ToolWindowSurface: Send + Sync {
    /// Create the window. Called at most once per session by `ToolWindowHandle`.
    fn create(&self, caption: &str) -> Result<(), HostError>;

    /// Bring an already created window to the front.
    fn activate(&self) -> Result<(), HostError>;

    fn set_visible(&self, visible: bool) -> Result<(), HostError>;

    fn set_caption(&self, caption: &str) -> Result<(), HostError>;

    fn set_icon(&self, icon: &Icon) -> Result<(), HostError>;
}
