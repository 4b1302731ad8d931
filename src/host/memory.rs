//! In-process host surfaces.
//!
//! Record every call so the simulator can print what a real IDE would show
//! and tests can assert on it. Each surface has switches to make its next
//! calls fail.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::error::HostError;
use crate::host::{
    CommandHandle, CommandSurface, Icon, MenuControl, OutputSurface, ToolWindowSurface,
};

fn call_failed(call: &str) -> HostError {
    HostError::CallFailed {
        call: call.to_string(),
        reason: "injected failure".to_string(),
    }
}

/// Output pane backed by a string buffer. Optionally echoes to stderr.
pub struct MemoryOutput {
    name: String,
    buffer: Mutex<String>,
    activations: AtomicU32,
    failing: AtomicBool,
    echo: bool,
}

impl MemoryOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffer: Mutex::new(String::new()),
            activations: AtomicU32::new(0),
            failing: AtomicBool::new(false),
            echo: false,
        }
    }

    /// Also print every write to stderr.
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn activations(&self) -> u32 {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl OutputSurface for MemoryOutput {
    fn activate(&self) -> Result<(), HostError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(call_failed("OutputWindowPane.Activate"));
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, text: &str) -> Result<(), HostError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(call_failed("OutputWindowPane.OutputString"));
        }
        if self.echo {
            eprint!("[{}] {}", self.name, text);
        }
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(text);
        Ok(())
    }
}

/// A control placed in a popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedControl {
    pub full_name: String,
    pub popup_id: u64,
    pub position: u32,
}

/// Command table and menu bar.
///
/// Registered commands outlive sessions, the way an IDE keeps an add-in's
/// commands across restarts.
pub struct MemoryCommandSurface {
    commands: Mutex<HashMap<String, CommandHandle>>,
    popups: Mutex<Vec<MenuControl>>,
    controls: Mutex<Vec<PlacedControl>>,
    menus: Vec<String>,
    next_id: AtomicU64,
    register_calls: AtomicU32,
    fail_register: AtomicBool,
    fail_remove: AtomicBool,
}

impl MemoryCommandSurface {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(HashMap::new()),
            popups: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            menus: vec!["Tools".to_string(), "View".to_string()],
            next_id: AtomicU64::new(1),
            register_calls: AtomicU32::new(0),
            fail_register: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
        }
    }

    /// Pre-populate commands left behind by an earlier session.
    pub fn with_existing(self, full_names: &[&str]) -> Self {
        {
            let mut commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
            for name in full_names {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                commands.insert(
                    name.to_string(),
                    CommandHandle {
                        full_name: name.to_string(),
                        id,
                    },
                );
            }
        }
        self
    }

    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub fn command(&self, full_name: &str) -> Option<CommandHandle> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(full_name)
            .cloned()
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn register_calls(&self) -> u32 {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Popups currently on the menu bar.
    pub fn popups(&self) -> Vec<MenuControl> {
        self.popups.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn controls(&self) -> Vec<PlacedControl> {
        self.controls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MemoryCommandSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSurface for MemoryCommandSurface {
    fn register_command(
        &self,
        full_name: &str,
        _caption: &str,
        _tooltip: &str,
    ) -> Result<CommandHandle, HostError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(call_failed("Commands.AddNamedCommand"));
        }
        let mut commands = self.commands.lock().unwrap_or_else(|e| e.into_inner());
        if commands.contains_key(full_name) {
            return Err(HostError::CommandExists {
                name: full_name.to_string(),
            });
        }
        let handle = CommandHandle {
            full_name: full_name.to_string(),
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        commands.insert(full_name.to_string(), handle.clone());
        Ok(handle)
    }

    fn find_command(&self, full_name: &str) -> Result<CommandHandle, HostError> {
        self.command(full_name)
            .ok_or_else(|| HostError::CommandNotFound {
                name: full_name.to_string(),
            })
    }

    fn add_menu_popup(
        &self,
        menu: &str,
        caption: &str,
        _position: u32,
    ) -> Result<MenuControl, HostError> {
        if !self.menus.iter().any(|m| m == menu) {
            return Err(HostError::MenuNotFound {
                menu: menu.to_string(),
            });
        }
        let popup = MenuControl {
            menu: menu.to_string(),
            caption: caption.to_string(),
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        self.popups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(popup.clone());
        Ok(popup)
    }

    fn add_control(
        &self,
        command: &CommandHandle,
        popup: &MenuControl,
        position: u32,
    ) -> Result<(), HostError> {
        self.controls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PlacedControl {
                full_name: command.full_name.clone(),
                popup_id: popup.id,
                position,
            });
        Ok(())
    }

    fn remove_control(&self, popup: &MenuControl) -> Result<(), HostError> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(call_failed("CommandBarControl.Delete"));
        }
        self.popups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|p| p.id != popup.id);
        self.controls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|c| c.popup_id != popup.id);
        Ok(())
    }
}

/// What the host currently shows for the tool window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowRecord {
    pub create_calls: u32,
    pub activate_calls: u32,
    pub visible: bool,
    pub caption: String,
    pub captions: Vec<String>,
    pub icon: Option<Icon>,
}

/// Tool window host.
pub struct MemoryToolWindow {
    record: Mutex<WindowRecord>,
    fail_create: AtomicBool,
    fail_activate: AtomicBool,
    /// Number of upcoming `set_caption` calls that fail.
    failing_captions: AtomicU32,
}

impl MemoryToolWindow {
    pub fn new() -> Self {
        Self {
            record: Mutex::new(WindowRecord::default()),
            fail_create: AtomicBool::new(false),
            fail_activate: AtomicBool::new(false),
            failing_captions: AtomicU32::new(0),
        }
    }

    pub fn record(&self) -> WindowRecord {
        self.record.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_activate(&self, fail: bool) {
        self.fail_activate.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_captions(&self, count: u32) {
        self.failing_captions.store(count, Ordering::SeqCst);
    }
}

impl Default for MemoryToolWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolWindowSurface for MemoryToolWindow {
    fn create(&self, caption: &str) -> Result<(), HostError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(call_failed("Windows2.CreateToolWindow2"));
        }
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        record.create_calls += 1;
        record.caption = caption.to_string();
        record.captions.push(caption.to_string());
        Ok(())
    }

    fn activate(&self) -> Result<(), HostError> {
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(call_failed("Window.Activate"));
        }
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        if record.create_calls == 0 {
            return Err(HostError::Unavailable("tool window".to_string()));
        }
        record.activate_calls += 1;
        Ok(())
    }

    fn set_visible(&self, visible: bool) -> Result<(), HostError> {
        self.record
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .visible = visible;
        Ok(())
    }

    fn set_caption(&self, caption: &str) -> Result<(), HostError> {
        let pending = self.failing_captions.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_captions.store(pending - 1, Ordering::SeqCst);
            return Err(call_failed("Window.Caption"));
        }
        let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
        record.caption = caption.to_string();
        record.captions.push(caption.to_string());
        Ok(())
    }

    fn set_icon(&self, icon: &Icon) -> Result<(), HostError> {
        self.record.lock().unwrap_or_else(|e| e.into_inner()).icon = Some(icon.clone());
        Ok(())
    }
}
