//! The single to-do list tool window.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::HostError;
use crate::host::{Icon, ToolWindowSurface};

/// Result of a `create()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCreation {
    Created,
    /// The window already existed and was brought to the front.
    Activated,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolWindowState {
    pub created: bool,
    pub visible: bool,
    pub caption: String,
}

/// Session-owned handle over the host's tool window.
///
/// At most one host window exists per handle. Caption and visibility set
/// before creation are remembered and applied when the window is created.
pub struct ToolWindowHandle {
    surface: Arc<dyn ToolWindowSurface>,
    icon: Option<Icon>,
    state: Mutex<ToolWindowState>,
}

impl ToolWindowHandle {
    pub fn new(surface: Arc<dyn ToolWindowSurface>, caption: impl Into<String>) -> Self {
        Self {
            surface,
            icon: None,
            state: Mutex::new(ToolWindowState {
                caption: caption.into(),
                ..ToolWindowState::default()
            }),
        }
    }

    pub fn with_icon(mut self, icon: Icon) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Create the window, or activate it if it already exists.
    pub fn create(&self) -> Result<WindowCreation, HostError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.created {
            self.surface.activate()?;
            return Ok(WindowCreation::Activated);
        }

        self.surface.create(&state.caption)?;
        state.created = true;
        if let Some(icon) = &self.icon
            && let Err(e) = self.surface.set_icon(icon)
        {
            tracing::debug!(error = %e, "Tool window icon not applied");
        }
        if state.visible {
            self.surface.set_visible(true)?;
        }
        Ok(WindowCreation::Created)
    }

    /// Create if needed and make visible.
    pub fn show(&self) -> Result<(), HostError> {
        self.create()?;
        self.set_visible(true)
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.created {
            self.surface.set_visible(visible)?;
        }
        state.visible = visible;
        Ok(())
    }

    /// Update the caption. The cached caption changes even when the host call fails.
    pub fn set_caption(&self, caption: &str) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.caption = caption.to_string();
        if state.created {
            self.surface.set_caption(caption)?;
        }
        Ok(())
    }

    pub fn caption(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .caption
            .clone()
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).visible
    }

    pub fn snapshot(&self) -> ToolWindowState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryToolWindow;

    fn handle() -> (Arc<MemoryToolWindow>, ToolWindowHandle) {
        let surface = Arc::new(MemoryToolWindow::new());
        let handle = ToolWindowHandle::new(surface.clone(), "Tracker Window - Disconnected")
            .with_icon(Icon { resource_id: 7 });
        (surface, handle)
    }

    #[test]
    fn second_create_only_activates() {
        let (surface, handle) = handle();
        assert_eq!(handle.create().unwrap(), WindowCreation::Created);
        assert_eq!(handle.create().unwrap(), WindowCreation::Activated);

        let record = surface.record();
        assert_eq!(record.create_calls, 1);
        assert_eq!(record.activate_calls, 1);
        assert_eq!(record.icon, Some(Icon { resource_id: 7 }));
    }

    #[test]
    fn caption_before_create_is_applied_on_create() {
        let (surface, handle) = handle();
        handle
            .set_caption("Tracker Window - Connected to https://svc.example")
            .unwrap();
        assert_eq!(surface.record().create_calls, 0);

        handle.create().unwrap();
        assert_eq!(
            surface.record().caption,
            "Tracker Window - Connected to https://svc.example"
        );
    }

    #[test]
    fn show_creates_and_makes_visible() {
        let (surface, handle) = handle();
        handle.show().unwrap();
        handle.show().unwrap();
        let record = surface.record();
        assert!(record.visible);
        assert_eq!(record.create_calls, 1);
        assert!(handle.is_visible());
    }

    #[test]
    fn failed_create_can_be_retried() {
        let (surface, handle) = handle();
        surface.set_fail_create(true);
        assert!(handle.create().is_err());
        assert!(!handle.snapshot().created);

        surface.set_fail_create(false);
        assert_eq!(handle.create().unwrap(), WindowCreation::Created);
    }

    #[test]
    fn failed_caption_still_cached() {
        let (surface, handle) = handle();
        handle.create().unwrap();
        surface.fail_next_captions(1);
        assert!(handle.set_caption("new").is_err());
        assert_eq!(handle.caption(), "new");
    }
}
