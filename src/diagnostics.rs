//! Diagnostic sink: failure-absorbing output to the host's output pane.
//!
//! Every write is best effort: a missing, disposed, or failing pane is
//! swallowed here and never reaches the caller. Lines are mirrored to
//! `tracing` so an embedder's subscriber sees them as well.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::host::OutputSurface;

/// One-way channel for log lines and errors.
pub struct DiagnosticSink {
    /// `None` once disposed.
    surface: Mutex<Option<Arc<dyn OutputSurface>>>,
}

impl DiagnosticSink {
    /// Wrap an output pane and bring it to the front.
    pub fn new(surface: Arc<dyn OutputSurface>) -> Self {
        if let Err(e) = surface.activate() {
            tracing::debug!(error = %e, "Output pane activation failed");
        }
        Self {
            surface: Mutex::new(Some(surface)),
        }
    }

    pub fn write(&self, text: &str) {
        let surface = {
            let guard = self.surface.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(surface) => Arc::clone(surface),
                None => return,
            }
        };

        match catch_unwind(AssertUnwindSafe(|| surface.write(text))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Output pane write failed"),
            Err(_) => tracing::debug!("Output pane write panicked"),
        }
    }

    pub fn write_line(&self, text: &str) {
        tracing::info!(target: "tracker_addin::diagnostics", "{}", text);
        self.write(&format!("{text}\n"));
    }

    /// Render an error with its full source chain.
    pub fn write_error(&self, error: &(dyn std::error::Error + 'static)) {
        let rendered = render_error_chain(error);
        tracing::warn!(target: "tracker_addin::diagnostics", error = %rendered, "Add-in error");
        self.write(&format!("Error: {rendered}\n"));
    }

    /// Detach from the output pane. Later calls are no-ops.
    pub fn dispose(&self) {
        let mut guard = self.surface.lock().unwrap_or_else(|e| e.into_inner());
        guard.take();
    }

    pub fn is_disposed(&self) -> bool {
        self.surface
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

/// `"outer: inner: root"`. Causes already spelled out by their wrapper are skipped.
pub fn render_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

/// Run `f`, turning both errors and panics into a diagnostic.
///
/// Returns `None` when `f` failed. With no sink the failure is discarded.
pub fn guard<T>(
    sink: Option<&DiagnosticSink>,
    context: &str,
    f: impl FnOnce() -> Result<T, Error>,
) -> Option<T> {
    let error = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => e,
        Err(payload) => Error::Panic {
            context: context.to_string(),
            message: panic_message(payload.as_ref()),
        },
    };

    match sink {
        Some(sink) => {
            sink.write_line(&format!("{context} failed"));
            sink.write_error(&error);
        }
        None => tracing::debug!(context, error = %error, "Discarding error, no diagnostic sink"),
    }
    None
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
