//! Activation window.
//!
//! Trace output can be held back until execution first reaches a given
//! code location. From then on the window stays open for the rest of the
//! run, whether or not that location ever executes again.
//!
//! ```rust
//! use memwatch_monitor::{ActivationMarker, ActivationWindow, ExecutionEvent};
//!
//! let mut window = ActivationWindow::new(Some(ActivationMarker::new("app", Some(5))));
//! assert!(!window.observe(&ExecutionEvent::line("app", 4, "")));
//! assert!(window.observe(&ExecutionEvent::line("app", 5, "")));
//! assert!(window.is_open());
//! ```

use tracing::debug;

use crate::config::{is_internal_module, ActivationMarker};
use crate::event::ExecutionEvent;

/// One-way gate in front of trace emission.
#[derive(Debug, Clone)]
pub struct ActivationWindow {
    marker: Option<ActivationMarker>,
    open: bool,
}

impl ActivationWindow {
    /// Creates a window. Without a marker it starts open.
    #[must_use]
    pub fn new(marker: Option<ActivationMarker>) -> Self {
        let open = marker.is_none();
        Self { marker, open }
    }

    /// Returns true once the marker has been reached (or if there is none).
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// The configured marker, if any.
    #[must_use]
    pub fn marker(&self) -> Option<&ActivationMarker> {
        self.marker.as_ref()
    }

    /// Feeds one event through the window and returns true if this event
    /// is the one that opened it.
    pub fn observe(&mut self, event: &ExecutionEvent) -> bool {
        if self.open {
            return false;
        }
        let Some(marker) = &self.marker else {
            return false;
        };
        let Some(module) = event.module_name.as_deref() else {
            return false;
        };
        if is_internal_module(module) || module != marker.module {
            return false;
        }
        if marker.line.is_some_and(|line| line != event.line_number) {
            return false;
        }

        debug!(marker = %marker, "activation window opened");
        self.open = true;
        true
    }
}
