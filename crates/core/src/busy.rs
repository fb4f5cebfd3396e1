use crate::view::ViewTree;
use std::cell::RefCell;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Train,
    Search,
    Ask,
}

/// An activatable control: `Idle -> Busy -> Idle`.
///
/// The idle label is captured when the control is created, so restoring it
/// never depends on what the control happened to display at activation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    idle_label: String,
    label: String,
    disabled: bool,
}

impl Control {
    pub fn new(idle_label: impl Into<String>) -> Self {
        let idle_label = idle_label.into();
        Self {
            label: idle_label.clone(),
            idle_label,
            disabled: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_busy(&self) -> bool {
        self.disabled
    }

    /// Disables the control and shows `busy_label`. Returns `false` without
    /// touching anything when the control is already busy.
    pub fn enter(&mut self, busy_label: &str) -> bool {
        if self.disabled {
            return false;
        }
        self.disabled = true;
        self.label = busy_label.to_string();
        true
    }

    pub fn exit(&mut self) {
        self.disabled = false;
        self.label.clone_from(&self.idle_label);
    }
}

/// Holds a control busy for the lifetime of one action and restores it on drop,
/// whichever way the action ends.
pub struct BusyGuard<'a> {
    view: &'a RefCell<ViewTree>,
    control: ControlId,
}

impl<'a> BusyGuard<'a> {
    /// `None` when the control is already busy: the activation is rejected.
    pub fn acquire(
        view: &'a RefCell<ViewTree>,
        control: ControlId,
        busy_label: &str,
    ) -> Option<Self> {
        let entered = view.borrow_mut().control_mut(control).enter(busy_label);
        if !entered {
            debug!(control = ?control, "activation rejected while busy");
            return None;
        }
        Some(Self { view, control })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        match self.view.try_borrow_mut() {
            Ok(mut view) => view.control_mut(self.control).exit(),
            Err(_) => warn!(control = ?self.control, "view borrowed while releasing busy control"),
        }
    }
}
