//! Re-entrancy gate for navigation.
//!
//! Render callbacks run synchronously inside a navigation. A navigation they
//! request is queued here and drained once the outer one finishes, so the
//! history stack only ever sees complete transitions.

use super::view::ViewId;
use crate::model::session::Role;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One navigation intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavRequest {
    Open(ViewId),
    /// Fragment change reported by the host.
    Fragment(String),
    Back,
}

/// What happened to a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Rendered(ViewId),
    /// Deferred until the in-flight navigation completes.
    Queued,
    /// Nothing to do (fragment echo, back on a short stack).
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// No session is ready yet.
    NotReady,
    Forbidden { view: String, role: Role },
}

impl Display for NavigationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => write!(f, "navigation requires a ready session"),
            Self::Forbidden { view, role } => {
                write!(f, "view `{view}` is not available to role `{role}`")
            }
        }
    }
}

impl Error for NavigationError {}

#[derive(Debug, Default)]
pub struct NavigationGate {
    busy: Cell<bool>,
    pending: RefCell<VecDeque<NavRequest>>,
}

impl NavigationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Claims the gate, or returns `None` while another navigation runs.
    pub fn enter(&self) -> Option<GateGuard<'_>> {
        if self.busy.replace(true) {
            return None;
        }
        Some(GateGuard { gate: self })
    }

    pub fn enqueue(&self, request: NavRequest) {
        self.pending.borrow_mut().push_back(request);
    }

    pub fn next_pending(&self) -> Option<NavRequest> {
        self.pending.borrow_mut().pop_front()
    }

    pub fn clear_pending(&self) {
        self.pending.borrow_mut().clear();
    }
}

/// Releases the gate on drop, including during unwinding.
#[must_use]
pub struct GateGuard<'a> {
    gate: &'a NavigationGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.set(false);
    }
}
