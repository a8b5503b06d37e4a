//! Navigation history stack.
//!
//! # Invariants
//! - The top entry is the view currently displayed.
//! - The back control is visible iff `depth() > 1`.
//! - Going back on a stack of depth 0 or 1 changes nothing.
//! - A lone `home` entry is replaced by the next push.

use super::view::ViewId;
use serde::{Deserialize, Serialize};

/// What `go_back` opens after popping the current and previous entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackPolicy {
    /// `home` if the previous entry was home, otherwise the dashboard.
    #[default]
    DashboardFallback,
    /// The previous entry itself.
    RestorePrevious,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewHistory {
    entries: Vec<ViewId>,
}

impl ViewHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, view: ViewId) {
        if self.entries == [ViewId::Home] {
            self.entries.clear();
        }
        self.entries.push(view);
    }

    pub fn current(&self) -> Option<&ViewId> {
        self.entries.last()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn back_visible(&self) -> bool {
        self.depth() > 1
    }

    pub fn entries(&self) -> &[ViewId] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Pops the current and previous entries and returns the view to open.
    ///
    /// Returns `None` (leaving the stack untouched) when there is nothing to
    /// go back to. The caller re-pushes the returned view when opening it.
    pub fn pop_for_back(&mut self, policy: BackPolicy) -> Option<ViewId> {
        if self.entries.len() <= 1 {
            return None;
        }
        self.entries.pop();
        let previous = self.entries.pop()?;
        Some(match policy {
            BackPolicy::RestorePrevious => previous,
            BackPolicy::DashboardFallback if previous == ViewId::Home => ViewId::Home,
            BackPolicy::DashboardFallback => ViewId::Dashboard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BackPolicy, ViewHistory};
    use crate::nav::view::ViewId;

    #[test]
    fn back_is_a_noop_on_short_stacks() {
        let mut history = ViewHistory::new();
        assert_eq!(history.pop_for_back(BackPolicy::default()), None);
        history.push(ViewId::Profile);
        assert_eq!(history.pop_for_back(BackPolicy::default()), None);
        assert_eq!(history.entries(), &[ViewId::Profile]);
        assert!(!history.back_visible());
    }

    #[test]
    fn dashboard_fallback_reopens_home_only_for_home() {
        let mut history = ViewHistory::new();
        history.push(ViewId::Lessons);
        history.push(ViewId::Home);
        history.push(ViewId::Feedback);
        assert_eq!(history.pop_for_back(BackPolicy::DashboardFallback), Some(ViewId::Home));
        assert_eq!(history.entries(), &[ViewId::Lessons]);
        history.clear();

        history.push(ViewId::Lessons);
        history.push(ViewId::Profile);
        assert_eq!(
            history.pop_for_back(BackPolicy::DashboardFallback),
            Some(ViewId::Dashboard)
        );
    }

    #[test]
    fn a_lone_home_entry_is_replaced_by_the_next_view() {
        let mut history = ViewHistory::new();
        history.push(ViewId::Home);
        history.push(ViewId::Dashboard);
        assert_eq!(history.entries(), &[ViewId::Dashboard]);
        assert!(!history.back_visible());

        history.push(ViewId::Home);
        history.push(ViewId::Profile);
        assert_eq!(
            history.entries(),
            &[ViewId::Dashboard, ViewId::Home, ViewId::Profile]
        );
    }

    #[test]
    fn restore_previous_returns_the_popped_entry() {
        let mut history = ViewHistory::new();
        history.push(ViewId::Lessons);
        history.push(ViewId::LessonDetail("7".to_string()));
        assert_eq!(
            history.pop_for_back(BackPolicy::RestorePrevious),
            Some(ViewId::Lessons)
        );
    }
}
