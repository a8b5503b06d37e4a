//! Shell chrome around the main content area.

/// Everything the host page needs to draw after a state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surface {
    /// HTML of the current view.
    pub main_content: String,
    pub back_visible: bool,
    pub sidebar_visible: bool,
    /// Unread notification count; hidden when `None`.
    pub badge: Option<String>,
    pub greeting: String,
    pub avatar_url: String,
    /// Fragment of the displayed view, e.g. `#/lessons`.
    pub fragment: String,
    /// Page the host must load next (sign-out, account deletion).
    pub redirect: Option<String>,
    /// Blocking message that replaces the whole view.
    pub placeholder: Option<String>,
    /// Last user-facing message (success or failure).
    pub alert: Option<String>,
}

impl Surface {
    pub fn set_badge(&mut self, unread: usize) {
        self.badge = (unread > 0).then(|| unread.to_string());
    }

    /// Resets everything except the pending redirect.
    pub fn clear_for_sign_out(&mut self) {
        let redirect = self.redirect.take();
        *self = Self {
            redirect,
            ..Self::default()
        };
    }
}
