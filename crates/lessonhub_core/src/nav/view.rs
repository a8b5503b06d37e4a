//! View identifiers and their `#/...` fragments.

use crate::model::session::Role;
use std::fmt::{Display, Formatter};

/// A renderable screen. Parameterized views carry the record id they show.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewId {
    Home,
    Dashboard,
    Lessons,
    LessonDetail(String),
    Board,
    LessonNew,
    LessonEdit(String),
    Services,
    Notifications,
    Profile,
    Insight,
    Analytics,
    Admin,
    Feedback,
    FeedbackPost(String),
}

impl ViewId {
    /// Stable route key (the first fragment segment).
    pub fn key(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Dashboard => "dashboard",
            Self::Lessons => "lessons",
            Self::LessonDetail(_) => "lesson",
            Self::Board => "board",
            Self::LessonNew => "lesson-new",
            Self::LessonEdit(_) => "lesson-edit",
            Self::Services => "services",
            Self::Notifications => "notifications",
            Self::Profile => "profile",
            Self::Insight => "insight",
            Self::Analytics => "analytics",
            Self::Admin => "admin",
            Self::Feedback => "feedback",
            Self::FeedbackPost(_) => "feedback",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            Self::LessonDetail(id) | Self::LessonEdit(id) | Self::FeedbackPost(id) => Some(id),
            _ => None,
        }
    }

    /// Canonical fragment, e.g. `#/feedback/1700000000000_u1`.
    pub fn fragment(&self) -> String {
        format!("#/{self}")
    }

    /// Parses a fragment (`#/lesson/7`, `/lesson/7` or `lesson/7`).
    ///
    /// Returns `None` for unknown routes and malformed parameters.
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        let route = fragment.trim().trim_start_matches('#').trim_start_matches('/');
        let route = route.trim_end_matches('/');
        let (key, param) = match route.split_once('/') {
            Some((key, param)) => (key, Some(param)),
            None => (route, None),
        };

        let with_id = |build: fn(String) -> Self| -> Option<Self> {
            let id = param?.trim();
            if id.is_empty() || id.contains('/') {
                return None;
            }
            Some(build(id.to_string()))
        };

        match (key, param) {
            ("home", None) => Some(Self::Home),
            ("dashboard", None) => Some(Self::Dashboard),
            ("lessons", None) => Some(Self::Lessons),
            ("lesson", Some(_)) => with_id(Self::LessonDetail),
            ("board", None) => Some(Self::Board),
            ("lesson-new", None) => Some(Self::LessonNew),
            ("lesson-edit", Some(_)) => with_id(Self::LessonEdit),
            ("services", None) => Some(Self::Services),
            ("notifications", None) => Some(Self::Notifications),
            ("profile", None) => Some(Self::Profile),
            ("insight", None) => Some(Self::Insight),
            ("analytics", None) => Some(Self::Analytics),
            ("admin", None) => Some(Self::Admin),
            ("feedback", None) => Some(Self::Feedback),
            ("feedback", Some(_)) => with_id(Self::FeedbackPost),
            _ => None,
        }
    }

    /// Route dispatch: unknown fragments fall back to home.
    pub fn route(fragment: &str) -> Self {
        Self::from_fragment(fragment).unwrap_or(Self::Home)
    }

    pub fn is_staff_only(&self) -> bool {
        matches!(
            self,
            Self::LessonNew | Self::LessonEdit(_) | Self::Insight | Self::Analytics | Self::Admin
        )
    }

    pub fn permits(&self, role: Role) -> bool {
        !self.is_staff_only() || role.is_staff()
    }
}

impl Display for ViewId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.param() {
            Some(id) => write!(f, "{}/{id}", self.key()),
            None => f.write_str(self.key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ViewId;
    use crate::model::session::Role;

    #[test]
    fn fragments_round_trip_for_parameterized_views() {
        let view = ViewId::FeedbackPost("1700000000000_u1".to_string());
        assert_eq!(view.fragment(), "#/feedback/1700000000000_u1");
        assert_eq!(ViewId::from_fragment(&view.fragment()), Some(view));
        assert_eq!(
            ViewId::from_fragment("notifications"),
            Some(ViewId::Notifications)
        );
        assert_eq!(ViewId::from_fragment("#/feedback"), Some(ViewId::Feedback));
    }

    #[test]
    fn unknown_or_malformed_fragments_route_home() {
        assert_eq!(ViewId::route("#/nowhere"), ViewId::Home);
        assert_eq!(ViewId::route("#/lesson/"), ViewId::Home);
        assert_eq!(ViewId::route("#/lesson/a/b"), ViewId::Home);
        assert_eq!(ViewId::route(""), ViewId::Home);
        assert_eq!(ViewId::from_fragment("#/dashboard/extra"), None);
    }

    #[test]
    fn staff_views_require_a_staff_role() {
        assert!(!ViewId::Admin.permits(Role::Student));
        assert!(ViewId::Admin.permits(Role::Creator));
        assert!(ViewId::Insight.permits(Role::Admin));
        assert!(ViewId::Board.permits(Role::Student));
    }
}
