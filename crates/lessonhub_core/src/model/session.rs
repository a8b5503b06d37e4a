//! Authenticated session and role model.
//!
//! # Invariants
//! - `Role` parsing never fails; unknown or missing roles are `Student`.
//! - Avatar URLs shown anywhere go through [`resolve_avatar_url`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Known-broken default avatar that older profiles still reference.
pub const BROKEN_AVATAR_URL: &str = "https://i.postimg.cc/PJYxtq3x/default-avatar.png";
/// Replacement for missing or broken avatars.
pub const FALLBACK_AVATAR_URL: &str = "https://i.imgur.com/knDbHOH.png";

/// Access tier gating navigation and mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Student,
    Creator,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "creator" => Self::Creator,
            "admin" => Self::Admin,
            _ => Self::Student,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Creator => "creator",
            Self::Admin => "admin",
        }
    }

    /// Creators and admins manage content and see staff-only views.
    pub fn is_staff(self) -> bool {
        matches!(self, Self::Creator | Self::Admin)
    }

    pub fn greeting_emoji(self) -> &'static str {
        match self {
            Self::Student => "📘",
            Self::Creator => "🛠️",
            Self::Admin => "👋",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in user and the attributes derived from their profile record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub display_name: String,
    pub avatar_url: String,
    pub email: String,
}

impl Session {
    /// Header greeting, e.g. `Welcome, 📘 Ana!`.
    pub fn greeting(&self) -> String {
        format!(
            "Welcome, {} {}!",
            self.role.greeting_emoji(),
            self.display_name
        )
    }

    /// First word of the display name, used by compact widgets.
    pub fn first_name(&self) -> &str {
        self.display_name
            .split_whitespace()
            .next()
            .unwrap_or("User")
    }
}

/// Maps a stored avatar candidate to the URL that should be displayed.
pub fn resolve_avatar_url(candidate: Option<&str>) -> String {
    match candidate.map(str::trim) {
        None | Some("") => FALLBACK_AVATAR_URL.to_string(),
        Some(BROKEN_AVATAR_URL) => FALLBACK_AVATAR_URL.to_string(),
        Some(url) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_avatar_url, Role, Session, BROKEN_AVATAR_URL, FALLBACK_AVATAR_URL};

    #[test]
    fn avatar_resolution_replaces_broken_and_empty_urls() {
        assert_eq!(resolve_avatar_url(Some(BROKEN_AVATAR_URL)), FALLBACK_AVATAR_URL);
        assert_eq!(resolve_avatar_url(Some("  ")), FALLBACK_AVATAR_URL);
        assert_eq!(resolve_avatar_url(None), FALLBACK_AVATAR_URL);
        assert_eq!(
            resolve_avatar_url(Some("https://example.test/me.png")),
            "https://example.test/me.png"
        );
    }

    #[test]
    fn role_parsing_defaults_to_student() {
        assert_eq!(Role::parse("Creator"), Role::Creator);
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("owner"), Role::Student);
        assert!(Role::Admin.is_staff());
        assert!(!Role::Student.is_staff());
    }

    #[test]
    fn greeting_uses_role_emoji() {
        let session = Session {
            user_id: "u1".to_string(),
            role: Role::Creator,
            display_name: "Ana Cruz".to_string(),
            avatar_url: FALLBACK_AVATAR_URL.to_string(),
            email: "ana@example.test".to_string(),
        };
        assert_eq!(session.greeting(), "Welcome, 🛠️ Ana Cruz!");
        assert_eq!(session.first_name(), "Ana");
    }
}
