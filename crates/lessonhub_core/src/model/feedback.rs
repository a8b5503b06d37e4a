//! Feedback community posts, comments and reactions.

use super::session::{resolve_avatar_url, Role};
use super::{children, millis, opt_text, text};
use serde_json::Value;

/// Reactions a user may leave on a post.
pub const REACTION_EMOJIS: [&str; 6] = ["👍", "❤️", "😆", "😮", "😢", "😡"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub id: String,
    pub uid: String,
    pub name: String,
    pub text: String,
    pub timestamp: i64,
    pub edited_at: Option<i64>,
    /// Shown locally before the store confirms the write.
    pub pending: bool,
}

impl Comment {
    pub fn from_value(id: &str, record: &Value) -> Self {
        let edited_at = record
            .get("editedAt")
            .filter(|value| !value.is_null())
            .map(|_| millis(record, "editedAt"));
        Self {
            id: id.to_string(),
            uid: text(record, "uid"),
            name: opt_text(record, "name").unwrap_or_else(|| "Anonymous".to_string()),
            text: text(record, "text"),
            timestamp: millis(record, "timestamp"),
            edited_at,
            pending: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackPost {
    pub id: String,
    pub uid: String,
    pub name: String,
    pub photo: String,
    pub message: String,
    pub image_data: Option<String>,
    pub timestamp: i64,
    /// Ordered by timestamp, then id.
    pub comments: Vec<Comment>,
    /// `(uid, emoji)` pairs, one per reacting user.
    pub reactions: Vec<(String, String)>,
}

impl FeedbackPost {
    pub fn from_value(id: &str, record: &Value) -> Self {
        let mut comments: Vec<Comment> = children(record.get("comments"))
            .into_iter()
            .map(|(cid, comment)| Comment::from_value(&cid, comment))
            .collect();
        comments.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let reactions = children(record.get("reactions"))
            .into_iter()
            .filter_map(|(uid, emoji)| emoji.as_str().map(|emoji| (uid, emoji.to_string())))
            .collect();

        Self {
            id: id.to_string(),
            uid: text(record, "uid"),
            name: opt_text(record, "name").unwrap_or_else(|| "User".to_string()),
            photo: resolve_avatar_url(record.get("photo").and_then(Value::as_str)),
            message: text(record, "message"),
            image_data: opt_text(record, "imageData"),
            timestamp: millis(record, "timestamp"),
            comments,
            reactions,
        }
    }

    pub fn reaction_summary(&self) -> ReactionSummary {
        let mut unique: Vec<String> = Vec::new();
        for (_, emoji) in &self.reactions {
            if !unique.contains(emoji) {
                unique.push(emoji.clone());
            }
        }
        ReactionSummary {
            unique,
            total: self.reactions.len(),
        }
    }

    pub fn reaction_of(&self, uid: &str) -> Option<&str> {
        self.reactions
            .iter()
            .find(|(reactor, _)| reactor == uid)
            .map(|(_, emoji)| emoji.as_str())
    }
}

/// Distinct emojis in first-seen order plus the total reaction count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSummary {
    pub unique: Vec<String>,
    pub total: usize,
}

/// Decodes `feedbackPosts`, newest first.
pub fn decode_posts(snapshot: Option<&Value>) -> Vec<FeedbackPost> {
    let mut posts: Vec<FeedbackPost> = children(snapshot)
        .into_iter()
        .map(|(pid, record)| FeedbackPost::from_value(&pid, record))
        .collect();
    posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
    posts
}

/// Authors may delete their own content; staff may delete anything.
pub fn can_delete(viewer_role: Role, viewer_uid: &str, author_uid: &str) -> bool {
    viewer_role != Role::Student || viewer_uid == author_uid
}

/// Only the author may edit.
pub fn can_edit(viewer_uid: &str, author_uid: &str) -> bool {
    !viewer_uid.is_empty() && viewer_uid == author_uid
}

pub fn is_reaction(emoji: &str) -> bool {
    REACTION_EMOJIS.contains(&emoji)
}

#[cfg(test)]
mod tests {
    use super::{can_delete, can_edit, decode_posts, is_reaction};
    use crate::model::session::{Role, FALLBACK_AVATAR_URL};
    use serde_json::json;

    #[test]
    fn posts_decode_newest_first_with_sorted_comments() {
        let posts = decode_posts(Some(&json!({
            "1_a": {"uid": "a", "timestamp": 1, "message": "old"},
            "2_b": {
                "uid": "b", "timestamp": 2, "message": "new",
                "comments": {
                    "9_a": {"uid": "a", "text": "late", "timestamp": 9},
                    "5_b": {"uid": "b", "text": "early", "timestamp": 5, "editedAt": 7}
                },
                "reactions": {"a": "👍", "b": "❤️", "c": "👍"}
            }
        })));
        assert_eq!(posts[0].id, "2_b");
        assert_eq!(posts[0].comments[0].text, "early");
        assert_eq!(posts[0].comments[0].edited_at, Some(7));
        assert_eq!(posts[0].comments[1].edited_at, None);
        assert_eq!(posts[1].photo, FALLBACK_AVATAR_URL);

        let summary = posts[0].reaction_summary();
        assert_eq!(summary.unique, vec!["👍".to_string(), "❤️".to_string()]);
        assert_eq!(summary.total, 3);
        assert_eq!(posts[0].reaction_of("b"), Some("❤️"));
    }

    #[test]
    fn permissions_follow_role_and_authorship() {
        assert!(can_delete(Role::Student, "u1", "u1"));
        assert!(!can_delete(Role::Student, "u1", "u2"));
        assert!(can_delete(Role::Creator, "u1", "u2"));
        assert!(can_edit("u1", "u1"));
        assert!(!can_edit("u1", "u2"));
        assert!(is_reaction("😮"));
        assert!(!is_reaction("🙂"));
    }
}
