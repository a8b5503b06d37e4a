//! Store path normalization and the application's path vocabulary.
//!
//! The builders below are the wire contract with the hosted store and must
//! keep producing the exact same strings.

use super::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static FORBIDDEN_KEY_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.#$\[\]]").expect("valid forbidden key regex"));

/// Normalizes `path` into `a/b/c` form. The root is the empty string.
///
/// Leading/trailing slashes are tolerated; empty segments and the characters
/// `. # $ [ ]` are rejected.
pub fn normalize(path: &str) -> StoreResult<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for segment in trimmed.split('/') {
        validate_key(segment)?;
    }
    Ok(trimmed.to_string())
}

/// Validates one path segment / object key.
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidPath("empty path segment".to_string()));
    }
    if FORBIDDEN_KEY_CHARS_RE.is_match(key) {
        return Err(StoreError::InvalidPath(format!(
            "segment `{key}` contains one of `. # $ [ ]`"
        )));
    }
    Ok(())
}

/// Joins two normalized paths.
pub fn join(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{parent}/{child}"),
    }
}

/// Whether `descendant` lies strictly below `ancestor`.
pub fn is_strict_descendant(descendant: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !descendant.is_empty();
    }
    descendant.len() > ancestor.len()
        && descendant.starts_with(ancestor)
        && descendant.as_bytes()[ancestor.len()] == b'/'
}

/// Whether a change at `changed` affects a listener bound to `listened`.
pub fn affects(changed: &str, listened: &str) -> bool {
    changed == listened
        || is_strict_descendant(changed, listened)
        || is_strict_descendant(listened, changed)
}

/// Proper ancestors of `path`, nearest first (excluding the root).
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = path;
    while let Some(index) = current.rfind('/') {
        current = &current[..index];
        out.push(current);
    }
    out
}

/// Generates a unique, time-ordered child key for `append`.
pub fn generate_push_key() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{millis:013}-{}", &suffix[..12])
}

pub fn student(uid: &str) -> String {
    format!("students/{uid}")
}

pub fn students() -> &'static str {
    "students"
}

pub fn progress(uid: &str) -> String {
    format!("students/{uid}/progress")
}

pub fn completed_lessons(uid: &str) -> String {
    format!("students/{uid}/completedLessons")
}

pub fn lessons() -> &'static str {
    "lessons"
}

pub fn lesson(id: &str) -> String {
    format!("lessons/{id}")
}

pub fn feedback_posts() -> &'static str {
    "feedbackPosts"
}

pub fn feedback_post(pid: &str) -> String {
    format!("feedbackPosts/{pid}")
}

pub fn feedback_comment(pid: &str, cid: &str) -> String {
    format!("feedbackPosts/{pid}/comments/{cid}")
}

pub fn feedback_reaction(pid: &str, uid: &str) -> String {
    format!("feedbackPosts/{pid}/reactions/{uid}")
}

pub fn notifications(uid: &str) -> String {
    format!("notifications/{uid}")
}

pub fn notification(uid: &str, id: &str) -> String {
    format!("notifications/{uid}/{id}")
}

pub fn services() -> &'static str {
    "publicSettings/services"
}

pub fn contact_info() -> &'static str {
    "publicSettings/contactInfo"
}

pub fn admin_settings() -> &'static str {
    "adminSettings"
}

pub fn sales() -> &'static str {
    "sales"
}

pub fn user_settings(uid: &str) -> String {
    format!("settings/{uid}")
}

pub fn backend_config(uid: &str) -> String {
    format!("settings/{uid}/firebaseConfig")
}

pub fn active_creator() -> &'static str {
    "metadata/activeCreator"
}

pub fn active_creator_uid() -> &'static str {
    "metadata/activeCreator/uid"
}

#[cfg(test)]
mod tests {
    use super::{affects, ancestors, generate_push_key, is_strict_descendant, join, normalize};

    #[test]
    fn normalize_trims_slashes_and_accepts_root() {
        assert_eq!(normalize("/students/u1/").expect("valid path"), "students/u1");
        assert_eq!(normalize("").expect("root"), "");
        assert_eq!(normalize(" / ").expect("root"), "");
    }

    #[test]
    fn normalize_rejects_empty_segments_and_forbidden_chars() {
        assert!(normalize("students//u1").is_err());
        assert!(normalize("students/u.1").is_err());
        assert!(normalize("lessons/$id").is_err());
    }

    #[test]
    fn underscore_keys_are_plain_segments() {
        assert_eq!(
            normalize("feedbackPosts/1700000000000_u1").expect("valid"),
            "feedbackPosts/1700000000000_u1"
        );
        assert!(!is_strict_descendant("lessons_x/a", "lessons"));
    }

    #[test]
    fn relation_helpers_follow_segment_boundaries() {
        assert!(is_strict_descendant("students/u1/progress", "students/u1"));
        assert!(!is_strict_descendant("students/u10", "students/u1"));
        assert!(is_strict_descendant("lessons", ""));
        assert!(affects("students/u1", "students/u1/progress"));
        assert!(affects("students/u1/progress", "students"));
        assert!(!affects("lessons/a", "lessons/b"));
    }

    #[test]
    fn ancestors_are_nearest_first() {
        assert_eq!(ancestors("a/b/c"), vec!["a/b", "a"]);
        assert!(ancestors("a").is_empty());
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b/c"), "a/b/c");
    }

    #[test]
    fn push_keys_are_unique_and_valid() {
        let first = generate_push_key();
        let second = generate_push_key();
        assert_ne!(first, second);
        assert!(normalize(&first).is_ok());
    }
}
