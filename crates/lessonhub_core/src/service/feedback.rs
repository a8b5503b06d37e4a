//! Feedback community posts, comments and reactions.
//!
//! # Invariants
//! - Post and comment ids are `<epoch-ms>_<uid>`.
//! - Only authors edit; authors and staff delete.
//! - One reaction per user per post; reacting again replaces it.

use super::validation::{validate_attachment, Attachment, MediaRule, ValidationError};
use super::{ActionError, ActionResult};
use crate::feed::create_notification;
use crate::model::feedback::{can_delete, can_edit, is_reaction, Comment, FeedbackPost};
use crate::model::notification::NotificationDraft;
use crate::model::session::Session;
use crate::model::{children, now_millis};
use crate::store::{path, DataStore, StoreResult};
use log::{info, warn};
use serde_json::{json, Map, Value};

pub struct FeedbackService<S: DataStore> {
    store: S,
}

impl<S: DataStore> FeedbackService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self, pid: &str) -> StoreResult<Option<FeedbackPost>> {
        Ok(self
            .store
            .read(&path::feedback_post(pid))?
            .filter(Value::is_object)
            .map(|record| FeedbackPost::from_value(pid, &record)))
    }

    /// Publishes a post and notifies every other user.
    pub fn post(
        &self,
        author: &Session,
        message: &str,
        image: Option<&Attachment>,
        max_bytes: u64,
    ) -> ActionResult<String> {
        let message = message.trim();
        if message.is_empty() && image.is_none() {
            return Err(ValidationError::Required("Message or image").into());
        }
        if let Some(image) = image {
            validate_attachment(image, MediaRule::ImageOnly, max_bytes)?;
        }

        let pid = format!("{}_{}", now_millis(), author.user_id);
        let mut record = Map::new();
        record.insert("uid".to_string(), json!(author.user_id));
        record.insert("name".to_string(), json!(author.display_name));
        record.insert("photo".to_string(), json!(author.avatar_url));
        record.insert("message".to_string(), json!(message));
        if let Some(image) = image {
            record.insert("imageData".to_string(), json!(image.data_url));
        }
        record.insert("timestamp".to_string(), json!(now_millis()));
        self.store.write(&path::feedback_post(&pid), Value::Object(record))?;
        info!("event=feedback_post module=service status=ok");

        let draft = NotificationDraft::new(
            "new-feedback",
            format!("{} posted new feedback.", author.display_name),
        )
        .with_link(format!("#/feedback/{pid}"));
        self.notify_everyone_but(&author.user_id, &draft);
        Ok(pid)
    }

    pub fn edit_post(&self, viewer: &Session, pid: &str, message: &str) -> ActionResult<()> {
        let post = self.require_post(pid)?;
        if !can_edit(&viewer.user_id, &post.uid) {
            return Err(ActionError::Forbidden("edit this post"));
        }
        let message = message.trim();
        if message.is_empty() && post.image_data.is_none() {
            return Err(ValidationError::Required("Message").into());
        }
        let mut patch = Map::new();
        patch.insert("message".to_string(), json!(message));
        self.store.patch(&path::feedback_post(pid), patch)?;
        Ok(())
    }

    pub fn delete_post(&self, viewer: &Session, pid: &str) -> ActionResult<()> {
        let post = self.require_post(pid)?;
        if !can_delete(viewer.role, &viewer.user_id, &post.uid) {
            return Err(ActionError::Forbidden("delete this post"));
        }
        self.store.delete(&path::feedback_post(pid))?;
        info!("event=feedback_delete module=service status=ok");
        Ok(())
    }

    /// Sets the viewer's reaction and tells the author.
    pub fn react(&self, viewer: &Session, pid: &str, emoji: &str) -> ActionResult<()> {
        if !is_reaction(emoji) {
            return Err(ValidationError::InvalidChoice {
                field: "reaction",
                value: emoji.to_string(),
            }
            .into());
        }
        let post = self.require_post(pid)?;
        self.store
            .write(&path::feedback_reaction(pid, &viewer.user_id), json!(emoji))?;
        if post.uid != viewer.user_id && !post.uid.is_empty() {
            let draft = NotificationDraft::new(
                "reaction",
                format!("{} reacted {emoji} to your post.", viewer.display_name),
            )
            .with_link(format!("#/feedback/{pid}"));
            self.notify(&post.uid, &draft);
        }
        Ok(())
    }

    /// Builds the comment a viewer is about to submit, without writing it.
    pub fn draft_comment(&self, viewer: &Session, text: &str) -> ActionResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Required("Comment").into());
        }
        let timestamp = now_millis();
        Ok(Comment {
            id: format!("{timestamp}_{}", viewer.user_id),
            uid: viewer.user_id.clone(),
            name: viewer.display_name.clone(),
            text: text.to_string(),
            timestamp,
            edited_at: None,
            pending: true,
        })
    }

    /// Writes a drafted comment and tells the post author.
    pub fn submit_comment(&self, pid: &str, comment: &Comment) -> ActionResult<()> {
        let record = json!({
            "uid": comment.uid,
            "name": comment.name,
            "text": comment.text,
            "timestamp": comment.timestamp,
        });
        self.store
            .write(&path::feedback_comment(pid, &comment.id), record)?;
        info!("event=feedback_comment module=service status=ok");

        let author = self
            .store
            .read(&format!("{}/uid", path::feedback_post(pid)))
            .ok()
            .flatten()
            .and_then(|uid| uid.as_str().map(str::to_string));
        if let Some(author) = author.filter(|author| *author != comment.uid) {
            let draft = NotificationDraft::new(
                "comment",
                format!("{} commented on your post.", comment.name),
            )
            .with_link(format!("#/feedback/{pid}"));
            self.notify(&author, &draft);
        }
        Ok(())
    }

    pub fn edit_comment(&self, viewer: &Session, pid: &str, cid: &str, text: &str) -> ActionResult<()> {
        let comment = self.require_comment(pid, cid)?;
        if !can_edit(&viewer.user_id, &comment.uid) {
            return Err(ActionError::Forbidden("edit this comment"));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Required("Comment").into());
        }
        let mut patch = Map::new();
        patch.insert("text".to_string(), json!(text));
        patch.insert("editedAt".to_string(), json!(now_millis()));
        self.store.patch(&path::feedback_comment(pid, cid), patch)?;
        Ok(())
    }

    pub fn delete_comment(&self, viewer: &Session, pid: &str, cid: &str) -> ActionResult<()> {
        let comment = self.require_comment(pid, cid)?;
        if !can_delete(viewer.role, &viewer.user_id, &comment.uid) {
            return Err(ActionError::Forbidden("delete this comment"));
        }
        self.store.delete(&path::feedback_comment(pid, cid))?;
        Ok(())
    }

    fn require_post(&self, pid: &str) -> ActionResult<FeedbackPost> {
        self.load(pid)?
            .ok_or_else(|| ActionError::NotFound("Post".to_string()))
    }

    fn require_comment(&self, pid: &str, cid: &str) -> ActionResult<Comment> {
        self.store
            .read(&path::feedback_comment(pid, cid))?
            .filter(Value::is_object)
            .map(|record| Comment::from_value(cid, &record))
            .ok_or_else(|| ActionError::NotFound("Comment".to_string()))
    }

    fn notify_everyone_but(&self, author_uid: &str, draft: &NotificationDraft) {
        let snapshot = match self.store.read(path::students()) {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!("event=feedback_notify module=service status=error error_kind=read");
                return;
            }
        };
        for (uid, _) in children(snapshot.as_ref()) {
            if uid != author_uid {
                self.notify(&uid, draft);
            }
        }
    }

    fn notify(&self, uid: &str, draft: &NotificationDraft) {
        if create_notification(&self.store, uid, draft).is_err() {
            warn!(
                "event=feedback_notify module=service status=error type={}",
                draft.kind
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FeedbackService;
    use crate::model::session::{Role, Session};
    use crate::service::{ActionError, Attachment, ValidationError};
    use crate::store::{DataStore, SqliteDataStore};
    use serde_json::json;

    fn session(uid: &str, role: Role) -> Session {
        Session {
            user_id: uid.to_string(),
            role,
            display_name: format!("User {uid}"),
            avatar_url: "https://i.imgur.com/knDbHOH.png".to_string(),
            email: format!("{uid}@example.test"),
        }
    }

    fn seeded() -> SqliteDataStore {
        let store = SqliteDataStore::open_in_memory().expect("store");
        store
            .write(
                "students",
                json!({"a": {"role": "student"}, "b": {"role": "student"}, "c": {"role": "admin"}}),
            )
            .expect("seed");
        store
    }

    #[test]
    fn posting_requires_content_and_notifies_others() {
        let store = seeded();
        let feedback = FeedbackService::new(&store);
        let author = session("a", Role::Student);

        assert!(matches!(
            feedback.post(&author, "   ", None, 1024),
            Err(ActionError::Validation(ValidationError::Required(_)))
        ));
        let big = Attachment::new("image/png", 2048, "data:image/png;base64,AA");
        assert!(matches!(
            feedback.post(&author, "", Some(&big), 1024),
            Err(ActionError::Validation(ValidationError::AttachmentTooLarge { .. }))
        ));

        let pid = feedback.post(&author, "Hello", None, 1024).expect("post");
        assert!(pid.ends_with("_a"));
        let post = feedback.load(&pid).expect("load").expect("exists");
        assert_eq!(post.message, "Hello");

        assert_eq!(store.read("notifications/a").expect("read"), None);
        for uid in ["b", "c"] {
            let inbox = store
                .read(&format!("notifications/{uid}"))
                .expect("read")
                .expect("notified");
            let record = inbox.as_object().and_then(|map| map.values().next()).cloned();
            let record = record.expect("one record");
            assert_eq!(record["type"], json!("new-feedback"));
            assert_eq!(record["message"], json!("User a posted new feedback."));
            assert_eq!(record["link"], json!(format!("#/feedback/{pid}")));
        }
    }

    #[test]
    fn only_authors_edit_and_staff_may_delete() {
        let store = seeded();
        let feedback = FeedbackService::new(&store);
        let pid = feedback
            .post(&session("a", Role::Student), "Hi", None, 1024)
            .expect("post");

        assert!(matches!(
            feedback.edit_post(&session("c", Role::Admin), &pid, "changed"),
            Err(ActionError::Forbidden(_))
        ));
        assert!(matches!(
            feedback.delete_post(&session("b", Role::Student), &pid),
            Err(ActionError::Forbidden(_))
        ));
        feedback
            .edit_post(&session("a", Role::Student), &pid, " edited ")
            .expect("edit");
        assert_eq!(feedback.load(&pid).expect("load").expect("post").message, "edited");
        feedback
            .delete_post(&session("c", Role::Admin), &pid)
            .expect("staff delete");
        assert!(feedback.load(&pid).expect("load").is_none());
    }

    #[test]
    fn reactions_are_one_per_user() {
        let store = seeded();
        let feedback = FeedbackService::new(&store);
        let pid = feedback
            .post(&session("a", Role::Student), "Hi", None, 1024)
            .expect("post");
        let reader = session("b", Role::Student);
        feedback.react(&reader, &pid, "👍").expect("react");
        feedback.react(&reader, &pid, "❤️").expect("react again");
        assert!(matches!(
            feedback.react(&reader, &pid, "🍕"),
            Err(ActionError::Validation(ValidationError::InvalidChoice { .. }))
        ));
        let post = feedback.load(&pid).expect("load").expect("post");
        let summary = post.reaction_summary();
        assert_eq!(summary.total, 1);
        assert_eq!(post.reaction_of("b"), Some("❤️"));
    }

    #[test]
    fn comments_are_drafted_then_written() {
        let store = seeded();
        let feedback = FeedbackService::new(&store);
        let pid = feedback
            .post(&session("a", Role::Student), "Hi", None, 1024)
            .expect("post");
        let commenter = session("b", Role::Student);
        let comment = feedback.draft_comment(&commenter, " nice ").expect("draft");
        assert!(comment.pending);
        assert!(comment.id.ends_with("_b"));
        feedback.submit_comment(&pid, &comment).expect("submit");

        let post = feedback.load(&pid).expect("load").expect("post");
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].text, "nice");
        assert!(!post.comments[0].pending);

        feedback
            .edit_comment(&commenter, &pid, &comment.id, "very nice")
            .expect("edit");
        let post = feedback.load(&pid).expect("load").expect("post");
        assert!(post.comments[0].edited_at.is_some());

        assert!(matches!(
            feedback.delete_comment(&session("a", Role::Student), &pid, &comment.id),
            Err(ActionError::Forbidden(_))
        ));
        feedback
            .delete_comment(&commenter, &pid, &comment.id)
            .expect("delete own");
        assert!(feedback.load(&pid).expect("load").expect("post").comments.is_empty());
    }
}
