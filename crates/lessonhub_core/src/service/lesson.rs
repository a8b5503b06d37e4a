//! Lesson authoring and completion tracking.

use super::validation::{required, validate_attachment, Attachment, MediaRule};
use super::{iso_now, ActionError, ActionResult};
use crate::feed::create_notification;
use crate::model::lesson::{LessonRecord, LessonType};
use crate::model::notification::NotificationDraft;
use crate::model::session::{Role, Session};
use crate::model::student::{decode_students, COMPLETE};
use crate::model::now_millis;
use crate::store::{path, DataStore, StoreResult};
use log::{info, warn};
use serde_json::{json, Map, Value};

/// Lesson form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub title: String,
    pub description: String,
    pub url: String,
    /// Raw `type` select value.
    pub kind: String,
    pub attachment: Option<Attachment>,
}

impl LessonDraft {
    pub fn new(title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            url: String::new(),
            kind: kind.into(),
            attachment: None,
        }
    }

    /// Checks the form; returns the trimmed title and parsed type.
    pub fn validate(&self, max_attachment_bytes: u64) -> Result<(String, LessonType), ActionError> {
        let title = required("Title", &self.title)?.to_string();
        let kind = LessonType::parse(&self.kind).ok_or_else(|| {
            super::ValidationError::InvalidChoice {
                field: "lesson type",
                value: self.kind.clone(),
            }
        })?;
        if let Some(attachment) = &self.attachment {
            validate_attachment(attachment, MediaRule::ImageOrVideo, max_attachment_bytes)?;
        }
        Ok((title, kind))
    }
}

pub struct LessonService<S: DataStore> {
    store: S,
}

impl<S: DataStore> LessonService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self, id: &str) -> StoreResult<Option<LessonRecord>> {
        Ok(self
            .store
            .read(&path::lesson(id))?
            .filter(Value::is_object)
            .map(|record| LessonRecord::from_value(id, &record)))
    }

    /// Creates a lesson under an epoch-millisecond id and tells students.
    pub fn create(&self, author: &Session, draft: &LessonDraft, max_bytes: u64) -> ActionResult<String> {
        require_staff(author, "create lessons")?;
        let (title, kind) = draft.validate(max_bytes)?;

        let mut stamp = now_millis();
        while self.store.read(&path::lesson(&stamp.to_string()))?.is_some() {
            stamp += 1;
        }
        let id = stamp.to_string();

        let mut record = Map::new();
        record.insert("title".to_string(), json!(title));
        record.insert("description".to_string(), json!(draft.description.trim()));
        record.insert("url".to_string(), json!(draft.url.trim()));
        record.insert("type".to_string(), json!(kind.as_str()));
        record.insert("timestamp".to_string(), json!(iso_now()));
        if let Some(attachment) = &draft.attachment {
            record.insert("fileData".to_string(), json!(attachment.data_url));
        }
        self.store.write(&path::lesson(&id), Value::Object(record))?;
        info!("event=lesson_create module=service status=ok type={}", kind.as_str());

        let draft = NotificationDraft::new("new-lesson", format!("New lesson posted: {title}"))
            .with_link(format!("#/lesson/{id}"));
        self.notify_students(&author.user_id, &draft);
        Ok(id)
    }

    /// Rewrites the editable fields; the attachment is kept unless replaced.
    pub fn update(&self, editor: &Session, id: &str, draft: &LessonDraft, max_bytes: u64) -> ActionResult<()> {
        require_staff(editor, "edit lessons")?;
        let (title, kind) = draft.validate(max_bytes)?;
        if self.load(id)?.is_none() {
            return Err(ActionError::NotFound("Lesson".to_string()));
        }
        let mut patch = Map::new();
        patch.insert("title".to_string(), json!(title));
        patch.insert("description".to_string(), json!(draft.description.trim()));
        patch.insert("url".to_string(), json!(draft.url.trim()));
        patch.insert("type".to_string(), json!(kind.as_str()));
        patch.insert("timestamp".to_string(), json!(iso_now()));
        if let Some(attachment) = &draft.attachment {
            patch.insert("fileData".to_string(), json!(attachment.data_url));
        }
        self.store.patch(&path::lesson(id), patch)?;
        info!("event=lesson_update module=service status=ok");
        Ok(())
    }

    pub fn delete(&self, editor: &Session, id: &str) -> ActionResult<()> {
        require_staff(editor, "delete lessons")?;
        self.store.delete(&path::lesson(id))?;
        info!("event=lesson_delete module=service status=ok");
        Ok(())
    }

    /// Moves a lesson to another board column.
    pub fn move_to(&self, editor: &Session, id: &str, kind: LessonType) -> ActionResult<()> {
        require_staff(editor, "move lessons")?;
        let mut patch = Map::new();
        patch.insert("type".to_string(), json!(kind.as_str()));
        self.store.patch(&path::lesson(id), patch)?;
        Ok(())
    }

    /// Records full progress for the lesson title and flags the lesson id.
    pub fn mark_complete(&self, uid: &str, lesson: &LessonRecord) -> ActionResult<()> {
        let mut batch = Map::new();
        batch.insert(
            format!("{}/{}", path::progress(uid), progress_key(&lesson.title)?),
            json!(COMPLETE as u32),
        );
        batch.insert(
            format!("{}/{}", path::completed_lessons(uid), lesson.id),
            json!(true),
        );
        self.store.patch("", batch)?;
        info!("event=lesson_complete module=service status=ok");
        Ok(())
    }

    /// Patches `type = unclassified` onto every lesson missing a known type.
    ///
    /// Returns how many lessons were patched; nothing is written when all
    /// lessons are already typed.
    pub fn normalize_missing_types(&self, lessons: &[LessonRecord]) -> StoreResult<usize> {
        let mut batch = Map::new();
        for lesson in lessons.iter().filter(|lesson| lesson.kind.is_none()) {
            batch.insert(
                format!("{}/type", path::lesson(&lesson.id)),
                json!(LessonType::Unclassified.as_str()),
            );
        }
        let patched = batch.len();
        if patched > 0 {
            self.store.patch("", batch)?;
            info!("event=lesson_normalize module=service status=ok patched={patched}");
        }
        Ok(patched)
    }

    fn notify_students(&self, author_uid: &str, draft: &NotificationDraft) {
        let students = match self.store.read(path::students()) {
            Ok(snapshot) => decode_students(snapshot.as_ref()),
            Err(_) => {
                warn!("event=lesson_notify module=service status=error error_kind=read");
                return;
            }
        };
        for student in students
            .iter()
            .filter(|student| student.role == Role::Student && student.uid != author_uid)
        {
            if create_notification(&self.store, &student.uid, draft).is_err() {
                warn!("event=lesson_notify module=service status=error error_kind=write");
            }
        }
    }
}

/// Progress keys are lesson titles; a title cannot contain a path separator.
fn progress_key(title: &str) -> ActionResult<&str> {
    let title = title.trim();
    if title.is_empty() || title.contains('/') {
        return Err(ActionError::Validation(super::ValidationError::InvalidChoice {
            field: "lesson title",
            value: title.to_string(),
        }));
    }
    Ok(title)
}

pub(crate) fn require_staff(session: &Session, action: &'static str) -> ActionResult<()> {
    if session.role.is_staff() {
        Ok(())
    } else {
        Err(ActionError::Forbidden(action))
    }
}
