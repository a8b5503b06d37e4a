//! Lesson documents (`lessons/<id>`) and their board columns.

use super::student::COMPLETE;
use super::{children, text};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Board column / checklist category of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonType {
    Lesson,
    Scenario,
    Exam,
    AnswerKey,
    Unclassified,
}

impl LessonType {
    /// Columns in board order.
    pub const ALL: [LessonType; 5] = [
        Self::Lesson,
        Self::Scenario,
        Self::Exam,
        Self::AnswerKey,
        Self::Unclassified,
    ];

    /// Categories with a dashboard checklist panel.
    pub const CHECKLIST: [LessonType; 4] =
        [Self::Lesson, Self::Scenario, Self::Exam, Self::AnswerKey];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "lesson" => Some(Self::Lesson),
            "scenario" => Some(Self::Scenario),
            "exam" => Some(Self::Exam),
            "answer_key" => Some(Self::AnswerKey),
            "unclassified" => Some(Self::Unclassified),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Scenario => "scenario",
            Self::Exam => "exam",
            Self::AnswerKey => "answer_key",
            Self::Unclassified => "unclassified",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Lesson => "📘 Lessons",
            Self::Scenario => "📝 Practice Scenarios",
            Self::Exam => "🧪 Exams",
            Self::AnswerKey => "✅ Answer Keys",
            Self::Unclassified => "📂 Unclassified",
        }
    }
}

/// One lesson document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    /// Raw `type` value; `None` when missing or unrecognized.
    pub kind: Option<LessonType>,
    /// ISO-8601 creation/update stamp.
    pub timestamp: String,
    /// Inline attachment as a data URL.
    pub file_data: Option<String>,
}

impl LessonRecord {
    pub fn from_value(id: &str, record: &Value) -> Self {
        let file_data = match record.get("fileData").or_else(|| record.get("file")) {
            Some(Value::String(data)) if !data.is_empty() => Some(data.clone()),
            _ => None,
        };
        Self {
            id: id.to_string(),
            title: text(record, "title"),
            description: text(record, "description"),
            url: text(record, "url"),
            kind: LessonType::parse(&text(record, "type")),
            timestamp: text(record, "timestamp"),
            file_data,
        }
    }

    /// Title shown in lists; blank titles read as `Untitled`.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    pub fn column(&self) -> LessonType {
        self.kind.unwrap_or(LessonType::Unclassified)
    }

    pub fn attachment_is_image(&self) -> bool {
        self.file_data
            .as_deref()
            .is_some_and(|data| data.starts_with("data:image"))
    }
}

/// Decodes the `lessons` collection ordered by id (ids are epoch millis).
pub fn decode_lessons(snapshot: Option<&Value>) -> Vec<LessonRecord> {
    children(snapshot)
        .into_iter()
        .map(|(id, record)| LessonRecord::from_value(&id, record))
        .collect()
}

/// Completed lesson titles per checklist category.
///
/// Completion is keyed by title, so two lessons sharing a title but not a
/// type are both checked in their own panels.
pub fn group_completed_titles(
    lessons: &[LessonRecord],
    progress: &BTreeMap<String, f64>,
) -> BTreeMap<LessonType, Vec<String>> {
    let mut grouped: BTreeMap<LessonType, Vec<String>> = LessonType::CHECKLIST
        .iter()
        .map(|kind| (*kind, Vec::new()))
        .collect();
    for lesson in lessons {
        let Some(kind) = lesson.kind else {
            continue;
        };
        let done = progress
            .get(&lesson.title)
            .is_some_and(|percent| *percent == COMPLETE);
        if let (true, Some(titles)) = (done, grouped.get_mut(&kind)) {
            titles.push(lesson.title.clone());
        }
    }
    grouped
}
