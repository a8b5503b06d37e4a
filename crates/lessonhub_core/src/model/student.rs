//! Student profile records (`students/<uid>`).

use super::session::Role;
use super::{as_number, children, opt_text, text};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Progress value marking a lesson as complete.
pub const COMPLETE: f64 = 100.0;

/// One profile document. Every user, staff included, lives under `students`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRecord {
    pub uid: String,
    pub full_name: String,
    pub email: String,
    pub contact: String,
    pub country: String,
    pub role: Role,
    /// `photoURL`, or the uploaded `photo` data URL when present.
    pub photo: Option<String>,
    pub signup_date: String,
    pub remarks: String,
    pub device: String,
    /// Lesson title -> percent complete.
    pub progress: BTreeMap<String, f64>,
    /// Lesson ids flagged in `completedLessons`.
    pub completed_lessons: BTreeSet<String>,
}

impl StudentRecord {
    pub fn from_value(uid: &str, record: &Value) -> Self {
        Self {
            uid: uid.to_string(),
            full_name: text(record, "fullName"),
            email: text(record, "email"),
            contact: text(record, "contact"),
            country: text(record, "country"),
            role: Role::parse(&text(record, "role")),
            photo: opt_text(record, "photo").or_else(|| opt_text(record, "photoURL")),
            signup_date: text(record, "signupDate"),
            remarks: text(record, "remarks"),
            device: text(record, "device"),
            progress: progress_map(record.get("progress")),
            completed_lessons: completed_set(record.get("completedLessons")),
        }
    }

    /// Mean of all progress values; `0.0` without progress entries.
    pub fn mean_progress(&self) -> f64 {
        if self.progress.is_empty() {
            return 0.0;
        }
        self.progress.values().sum::<f64>() / self.progress.len() as f64
    }

    pub fn completed_count(&self) -> usize {
        self.progress
            .values()
            .filter(|value| **value == COMPLETE)
            .count()
    }

    /// Share of tracked lessons at 100%, as a rounded percentage.
    pub fn completion_rate(&self) -> u32 {
        if self.progress.is_empty() {
            return 0;
        }
        ((self.completed_count() as f64 / self.progress.len() as f64) * 100.0).round() as u32
    }

    /// Seeded demo accounts that analytics must skip.
    pub fn is_test_account(&self) -> bool {
        self.email.contains("testuser") || self.full_name.contains("Test")
    }

    /// Role as shown by the insight table: `creator_admin` or `student`.
    pub fn display_role(&self) -> &'static str {
        if self.role.is_staff() {
            "creator_admin"
        } else {
            "student"
        }
    }
}

/// Decodes the `students` collection, sorted by uid.
pub fn decode_students(snapshot: Option<&Value>) -> Vec<StudentRecord> {
    children(snapshot)
        .into_iter()
        .map(|(uid, record)| StudentRecord::from_value(&uid, record))
        .collect()
}

/// Decodes a `progress` map, ignoring non-numeric entries.
pub fn progress_map(snapshot: Option<&Value>) -> BTreeMap<String, f64> {
    children(snapshot)
        .into_iter()
        .filter_map(|(title, value)| as_number(value).map(|percent| (title, percent)))
        .collect()
}

/// Decodes a `completedLessons` map into the ids flagged complete.
pub fn completed_set(snapshot: Option<&Value>) -> BTreeSet<String> {
    children(snapshot)
        .into_iter()
        .filter(|(_, value)| is_truthy(value))
        .map(|(id, _)| id)
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(raw) => !raw.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_students, StudentRecord};
    use crate::model::session::Role;
    use serde_json::json;

    #[test]
    fn decoding_is_lenient() {
        let record = StudentRecord::from_value(
            "u1",
            &json!({
                "fullName": "Ana",
                "role": "creator",
                "progress": {"Intro": 100, "Basics": "50", "Broken": "x"},
                "completedLessons": {"170": true, "171": false},
                "photoURL": ""
            }),
        );
        assert_eq!(record.role, Role::Creator);
        assert_eq!(record.progress.len(), 2);
        assert_eq!(record.mean_progress(), 75.0);
        assert_eq!(record.completion_rate(), 50);
        assert!(record.completed_lessons.contains("170"));
        assert!(!record.completed_lessons.contains("171"));
        assert_eq!(record.photo, None);
        assert_eq!(record.display_role(), "creator_admin");
    }

    #[test]
    fn empty_progress_means_zero() {
        let record = StudentRecord::from_value("u1", &json!("not an object"));
        assert_eq!(record.mean_progress(), 0.0);
        assert_eq!(record.completion_rate(), 0);
        assert_eq!(record.role, Role::Student);
    }

    #[test]
    fn test_accounts_are_detected() {
        let students = decode_students(Some(&json!({
            "a": {"email": "testuser1@example.test"},
            "b": {"fullName": "Test Person"},
            "c": {"fullName": "Real Person", "email": "real@example.test"}
        })));
        let flagged: Vec<bool> = students.iter().map(StudentRecord::is_test_account).collect();
        assert_eq!(flagged, vec![true, true, false]);
    }
}
