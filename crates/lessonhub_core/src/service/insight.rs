//! Staff review of user records: role changes, remarks, removal.
//!
//! Changes are staged locally while the table is edited and written with
//! one patch per student on save.

use super::validation::ValidationError;
use super::ActionResult;
use crate::model::session::Role;
use crate::model::student::StudentRecord;
use crate::store::{path, DataStore};
use log::info;
use serde_json::{json, Map};
use std::collections::BTreeMap;

/// Role filter of the insight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsightFilter {
    #[default]
    All,
    Student,
    CreatorAdmin,
}

impl InsightFilter {
    pub const ALL: [InsightFilter; 3] = [Self::All, Self::Student, Self::CreatorAdmin];

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "student" => Self::Student,
            "creator_admin" => Self::CreatorAdmin,
            _ => Self::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Student => "student",
            Self::CreatorAdmin => "creator_admin",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All users",
            Self::Student => "Students",
            Self::CreatorAdmin => "Creators & admins",
        }
    }

    pub fn admits(self, student: &StudentRecord) -> bool {
        match self {
            Self::All => true,
            Self::Student => !student.role.is_staff(),
            Self::CreatorAdmin => student.role.is_staff(),
        }
    }
}

pub fn filter_students(students: &[StudentRecord], filter: InsightFilter) -> Vec<&StudentRecord> {
    students
        .iter()
        .filter(|student| filter.admits(student))
        .collect()
}

/// Pending edits for one student.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChange {
    pub role: Option<Role>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChanges {
    entries: BTreeMap<String, StagedChange>,
}

impl StagedChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a role picked from the table (`student` or `creator_admin`).
    pub fn stage_role(&mut self, uid: &str, display_role: &str) -> Result<(), ValidationError> {
        let role = match display_role.trim() {
            "student" => Role::Student,
            "creator_admin" => Role::Creator,
            other => {
                return Err(ValidationError::InvalidChoice {
                    field: "role",
                    value: other.to_string(),
                })
            }
        };
        self.entries.entry(uid.to_string()).or_default().role = Some(role);
        Ok(())
    }

    pub fn stage_remarks(&mut self, uid: &str, remarks: &str) {
        self.entries.entry(uid.to_string()).or_default().remarks = Some(remarks.trim().to_string());
    }

    pub fn get(&self, uid: &str) -> Option<&StagedChange> {
        self.entries.get(uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Writes one patch per staged student and clears what was written.
    ///
    /// Stops at the first failing write; entries not yet written stay staged.
    pub fn save(&mut self, store: &dyn DataStore) -> ActionResult<usize> {
        if self.entries.is_empty() {
            return Err(ValidationError::NothingToSave.into());
        }
        let uids: Vec<String> = self.entries.keys().cloned().collect();
        let mut saved = 0;
        for uid in uids {
            let Some(change) = self.entries.get(&uid) else {
                continue;
            };
            let mut patch = Map::new();
            if let Some(role) = change.role {
                patch.insert("role".to_string(), json!(role.as_str()));
            }
            if let Some(remarks) = &change.remarks {
                patch.insert("remarks".to_string(), json!(remarks));
            }
            if !patch.is_empty() {
                store.patch(&path::student(&uid), patch)?;
            }
            self.entries.remove(&uid);
            saved += 1;
        }
        info!("event=insight_save module=service status=ok saved={saved}");
        Ok(saved)
    }
}

/// Row values with staged edits applied, for display.
pub fn displayed_role(student: &StudentRecord, staged: Option<&StagedChange>) -> &'static str {
    match staged.and_then(|change| change.role) {
        Some(role) if role.is_staff() => "creator_admin",
        Some(_) => "student",
        None => student.display_role(),
    }
}

pub fn delete_student(store: &dyn DataStore, uid: &str) -> ActionResult<()> {
    store.delete(&path::student(uid))?;
    info!("event=insight_delete module=service status=ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{delete_student, displayed_role, filter_students, InsightFilter, StagedChanges};
    use crate::model::session::Role;
    use crate::model::student::{decode_students, StudentRecord};
    use crate::service::{ActionError, ValidationError};
    use crate::store::{DataStore, SqliteDataStore};
    use serde_json::json;

    #[test]
    fn filters_split_students_from_staff() {
        let students = decode_students(Some(&json!({
            "a": {"role": "student"},
            "b": {"role": "creator"},
            "c": {"role": "admin"},
            "d": {}
        })));
        let uids = |filter| -> Vec<String> {
            filter_students(&students, filter)
                .into_iter()
                .map(|student| student.uid.clone())
                .collect()
        };
        assert_eq!(uids(InsightFilter::Student), vec!["a", "d"]);
        assert_eq!(uids(InsightFilter::CreatorAdmin), vec!["b", "c"]);
        assert_eq!(uids(InsightFilter::All).len(), 4);
    }

    #[test]
    fn staged_changes_write_one_patch_per_student() {
        let store = SqliteDataStore::open_in_memory().expect("store");
        store
            .write("students", json!({"a": {"role": "student", "fullName": "A"}, "b": {"role": "student"}}))
            .expect("seed");

        let mut staged = StagedChanges::new();
        assert!(matches!(
            staged.save(&store),
            Err(ActionError::Validation(ValidationError::NothingToSave))
        ));
        assert!(staged.stage_role("a", "superuser").is_err());
        staged.stage_role("a", "creator_admin").expect("stage");
        staged.stage_remarks("a", " promising ");
        staged.stage_remarks("b", "needs help");
        assert_eq!(
            displayed_role(&StudentRecord::default(), staged.get("a")),
            "creator_admin"
        );

        assert_eq!(staged.save(&store).expect("save"), 2);
        assert!(staged.is_empty());
        assert_eq!(
            store.read("students/a").expect("read"),
            Some(json!({"role": "creator", "fullName": "A", "remarks": "promising"}))
        );
        assert_eq!(store.read("students/b/role").expect("read"), Some(json!("student")));
        assert_eq!(Role::parse("creator"), Role::Creator);

        delete_student(&store, "b").expect("delete");
        assert_eq!(store.read("students/b").expect("read"), None);
    }
}
