//! Admin settings persistence and CSV exports.

use super::{iso_now, ActionError, ActionResult};
use crate::model::children;
use crate::model::settings::AdminSettings;
use crate::store::{path, DataStore};
use log::info;
use serde_json::Value;

/// Collections that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Students,
    Sales,
}

impl ExportKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "students" => Some(Self::Students),
            "sales" => Some(Self::Sales),
            _ => None,
        }
    }

    pub fn store_path(self) -> &'static str {
        match self {
            Self::Students => path::students(),
            Self::Sales => path::sales(),
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Students => "students.csv",
            Self::Sales => "sales.csv",
        }
    }
}

/// Replaces the whole settings record, stamping `updatedAt`.
pub fn save_settings(store: &dyn DataStore, settings: &AdminSettings) -> ActionResult<AdminSettings> {
    let mut saved = settings.clone();
    saved.updated_at = iso_now();
    let value = serde_json::to_value(&saved).map_err(crate::store::StoreError::from)?;
    store.write(path::admin_settings(), value)?;
    info!("event=admin_settings_save module=service status=ok");
    Ok(saved)
}

/// Exports a collection as CSV; `None` when it holds no records.
pub fn export_csv(store: &dyn DataStore, kind: ExportKind) -> ActionResult<Option<String>> {
    let snapshot = store.read(kind.store_path())?;
    let records: Vec<&Value> = children(snapshot.as_ref())
        .into_iter()
        .map(|(_, record)| record)
        .collect();
    let csv = records_to_csv(&records)?;
    if csv.is_some() {
        info!(
            "event=csv_export module=service status=ok rows={}",
            records.len()
        );
    }
    Ok(csv)
}

/// Header comes from the first record's keys; later records are projected
/// onto that header, with missing fields left blank.
pub fn records_to_csv(records: &[&Value]) -> ActionResult<Option<String>> {
    let Some(Value::Object(first)) = records.first() else {
        return Ok(None);
    };
    let header: Vec<String> = first.keys().cloned().collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;
    for record in records {
        let row: Vec<String> = header
            .iter()
            .map(|key| cell(record.get(key)))
            .collect();
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ActionError::Export(err.to_string()))?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|err| ActionError::Export(err.to_string()))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
