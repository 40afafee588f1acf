//! JSON backup and restore of both stores.
//!
//! An import is validated completely before either store is touched; a
//! rejected document leaves all existing state as it was.

use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::habit_store::HabitStore;
use crate::models::{Habit, Task};
use crate::task_store::TaskStore;

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Invalid backup file: missing `{0}`")]
    MissingField(&'static str),
    #[error("Invalid backup file: {0}")]
    Malformed(String),
    #[error("Invalid backup file: task `{0}` has inconsistent completion state")]
    InconsistentTask(String),
    #[error("Invalid backup file: duplicate id `{0}`")]
    DuplicateId(String),
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Failed to access backup file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Settings carried inside a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    /// Hours before done tasks are archived, negative for never
    pub auto_archive_delay: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_tasks: Option<Vec<Task>>,
    pub habits: Vec<Habit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<BackupSettings>,
}

impl BackupDocument {
    /// Capture the current state of both stores
    pub fn capture(
        tasks: &TaskStore,
        habits: &HabitStore,
        settings: Option<BackupSettings>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            version: BACKUP_FORMAT_VERSION.to_string(),
            timestamp,
            tasks: tasks.tasks().to_vec(),
            archived_tasks: Some(tasks.archived_tasks().to_vec()),
            habits: habits.habits().to_vec(),
            settings,
        }
    }

    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a backup.
    ///
    /// `version`, `tasks` and `habits` must be present and non-empty values;
    /// every task must be decodable and internally consistent.
    pub fn parse(json: &str) -> Result<Self, BackupError> {
        let mut root: Value = serde_json::from_str(json)?;
        let Some(object) = root.as_object_mut() else {
            return Err(BackupError::Malformed("top level is not an object".to_string()));
        };

        let version = match object.get("version") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) if n.as_f64().is_some_and(|v| v != 0.0) => n.to_string(),
            _ => return Err(BackupError::MissingField("version")),
        };
        for field in ["tasks", "habits"] {
            if object.get(field).is_none_or(Value::is_null) {
                return Err(BackupError::MissingField(field));
            }
        }
        object.insert("version".to_string(), Value::String(version));
        if !object.contains_key("timestamp") {
            object.insert("timestamp".to_string(), Value::from(0));
        }

        let document: BackupDocument = serde_json::from_value(root)
            .map_err(|e| BackupError::Malformed(e.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    fn validate(&self) -> Result<(), BackupError> {
        let mut seen = HashSet::new();
        let all_tasks = self
            .tasks
            .iter()
            .chain(self.archived_tasks.iter().flatten());
        for task in all_tasks {
            if !task.completion_consistent() {
                return Err(BackupError::InconsistentTask(task.id.clone()));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(BackupError::DuplicateId(task.id.clone()));
            }
        }

        let mut seen = HashSet::new();
        for habit in &self.habits {
            if !seen.insert(habit.id.as_str()) {
                return Err(BackupError::DuplicateId(habit.id.clone()));
            }
        }
        Ok(())
    }

    /// Replace both stores' contents with this document.
    ///
    /// Returns the carried settings so the caller can apply them.
    pub fn apply(
        self,
        tasks: &mut TaskStore,
        habits: &mut HabitStore,
    ) -> Option<BackupSettings> {
        let mut imported_habits = self.habits;
        for habit in &mut imported_habits {
            habit.logs.sort();
        }

        info!(
            "event=backup_import version={} tasks={} habits={}",
            self.version,
            self.tasks.len(),
            imported_habits.len()
        );
        tasks.replace_all(self.tasks, self.archived_tasks);
        habits.replace_all(imported_habits);
        self.settings
    }
}

/// Validate `json` and, only if valid, load it into the stores
pub fn import(
    json: &str,
    tasks: &mut TaskStore,
    habits: &mut HabitStore,
) -> Result<Option<BackupSettings>, BackupError> {
    match BackupDocument::parse(json) {
        Ok(document) => Ok(document.apply(tasks, habits)),
        Err(e) => {
            warn!("event=backup_import status=rejected error={}", e);
            Err(e)
        }
    }
}

pub fn import_file(
    path: &Path,
    tasks: &mut TaskStore,
    habits: &mut HabitStore,
) -> Result<Option<BackupSettings>, BackupError> {
    let json = fs::read_to_string(path)?;
    import(&json, tasks, habits)
}

pub fn export_file(path: &Path, document: &BackupDocument) -> Result<(), BackupError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, document.to_json()?)?;
    info!(
        "event=backup_export path={} tasks={} habits={}",
        path.display(),
        document.tasks.len(),
        document.habits.len()
    );
    Ok(())
}

/// `grid-backup-YYYY-MM-DD.json`
pub fn default_file_name(date: NaiveDate) -> String {
    format!("grid-backup-{}.json", date.format("%Y-%m-%d"))
}
