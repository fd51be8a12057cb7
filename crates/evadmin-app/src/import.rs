// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Bulk user import from spreadsheet records.
//!
//! Rows are processed one at a time and in order. A bad row is recorded and
//! skipped; it never stops the rows after it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Map;

use crate::model::{User, UserInput};
use crate::validation::{FieldError, required};

pub const FIELD_FULL_NAME: &str = "full_name";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_POSITION: &str = "position";
pub const FIELD_AVATAR_RAW_URL: &str = "avatar_image_raw_url";

/// Spreadsheet header to user field, in template column order.
pub const USER_IMPORT_COLUMNS: [(&str, &str); 4] = [
    ("Họ và tên", FIELD_FULL_NAME),
    ("Email", FIELD_EMAIL),
    ("Chức vụ", FIELD_POSITION),
    ("Link ảnh", FIELD_AVATAR_RAW_URL),
];

pub const IMPORT_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// One data row of a sheet after header mapping. `row` is the 1-based row
/// number as shown by spreadsheet software.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedRecord {
    pub row: usize,
    pub fields: BTreeMap<String, String>,
}

impl MappedRecord {
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map_or("", String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportUserRow {
    pub full_name: String,
    pub email: String,
    pub position: String,
    pub avatar_raw_url: Option<String>,
}

impl ImportUserRow {
    pub fn from_record(record: &MappedRecord) -> Result<Self, FieldError> {
        let full_name = required("full name", record.get(FIELD_FULL_NAME))?;
        // Only presence is checked; the backend owns email format rules.
        let email = required("email", record.get(FIELD_EMAIL))?.to_lowercase();
        let avatar = record.get(FIELD_AVATAR_RAW_URL).trim();
        Ok(Self {
            full_name,
            email,
            position: record.get(FIELD_POSITION).trim().to_owned(),
            avatar_raw_url: (!avatar.is_empty()).then(|| avatar.to_owned()),
        })
    }

    fn into_input(self, avatar_image_url: String) -> UserInput {
        UserInput {
            full_name: self.full_name,
            email: self.email,
            position: self.position,
            avatar_image_url,
            metadata: Map::new(),
        }
    }
}

/// Where imported users go.
pub trait ImportTarget {
    /// Turns a shared-drive link into a hosted image URL.
    fn convert_avatar_url(&mut self, raw_url: &str) -> Result<String>;
    fn create_user(&mut self, input: &UserInput) -> Result<User>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProgress {
    pub index: usize,
    pub total: usize,
    pub step: String,
}

impl ImportProgress {
    pub fn percent(&self) -> u16 {
        if self.total == 0 {
            return 0;
        }
        u16::try_from(self.index * 100 / self.total).unwrap_or(100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRowWarning {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
    pub warnings: Vec<ImportRowWarning>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        let mut line = format!(
            "imported {} of {} users, {} failed",
            self.success, self.total, self.failed
        );
        if !self.warnings.is_empty() {
            line.push_str(&format!(", {} warnings", self.warnings.len()));
        }
        line
    }
}

pub fn run_user_import<T, F>(
    target: &mut T,
    records: &[MappedRecord],
    mut progress: F,
) -> Result<ImportReport>
where
    T: ImportTarget + ?Sized,
    F: FnMut(ImportProgress),
{
    if records.is_empty() {
        bail!("the file has no data rows -- fill in the template below its header row");
    }
    let total = records.len();
    let mut report = ImportReport {
        total,
        ..ImportReport::default()
    };

    for (index, record) in records.iter().enumerate() {
        let mut step = |text: String| {
            progress(ImportProgress {
                index,
                total,
                step: text,
            });
        };
        step(format!("row {}: validating", record.row));

        let parsed = match ImportUserRow::from_record(record) {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::debug!(row = record.row, %error, "import row rejected");
                report.errors.push(ImportRowError {
                    row: record.row,
                    error: error.to_string(),
                    data: record.fields.clone(),
                });
                continue;
            }
        };

        let mut avatar_image_url = String::new();
        if let Some(raw_url) = parsed.avatar_raw_url.as_deref() {
            step(format!("row {}: converting avatar", record.row));
            match target.convert_avatar_url(raw_url) {
                Ok(url) => avatar_image_url = url,
                Err(error) => {
                    tracing::warn!(row = record.row, error = %error, "avatar conversion failed");
                    report.warnings.push(ImportRowWarning {
                        row: record.row,
                        message: format!("avatar not imported: {error:#}"),
                    });
                }
            }
        }

        step(format!("row {}: creating {}", record.row, parsed.email));
        let input = parsed.into_input(avatar_image_url);
        match target.create_user(&input) {
            Ok(user) => {
                tracing::debug!(row = record.row, user = %user.id, "import row created");
                report.success += 1;
            }
            Err(error) => {
                tracing::debug!(row = record.row, error = %error, "import row failed");
                report.errors.push(ImportRowError {
                    row: record.row,
                    error: format!("{error:#}"),
                    data: record.fields.clone(),
                });
            }
        }
    }

    report.failed = report.errors.len();
    progress(ImportProgress {
        index: total,
        total,
        step: "done".to_owned(),
    });
    tracing::info!(
        total = report.total,
        success = report.success,
        failed = report.failed,
        "user import finished"
    );
    Ok(report)
}

pub fn validate_import_file_name(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) if IMPORT_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => bail!(
            "{} is not a spreadsheet -- choose an .xlsx or .xls file",
            path.display()
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportPhase {
    #[default]
    ChooseFile,
    Ready(PathBuf),
    Importing(ImportProgress),
    Finished(ImportReport),
    Failed(String),
}

/// Modal import dialog state. Closing is refused while rows are in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportDialog {
    pub phase: ImportPhase,
    pub path_input: String,
}

impl ImportDialog {
    pub fn is_importing(&self) -> bool {
        matches!(self.phase, ImportPhase::Importing(_))
    }

    pub fn can_close(&self) -> bool {
        !self.is_importing()
    }

    pub fn choose_file(&mut self, path: PathBuf) -> Result<()> {
        if self.is_importing() {
            bail!("an import is already running");
        }
        validate_import_file_name(&path)?;
        self.path_input = path.display().to_string();
        self.phase = ImportPhase::Ready(path);
        Ok(())
    }

    /// Moves to the importing phase and hands back the chosen file.
    pub fn start(&mut self) -> Result<PathBuf> {
        let ImportPhase::Ready(path) = &self.phase else {
            bail!("choose a file before importing");
        };
        let path = path.clone();
        self.phase = ImportPhase::Importing(ImportProgress {
            index: 0,
            total: 0,
            step: "reading file".to_owned(),
        });
        Ok(path)
    }

    pub fn progress(&mut self, progress: ImportProgress) {
        if self.is_importing() {
            self.phase = ImportPhase::Importing(progress);
        }
    }

    pub fn finish(&mut self, outcome: Result<ImportReport>) {
        self.phase = match outcome {
            Ok(report) => ImportPhase::Finished(report),
            Err(error) => ImportPhase::Failed(format!("{error:#}")),
        };
    }

    pub fn report(&self) -> Option<&ImportReport> {
        match &self.phase {
            ImportPhase::Finished(report) => Some(report),
            _ => None,
        }
    }

    /// Resets the dialog if closing is allowed; returns whether it closed.
    pub fn close(&mut self) -> bool {
        if !self.can_close() {
            return false;
        }
        *self = Self::default();
        true
    }
}
