use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EditError;
use crate::operation::{ChangeKind, ChangeOperation, FileLines, OperationRef, UnknownKind};
use crate::report::ReportEntry;
use crate::session::{CreateOutcome, EditPlan, FileOutcome, NewFile, SessionError, SessionReport};

/// Replacement content as sent by the planner
///
/// Either a list of lines or a single string. Strings are split on newlines
/// after decoding the `\n` and `\"` escapes planners tend to double-encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentJson {
    Lines(Vec<String>),
    Text(String),
}

impl ContentJson {
    pub fn into_lines(self) -> FileLines {
        match self {
            ContentJson::Lines(lines) => lines,
            ContentJson::Text(text) => {
                let decoded = text.replace("\\n", "\n").replace("\\\"", "\"");
                decoded.lines().map(str::to_string).collect()
            }
        }
    }
}

/// Operation named by a change record
///
/// NEW creates a file instead of editing one, so it stays out of
/// [`ChangeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RequestOperation {
    Edit(ChangeKind),
    New,
}

impl TryFrom<String> for RequestOperation {
    type Error = UnknownKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("NEW") {
            Ok(RequestOperation::New)
        } else {
            value.parse().map(RequestOperation::Edit)
        }
    }
}

impl From<RequestOperation> for String {
    fn from(operation: RequestOperation) -> Self {
        match operation {
            RequestOperation::Edit(kind) => kind.name().to_string(),
            RequestOperation::New => "NEW".to_string(),
        }
    }
}

/// One change record from the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeJson {
    pub operation: RequestOperation,
    pub filename: String,
    /// Absent for NEW
    #[serde(default)]
    pub start_line: usize,
    /// Defaults to `start_line`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(default, alias = "new_content", skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentJson>,
}

impl ChangeJson {
    fn into_operation(self, kind: ChangeKind) -> ChangeOperation {
        ChangeOperation {
            kind,
            filename: self.filename,
            start_line: self.start_line,
            end_line: self.end_line.unwrap_or(self.start_line),
            content: self.content.map(ContentJson::into_lines).unwrap_or_default(),
        }
    }
}

/// Request to apply a set of changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    /// Caller-chosen id, or `"auto"` to generate one
    #[serde(default = "auto_execution_id")]
    pub execution_id: String,
    pub changes: Vec<ChangeJson>,
}

fn auto_execution_id() -> String {
    "auto".to_string()
}

/// Errors parsing an [`EditRequest`]
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid edit request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("NEW change [{index}] for {filename} has no content")]
    MissingNewContent { index: usize, filename: String },
}

impl EditRequest {
    pub fn from_json(text: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The request's execution id, generating one when set to `"auto"`
    pub fn resolved_execution_id(&self) -> String {
        if self.execution_id == "auto" {
            generate_execution_id()
        } else {
            self.execution_id.clone()
        }
    }

    /// Split the request into files to create and edits to apply
    pub fn into_plan(self) -> Result<EditPlan, RequestError> {
        let mut plan = EditPlan::default();
        for (index, change) in self.changes.into_iter().enumerate() {
            match change.operation {
                RequestOperation::Edit(kind) => plan.operations.push(change.into_operation(kind)),
                RequestOperation::New => {
                    let Some(content) = change.content else {
                        return Err(RequestError::MissingNewContent {
                            index,
                            filename: change.filename,
                        });
                    };
                    plan.new_files.push(NewFile {
                        filename: change.filename,
                        content: content.into_lines(),
                    });
                }
            }
        }
        Ok(plan)
    }
}

/// Generate a fresh execution id
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Applied operation as reported back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResultJson {
    pub index: usize,
    pub operation: ChangeKind,
    pub start_line: usize,
    pub end_line: usize,
    pub line_shift: i64,
}

/// Per-file result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResultJson {
    pub filename: String,
    /// `"applied"`, `"created"`, `"checked"` (dry run) or `"rejected"`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_line_shift: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<OperationResultJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Batch indices of the operations the error is about
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_operations: Vec<usize>,
}

impl From<&OperationRef> for OperationResultJson {
    fn from(op: &OperationRef) -> Self {
        OperationResultJson {
            index: op.index.unwrap_or_default(),
            operation: op.kind,
            start_line: op.start_line,
            end_line: op.end_line,
            line_shift: 0,
        }
    }
}

fn failed_indices(error: &SessionError) -> Vec<usize> {
    match error {
        SessionError::Edit(EditError::ConflictingEdits { first, second }) => {
            [first.index, second.index].into_iter().flatten().collect()
        }
        SessionError::Edit(EditError::InvalidOperation { operation, .. }) => {
            operation.index.into_iter().collect()
        }
        SessionError::Edit(EditError::UnknownFilenameBatch { index, .. }) => vec![*index],
        SessionError::File(_) => Vec::new(),
    }
}

impl From<&CreateOutcome> for FileResultJson {
    fn from(outcome: &CreateOutcome) -> Self {
        let rejected = FileResultJson {
            filename: outcome.filename.clone(),
            status: "rejected".to_string(),
            original_checksum: None,
            final_checksum: None,
            total_line_shift: None,
            operations: Vec::new(),
            error: None,
            failed_operations: Vec::new(),
        };
        match &outcome.result {
            Ok(creation) => FileResultJson {
                status: if creation.written { "created" } else { "checked" }.to_string(),
                final_checksum: Some(creation.checksum.clone()),
                ..rejected
            },
            Err(error) => FileResultJson {
                error: Some(error.to_string()),
                ..rejected
            },
        }
    }
}

impl From<&FileOutcome> for FileResultJson {
    fn from(outcome: &FileOutcome) -> Self {
        match &outcome.result {
            Ok(change) => FileResultJson {
                filename: outcome.filename.clone(),
                status: if change.written { "applied" } else { "checked" }.to_string(),
                original_checksum: Some(change.original_checksum.clone()),
                final_checksum: Some(change.batch.final_checksum.clone()),
                total_line_shift: Some(change.batch.total_line_shift),
                operations: change
                    .batch
                    .operations
                    .iter()
                    .map(|result| OperationResultJson {
                        line_shift: result.line_shift,
                        ..OperationResultJson::from(&result.operation)
                    })
                    .collect(),
                error: None,
                failed_operations: Vec::new(),
            },
            Err(error) => FileResultJson {
                filename: outcome.filename.clone(),
                status: "rejected".to_string(),
                original_checksum: None,
                final_checksum: None,
                total_line_shift: None,
                operations: Vec::new(),
                error: Some(error.to_string()),
                failed_operations: failed_indices(error),
            },
        }
    }
}

/// Response describing what happened to every file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResponse {
    pub execution_id: String,
    /// True when every file's batch applied
    pub success: bool,
    pub files: Vec<FileResultJson>,
    pub applied_count: usize,
    #[serde(default)]
    pub created_count: usize,
    pub rejected_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ReportEntry>,
    /// Request-level failure, before any file was touched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EditResponse {
    pub fn from_report(
        execution_id: String,
        report: &SessionReport,
        messages: Vec<ReportEntry>,
    ) -> Self {
        let files: Vec<FileResultJson> = report
            .created
            .iter()
            .map(FileResultJson::from)
            .chain(report.edited.iter().map(FileResultJson::from))
            .collect();
        let rejected_count = files.iter().filter(|f| f.error.is_some()).count();
        let created_count = report.created.iter().filter(|c| c.result.is_ok()).count();
        let applied_count = files
            .iter()
            .map(|f| f.operations.len())
            .sum();

        Self {
            execution_id,
            success: rejected_count == 0,
            files,
            applied_count,
            created_count,
            rejected_count,
            messages,
            error: None,
        }
    }

    pub fn failure(execution_id: String, error: String) -> Self {
        Self {
            execution_id,
            success: false,
            files: Vec::new(),
            applied_count: 0,
            created_count: 0,
            rejected_count: 0,
            messages: Vec::new(),
            error: Some(error),
        }
    }
}
