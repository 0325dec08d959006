use std::thread;

use thiserror::Error;
use tracing::info_span;

use crate::batch::{ApplyBatch, BatchResult, apply_batch, partition_by_file};
use crate::config::ApplyPolicy;
use crate::error::EditError;
use crate::file::{FileError, FileSyncAdapter, checksum_text, render_new};
use crate::lock::FileLocks;
use crate::operation::{ChangeOperation, FileLines};
use crate::report::Reporter;

/// Failure of one file's batch
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    File(#[from] FileError),
}

/// A batch that applied cleanly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub batch: BatchResult,
    /// Checksum of the file text before the batch
    pub original_checksum: String,
    /// Whether the result was handed to the adapter for persistence
    pub written: bool,
}

/// Result for one file
#[derive(Debug)]
pub struct FileOutcome {
    pub filename: String,
    pub result: Result<FileChange, SessionError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// A file to create from scratch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub filename: String,
    pub content: FileLines,
}

/// A file that was (or, in a dry run, could be) created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCreation {
    /// Checksum of the text written
    pub checksum: String,
    pub line_count: usize,
    pub written: bool,
}

/// Result of one file creation
#[derive(Debug)]
pub struct CreateOutcome {
    pub filename: String,
    pub result: Result<FileCreation, SessionError>,
}

/// Work requested in one edit request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    /// Files to create before any edit runs
    pub new_files: Vec<NewFile>,
    pub operations: Vec<ChangeOperation>,
}

/// Everything a session did for one plan
#[derive(Debug, Default)]
pub struct SessionReport {
    pub created: Vec<CreateOutcome>,
    pub edited: Vec<FileOutcome>,
}

impl SessionReport {
    pub fn is_success(&self) -> bool {
        self.created.iter().all(|c| c.result.is_ok())
            && self.edited.iter().all(FileOutcome::is_success)
    }
}

/// Applies operation lists to files through an adapter
///
/// Each file's batch holds that file's lock from read to write. Failures are
/// per file: one rejected batch leaves its file untouched and does not stop
/// the others.
pub struct EditSession<'a> {
    adapter: &'a dyn FileSyncAdapter,
    reporter: &'a dyn Reporter,
    locks: FileLocks,
    policy: ApplyPolicy,
    dry_run: bool,
}

impl<'a> EditSession<'a> {
    pub fn new(adapter: &'a dyn FileSyncAdapter, reporter: &'a dyn Reporter) -> Self {
        Self {
            adapter,
            reporter,
            locks: FileLocks::new(),
            policy: ApplyPolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: ApplyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Compute results without writing anything back
    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Apply one file's batch
    pub fn apply_batch(&self, batch: &ApplyBatch) -> Result<FileChange, SessionError> {
        let span = info_span!("batch", file = %batch.filename());
        let _entered = span.enter();
        let _guard = self.locks.lock(batch.filename());

        let result = self.read_apply_write(batch);
        if let Err(SessionError::File(error)) = &result {
            // Edit errors are already reported by the coordinator
            self.reporter
                .error(&format!("Failed to update {}: {}", batch.filename(), error));
        }
        result
    }

    fn read_apply_write(&self, batch: &ApplyBatch) -> Result<FileChange, SessionError> {
        let snapshot = self.adapter.read(batch.filename())?;
        let applied = apply_batch(&snapshot.lines, batch, self.policy, self.reporter)?;

        let written = !self.dry_run;
        if written {
            self.adapter.write(&snapshot, &applied.lines)?;
            self.reporter.info(&format!("Updated {}", batch.filename()));
        }

        Ok(FileChange {
            batch: applied,
            original_checksum: snapshot.checksum,
            written,
        })
    }

    /// Create one file
    ///
    /// An existing file is never replaced. In a dry run the adapter is only
    /// asked whether the file exists.
    pub fn create_file(&self, new_file: &NewFile) -> Result<FileCreation, SessionError> {
        let span = info_span!("create", file = %new_file.filename);
        let _entered = span.enter();
        let _guard = self.locks.lock(&new_file.filename);

        let result = self.create_unlocked(new_file);
        match &result {
            Ok(creation) if creation.written => self
                .reporter
                .info(&format!("Created new file: {}", new_file.filename)),
            Ok(_) => {}
            Err(error) => self
                .reporter
                .error(&format!("Failed to create {}: {}", new_file.filename, error)),
        }
        result
    }

    fn create_unlocked(&self, new_file: &NewFile) -> Result<FileCreation, SessionError> {
        let line_count = new_file.content.len();
        if !self.dry_run {
            let checksum = self.adapter.create(&new_file.filename, &new_file.content)?;
            return Ok(FileCreation {
                checksum,
                line_count,
                written: true,
            });
        }

        match self.adapter.read(&new_file.filename) {
            Ok(_) => Err(FileError::AlreadyExists(new_file.filename.clone()).into()),
            Err(FileError::NotFound(_)) => Ok(FileCreation {
                checksum: checksum_text(&render_new(&new_file.content)),
                line_count,
                written: false,
            }),
            Err(error) => Err(error.into()),
        }
    }

    /// Create the plan's new files, then apply its edits file by file
    ///
    /// Edits may target a file created by the same plan.
    pub fn apply_plan(&self, plan: EditPlan) -> SessionReport {
        let created = plan
            .new_files
            .iter()
            .map(|new_file| CreateOutcome {
                filename: new_file.filename.clone(),
                result: self.create_file(new_file),
            })
            .collect();

        SessionReport {
            created,
            edited: self.apply_all(plan.operations),
        }
    }

    /// Apply a flat operation list, one batch per file, in file order
    pub fn apply_all(&self, operations: Vec<ChangeOperation>) -> Vec<FileOutcome> {
        partition_by_file(operations)
            .iter()
            .map(|batch| FileOutcome {
                filename: batch.filename().to_string(),
                result: self.apply_batch(batch),
            })
            .collect()
    }

    /// Like [`EditSession::apply_all`], with each file on its own thread
    ///
    /// Outcomes keep file order; reporter messages from different files may
    /// interleave.
    pub fn apply_all_parallel(&self, operations: Vec<ChangeOperation>) -> Vec<FileOutcome> {
        let batches = partition_by_file(operations);

        thread::scope(|scope| {
            let handles: Vec<_> = batches
                .iter()
                .map(|batch| scope.spawn(move || self.apply_batch(batch)))
                .collect();

            batches
                .iter()
                .zip(handles)
                .map(|(batch, handle)| FileOutcome {
                    filename: batch.filename().to_string(),
                    result: handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload)),
                })
                .collect()
        })
    }
}
