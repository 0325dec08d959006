// Change operation model and validation
pub mod operation;

// Line ranges
pub mod range;

// Edit errors
pub mod error;

// Single-operation engine
pub mod engine;

// Batch ordering, conflict detection and application
pub mod batch;

// Progress reporting
pub mod report;

// File read/write boundary
pub mod file;

// Per-file batch serialisation
pub mod lock;

// Multi-file orchestration
pub mod session;

// JSON request/response module
pub mod json;

// Configuration and logging
pub mod config;
pub mod telemetry;

// Re-exports
pub use operation::{ChangeKind, ChangeOperation, FileLines, OperationRef, validate_operation};
pub use range::LineRange;
pub use error::{EditError, InvalidReason};
pub use engine::{EditResult, apply_operation, checksum_lines};
pub use batch::{
    ApplyBatch, BatchResult, PerOperationResult, apply_batch, detect_conflicts,
    partition_by_file, sort_operations_descending,
};
pub use report::{NullReporter, RecordingReporter, Reporter, TracingReporter};
pub use file::{FileError, FileSnapshot, FileSyncAdapter, FsAdapter, MemoryAdapter};
pub use lock::FileLocks;
pub use session::{
    CreateOutcome, EditPlan, EditSession, FileChange, FileCreation, FileOutcome, NewFile,
    SessionError, SessionReport,
};
pub use json::{EditRequest, EditResponse, RequestOperation, generate_execution_id};
pub use config::{ApplyPolicy, Config};
