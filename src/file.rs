use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::operation::FileLines;

/// Line terminator used by a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Newline {
    #[default]
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }

    /// Detect the terminator from the first line break in `content`
    pub fn detect(content: &str) -> Self {
        match content.find('\n') {
            Some(pos) if pos > 0 && content.as_bytes()[pos - 1] == b'\r' => Newline::CrLf,
            _ => Newline::Lf,
        }
    }
}

/// A file's content as read before mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Filename as given by the planner
    pub filename: String,
    /// Lines without terminators
    pub lines: FileLines,
    pub newline: Newline,
    /// Whether the text ended with a line terminator
    pub trailing_newline: bool,
    /// BLAKE3 hash of the raw text (hex-encoded)
    pub checksum: String,
}

impl FileSnapshot {
    /// Split raw text into lines, remembering how to put it back together
    pub fn from_text(filename: impl Into<String>, text: &str) -> Self {
        let newline = Newline::detect(text);
        let trailing_newline = text.ends_with('\n');
        let lines = text
            .lines()
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();

        Self {
            filename: filename.into(),
            lines,
            newline,
            trailing_newline,
            checksum: checksum_text(text),
        }
    }

    /// Join `lines` using this snapshot's newline convention
    pub fn render(&self, lines: &[String]) -> String {
        let mut text = lines.join(self.newline.as_str());
        if self.trailing_newline && !lines.is_empty() {
            text.push_str(self.newline.as_str());
        }
        text
    }
}

/// Compute the BLAKE3 checksum (hex-encoded) of raw text
pub fn checksum_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Error types for file operations
#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Invalid UTF-8 in file: {0}")]
    InvalidUtf8(String),
    #[error("File already exists: {0}")]
    AlreadyExists(String),
    #[error("{path} changed on disk since it was read (expected {expected}, found {actual})")]
    Modified {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("I/O error while trying to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Reads files before a batch and writes the result back
///
/// Implementations own line-ending conventions and any backup behaviour.
/// The engine only ever sees [`FileLines`].
pub trait FileSyncAdapter: Send + Sync {
    /// Read the current content of `filename`
    fn read(&self, filename: &str) -> Result<FileSnapshot, FileError>;

    /// Persist `lines` as the new content of the file `snapshot` was read from
    fn write(&self, snapshot: &FileSnapshot, lines: &[String]) -> Result<(), FileError>;

    /// Create `filename` with `lines`, refusing to replace an existing file
    ///
    /// # Returns
    /// * `Ok(String)` - BLAKE3 checksum of the text written
    /// * `Err(FileError::AlreadyExists)` - Nothing was written
    fn create(&self, filename: &str, lines: &[String]) -> Result<String, FileError>;
}

/// Render lines for a file that has no previous convention to follow
pub fn render_new(lines: &[String]) -> String {
    let mut text = lines.join(Newline::Lf.as_str());
    if !lines.is_empty() {
        text.push_str(Newline::Lf.as_str());
    }
    text
}

/// Reads and writes files under a root directory
#[derive(Debug, Clone)]
pub struct FsAdapter {
    root: PathBuf,
    backup: bool,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backup: false,
        }
    }

    /// Copy each file to `<name>.bak` before overwriting it
    pub fn with_backup(mut self, enabled: bool) -> Self {
        self.backup = enabled;
        self
    }

    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }
}

fn io_error<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> FileError + 'a {
    move |source| FileError::Io {
        action,
        path: path.display().to_string(),
        source,
    }
}

/// Read a file from disk with UTF-8 validation
///
/// # Returns
/// * `Ok(String)` - File text
/// * `Err(FileError)` - File not found, I/O error, or invalid UTF-8
pub fn read_text(path: &Path) -> Result<String, FileError> {
    let bytes = fs::read(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            FileError::NotFound(path.display().to_string())
        } else {
            io_error("read", path)(err)
        }
    })?;

    String::from_utf8(bytes).map_err(|_| FileError::InvalidUtf8(path.display().to_string()))
}

/// Stage `text` in a temp file next to `path`
fn stage(path: &Path, text: &str) -> Result<NamedTempFile, FileError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(io_error("create temp file in", dir))?;
    temp.write_all(text.as_bytes())
        .map_err(io_error("write temp file for", path))?;
    temp.as_file()
        .sync_all()
        .map_err(io_error("sync temp file for", path))?;
    Ok(temp)
}

/// Replace `path` with `text` through a temp file in the same directory
fn write_atomic(path: &Path, text: &str) -> Result<(), FileError> {
    let permissions = fs::metadata(path).map(|m| m.permissions()).ok();

    let temp = stage(path, text)?;
    if let Some(permissions) = permissions {
        fs::set_permissions(temp.path(), permissions)
            .map_err(io_error("set permissions for", path))?;
    }
    temp.persist(path)
        .map_err(|err| io_error("replace", path)(err.error))?;
    Ok(())
}

/// Move staged `text` into place only if `path` does not exist yet
fn create_atomic(path: &Path, text: &str) -> Result<(), FileError> {
    let temp = stage(path, text)?;
    temp.persist_noclobber(path).map_err(|err| {
        if err.error.kind() == io::ErrorKind::AlreadyExists {
            FileError::AlreadyExists(path.display().to_string())
        } else {
            io_error("create", path)(err.error)
        }
    })?;
    Ok(())
}

impl FileSyncAdapter for FsAdapter {
    fn read(&self, filename: &str) -> Result<FileSnapshot, FileError> {
        let path = self.resolve(filename);
        let text = read_text(&path)?;
        let snapshot = FileSnapshot::from_text(filename, &text);
        debug!(path = %path.display(), lines = snapshot.lines.len(), "read file");
        Ok(snapshot)
    }

    fn write(&self, snapshot: &FileSnapshot, lines: &[String]) -> Result<(), FileError> {
        let path = self.resolve(&snapshot.filename);

        // Refuse to clobber edits made after the snapshot was taken
        let current = read_text(&path)?;
        let actual = checksum_text(&current);
        if actual != snapshot.checksum {
            return Err(FileError::Modified {
                path: path.display().to_string(),
                expected: snapshot.checksum.clone(),
                actual,
            });
        }

        if self.backup {
            let mut backup = path.clone().into_os_string();
            backup.push(".bak");
            fs::copy(&path, &backup).map_err(io_error("back up", &path))?;
        }

        write_atomic(&path, &snapshot.render(lines))?;
        debug!(path = %path.display(), lines = lines.len(), "wrote file");
        Ok(())
    }

    fn create(&self, filename: &str, lines: &[String]) -> Result<String, FileError> {
        let path = self.resolve(filename);
        if path.exists() {
            return Err(FileError::AlreadyExists(path.display().to_string()));
        }

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(io_error("create directory", dir))?;
                info!(dir = %dir.display(), "created directory");
            }
        }

        let text = render_new(lines);
        create_atomic(&path, &text)?;
        debug!(path = %path.display(), lines = lines.len(), "created file");
        Ok(checksum_text(&text))
    }
}

/// Keeps file text in memory, keyed by filename
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, filename: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.lock().insert(filename.into(), text.into());
        self
    }

    pub fn text(&self, filename: &str) -> Option<String> {
        self.files.lock().get(filename).cloned()
    }
}

impl FileSyncAdapter for MemoryAdapter {
    fn read(&self, filename: &str) -> Result<FileSnapshot, FileError> {
        let files = self.files.lock();
        let text = files
            .get(filename)
            .ok_or_else(|| FileError::NotFound(filename.to_string()))?;
        Ok(FileSnapshot::from_text(filename, text))
    }

    fn write(&self, snapshot: &FileSnapshot, lines: &[String]) -> Result<(), FileError> {
        let mut files = self.files.lock();
        let current = files
            .get(&snapshot.filename)
            .ok_or_else(|| FileError::NotFound(snapshot.filename.clone()))?;
        let actual = checksum_text(current);
        if actual != snapshot.checksum {
            return Err(FileError::Modified {
                path: snapshot.filename.clone(),
                expected: snapshot.checksum.clone(),
                actual,
            });
        }
        files.insert(snapshot.filename.clone(), snapshot.render(lines));
        Ok(())
    }

    fn create(&self, filename: &str, lines: &[String]) -> Result<String, FileError> {
        let mut files = self.files.lock();
        if files.contains_key(filename) {
            return Err(FileError::AlreadyExists(filename.to_string()));
        }
        let text = render_new(lines);
        let checksum = checksum_text(&text);
        files.insert(filename.to_string(), text);
        Ok(checksum)
    }
}
