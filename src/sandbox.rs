//! Root-confined executor for parsed commands.

use crate::command::{self, ParsedCommand};
use log::{debug, info, warn};
use path_clean::PathClean;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs as tokio_fs;

pub const WRITE_SUCCESS_MARKER: &str = "✅ File written successfully";
pub const EMPTY_FILE_MARKER: &str = "✅ Empty file created";
pub const FOLDER_MARKER: &str = "✅ Folder created";
pub const UNSUPPORTED_MARKER: &str = "⚠️ Unsupported or unsafe command";
pub const FAILURE_MARKER: &str = "❌ Execution Failed";

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Path is empty")]
    EmptyPath,
    #[error("Absolute paths are not allowed: {0}")]
    AbsolutePath(String),
    #[error("Path escapes the storage root: {0}")]
    Escape(String),
    #[error("Failed to prepare storage root {path}: {source}")]
    Root {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Outcome of applying one [`ParsedCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl ExecutionResult {
    fn ok(path: PathBuf, marker: &str) -> Self {
        let message = format!("{}: {}", marker, path.display());
        Self {
            success: true,
            path: Some(path),
            message,
        }
    }

    fn failed(path: Option<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            path,
            message: format!("{}:\n{}", FAILURE_MARKER, error),
        }
    }

    fn unsupported(raw: &str) -> Self {
        Self {
            success: false,
            path: None,
            message: format!("{}: {}", UNSUPPORTED_MARKER, raw),
        }
    }
}

/// Owns the storage root. Every path handed to it is resolved inside the root
/// or rejected.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    root_name: String,
}

impl Sandbox {
    pub fn new(root: impl AsRef<Path>, root_name: impl Into<String>) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        let root_err = |source| SandboxError::Root {
            path: root.display().to_string(),
            source,
        };
        std::fs::create_dir_all(root).map_err(root_err)?;
        let root = root.canonicalize().map_err(root_err)?;
        info!("Storage root ready at {}", root.display());
        Ok(Self {
            root,
            root_name: root_name.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn parse(&self, raw: &str) -> ParsedCommand {
        command::parse(raw, &self.root_name)
    }

    /// Resolves a root-relative path to an absolute path inside the root.
    ///
    /// One leading storage-root segment is stripped first, so `server/a/b`
    /// and `a/b` resolve to the same place.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        let relative = command::strip_root_prefix(relative.trim(), &self.root_name);
        if relative.is_empty() {
            return Err(SandboxError::EmptyPath);
        }
        let candidate = Path::new(relative);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        {
            return Err(SandboxError::AbsolutePath(relative.to_string()));
        }

        let resolved = self.root.join(candidate).clean();
        if !resolved.starts_with(&self.root) {
            return Err(SandboxError::Escape(relative.to_string()));
        }

        // Lexical cleaning cannot see symlinks; check the deepest ancestor
        // that already exists. `symlink_metadata` also finds dangling links,
        // which then fail to canonicalize.
        let existing = resolved
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(&self.root);
        match existing.canonicalize() {
            Ok(real) if real.starts_with(&self.root) => Ok(resolved),
            _ => Err(SandboxError::Escape(relative.to_string())),
        }
    }

    pub async fn run(&self, raw: &str) -> ExecutionResult {
        let parsed = self.parse(raw);
        self.apply(&parsed).await
    }

    pub async fn apply(&self, parsed: &ParsedCommand) -> ExecutionResult {
        let (relative, marker) = match parsed {
            ParsedCommand::Unsupported { raw } => {
                warn!("Rejected unsupported command: {}", raw);
                return ExecutionResult::unsupported(raw);
            }
            ParsedCommand::WriteFile { path, .. } => (path, WRITE_SUCCESS_MARKER),
            ParsedCommand::CreateEmptyFile { path } => (path, EMPTY_FILE_MARKER),
            ParsedCommand::CreateDirectory { path } => (path, FOLDER_MARKER),
        };

        let path = match self.resolve(relative) {
            Ok(p) => p,
            Err(e) => {
                warn!("Path resolution failed for '{}': {}", relative, e);
                return ExecutionResult::failed(None, e);
            }
        };

        let outcome = match parsed {
            ParsedCommand::WriteFile { content, .. } => {
                info!("Writing to: {}", path.display());
                debug!("Content preview: {}", preview(content));
                write_file(&path, content.as_bytes()).await
            }
            ParsedCommand::CreateEmptyFile { .. } => {
                info!("Creating empty file: {}", path.display());
                write_file(&path, b"").await
            }
            _ => {
                info!("Creating folder: {}", path.display());
                tokio_fs::create_dir_all(&path).await
            }
        };

        match outcome {
            Ok(()) => ExecutionResult::ok(path, marker),
            Err(e) => {
                warn!("Command failed on '{}': {}", path.display(), e);
                ExecutionResult::failed(Some(path), e)
            }
        }
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio_fs::create_dir_all(parent).await?;
    }
    tokio_fs::write(path, contents).await
}

fn preview(content: &str) -> &str {
    match content.char_indices().nth(200) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
