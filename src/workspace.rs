//! Client-side state: the virtual file tree, the activity log and the file
//! currently open in the editor.

use crate::agent::AgentEvent;
use crate::command::{self, ParsedCommand};
use crate::file_tree::{FileTreeError, FileTreeNode, VirtualFileTree};
use crate::models::FileEntry;
use crate::sandbox::WRITE_SUCCESS_MARKER;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    User,
    Ai,
    Command,
    Result,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub kind: LogKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root_name: String,
    tree: VirtualFileTree,
    log: Vec<LogEntry>,
    selected: Option<String>,
}

impl Workspace {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            tree: VirtualFileTree::new(),
            log: Vec::new(),
            selected: None,
        }
    }

    pub fn tree(&self) -> &VirtualFileTree {
        &self.tree
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn add_log(&mut self, kind: LogKind, content: impl Into<String>) {
        self.log.push(LogEntry {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    /// Rebuilds the tree from a `/api/files` listing. Returns how many
    /// entries were applied.
    pub fn apply_listing(&mut self, files: &[FileEntry]) -> usize {
        let mut applied = 0;
        for file in files {
            match self.tree.insert_or_update(&file.path, &file.content) {
                Ok(()) => applied += 1,
                Err(e) => warn!("Skipping listed file '{}': {}", file.path, e),
            }
        }
        debug!("Applied {} of {} listed files", applied, files.len());
        applied
    }

    /// Records a generation round in the activity log and replays every
    /// successful file write into the tree.
    pub fn apply_generation(&mut self, prompt: &str, events: &[AgentEvent]) {
        self.add_log(LogKind::User, prompt);
        for event in events {
            match event {
                AgentEvent::Command { command, result } => {
                    self.add_log(LogKind::Command, command.as_str());
                    self.add_log(LogKind::Result, result.as_str());
                    if result.starts_with(WRITE_SUCCESS_MARKER) {
                        self.replay_write(command);
                    }
                }
                AgentEvent::Text { text } => self.add_log(LogKind::Ai, text.as_str()),
                AgentEvent::Error { error } => {
                    self.add_log(LogKind::Result, format!("❌ Error: {}", error))
                }
                AgentEvent::StepLimit { message, .. } => {
                    self.add_log(LogKind::Result, format!("⚠️ {}", message))
                }
            }
        }
    }

    fn replay_write(&mut self, raw: &str) {
        let ParsedCommand::WriteFile { path, content } = command::parse(raw, &self.root_name) else {
            warn!("Write result did not come from a write command: {}", raw);
            return;
        };
        let Some(relative) = normalize_relative(&path) else {
            warn!("Not mirroring write outside the storage root: {}", path);
            return;
        };
        let full_path = format!("{}/{}", self.root_name, relative);
        if let Err(e) = self.tree.insert_or_update(&full_path, &content) {
            warn!("Could not mirror '{}': {}", full_path, e);
            return;
        }

        let mut folder = String::new();
        let segments: Vec<&str> = full_path.split('/').collect();
        for segment in &segments[..segments.len() - 1] {
            if !folder.is_empty() {
                folder.push('/');
            }
            folder.push_str(segment);
            self.tree.expand(&folder);
        }

        if self.selected.is_none() || full_path.ends_with(".html") {
            self.selected = Some(full_path);
        }
    }

    /// Applies an editor change to an open file.
    pub fn edit(&mut self, path: &str, content: &str) -> Result<(), FileTreeError> {
        self.tree.insert_or_update(path, content)
    }

    pub fn select(&mut self, path: &str) -> bool {
        if self.tree.lookup(path).is_some() {
            self.selected = Some(path.to_string());
            true
        } else {
            false
        }
    }

    /// Site folder containing the selected file, as `/api/publish` expects it.
    pub fn publish_folder(&self) -> Option<String> {
        let selected = self.selected.as_deref()?;
        let mut parts = selected.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let folder = if first == self.root_name {
            parts.next()?
        } else {
            first
        };
        Some(folder.to_string())
    }

    /// Indented listing of the tree; `▾` marks expanded folders.
    pub fn render_tree(&self) -> String {
        fn render(out: &mut String, tree: &VirtualFileTree, nodes: &[FileTreeNode], depth: usize) {
            for node in nodes {
                let indent = "  ".repeat(depth);
                match node {
                    FileTreeNode::Folder { name, path, children } => {
                        let marker = if tree.is_expanded(path) { '▾' } else { '▸' };
                        let _ = writeln!(out, "{}{} {}/", indent, marker, name);
                        render(out, tree, children, depth + 1);
                    }
                    FileTreeNode::File { name, content, .. } => {
                        let _ = writeln!(out, "{}  {} ({} bytes)", indent, name, content.len());
                    }
                }
            }
        }
        let mut out = String::new();
        render(&mut out, &self.tree, self.tree.roots(), 0);
        out
    }
}

/// Folds `.` and `..` segments the way the server cleans paths before
/// writing. `None` when nothing is left or the path climbs above the root.
fn normalize_relative(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Editor language id for a file, by extension.
pub fn language_for_path(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" => "html",
        "css" => "css",
        "js" => "javascript",
        "ts" => "typescript",
        "json" => "json",
        "md" => "markdown",
        _ => "plaintext",
    }
}
