//! Operation types produced by the block parser.

use serde::Serialize;
use std::fmt;

/// What a file block asks the sandbox to do with its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// Write a new file.
    Create,
    /// Overwrite an existing file.
    Update,
    /// Remove the file (content is ignored).
    Delete,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A single validated file operation.
///
/// Produced by the parser per matched block and immutable afterwards.
/// `path` is guaranteed relative (no leading `/`), free of `..` segments,
/// and within the configured extension allow-list; `size` is the content
/// length in bytes (0 for deletes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOperation {
    /// What to do with the path.
    pub action: FileAction,
    /// Workspace-relative path, `/`-separated.
    pub path: String,
    /// Normalized file content (empty for deletes).
    pub content: String,
    /// Content length in bytes.
    pub size: usize,
}

/// A shell command extracted from a `terminal` block.
///
/// The command string is trimmed but otherwise passed through unmodified;
/// no sandboxing of the command content happens at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOperation {
    /// Shell command line to run inside the sandbox.
    pub command: String,
}

/// The validated outcome of one parse call.
///
/// Files and commands keep the order their blocks appeared in the source
/// text; duplicates are preserved here and resolved last-write-wins at
/// apply/projection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    /// File operations in source order.
    pub files: Vec<FileOperation>,
    /// Command operations in source order.
    pub commands: Vec<CommandOperation>,
    /// Total number of blocks matched, including terminal blocks.
    pub total_blocks: usize,
}

impl ParseResult {
    /// True when the parse matched no blocks at all.
    pub fn is_empty(&self) -> bool {
        self.total_blocks == 0
    }

    /// Paths touched by this result, in source order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_action_display() {
        assert_eq!(format!("{}", FileAction::Create), "create");
        assert_eq!(format!("{}", FileAction::Update), "update");
        assert_eq!(format!("{}", FileAction::Delete), "delete");
    }

    #[test]
    fn test_parse_result_empty() {
        let result = ParseResult::default();
        assert!(result.is_empty());
        assert_eq!(result.paths().count(), 0);
    }
}
