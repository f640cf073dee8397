//! Reconciliation projection - applied file set as a map and a tree.
//!
//! Consumers (file explorer, editor tabs) want two views of the same data:
//! a flat path-to-content map and a hierarchical tree. Both are derived
//! from the parser's operation list by replaying it in order, so duplicate
//! paths resolve last-write-wins and deletes drop earlier creates.

use crate::ops::{FileAction, FileOperation};
use serde::Serialize;
use std::collections::BTreeMap;

/// Both consumer views of one applied file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    /// Path to content, sorted by path.
    pub contents: BTreeMap<String, String>,
    /// Root of the hierarchical view; always a directory node.
    pub tree: TreeNode,
}

/// A node in the hierarchical view.
///
/// Children are keyed by name under each parent, so two projections of the
/// same file set are structurally identical regardless of the order the
/// operations arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    /// A folder with named children.
    Dir {
        /// Child nodes keyed by segment name.
        children: BTreeMap<String, TreeNode>,
    },
    /// A file leaf.
    File {
        /// Content size in bytes.
        size: usize,
        /// Best-effort language tag derived from the extension.
        language: &'static str,
    },
}

impl TreeNode {
    fn empty_dir() -> Self {
        Self::Dir {
            children: BTreeMap::new(),
        }
    }
}

/// Project an operation list into its consumer views.
///
/// Idempotent: projecting the same file set twice yields identical output.
pub fn project(files: &[FileOperation]) -> Projection {
    let mut contents: BTreeMap<String, String> = BTreeMap::new();
    for op in files {
        match op.action {
            FileAction::Create | FileAction::Update => {
                contents.insert(op.path.clone(), op.content.clone());
            }
            FileAction::Delete => {
                contents.remove(&op.path);
            }
        }
    }

    let mut children = BTreeMap::new();
    for (path, content) in &contents {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        insert_path(&mut children, &segments, content.len(), file_language(path));
    }

    Projection {
        contents,
        tree: TreeNode::Dir { children },
    }
}

fn insert_path(
    children: &mut BTreeMap<String, TreeNode>,
    segments: &[&str],
    size: usize,
    language: &'static str,
) {
    let [segment, rest @ ..] = segments else {
        return;
    };

    if rest.is_empty() {
        children.insert((*segment).to_string(), TreeNode::File { size, language });
        return;
    }

    let entry = children
        .entry((*segment).to_string())
        .or_insert_with(TreeNode::empty_dir);
    if matches!(entry, TreeNode::File { .. }) {
        *entry = TreeNode::empty_dir();
    }
    if let TreeNode::Dir { children } = entry {
        insert_path(children, rest, size, language);
    }
}

/// Best-effort language tag for a path, from its extension.
pub fn file_language(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "css" => "css",
        "scss" => "scss",
        "html" => "html",
        "json" => "json",
        "md" => "markdown",
        "py" => "python",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        _ => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::FileAction;

    fn create(path: &str, content: &str) -> FileOperation {
        FileOperation {
            action: FileAction::Create,
            path: path.to_string(),
            content: content.to_string(),
            size: content.len(),
        }
    }

    fn delete(path: &str) -> FileOperation {
        FileOperation {
            action: FileAction::Delete,
            path: path.to_string(),
            content: String::new(),
            size: 0,
        }
    }

    #[test]
    fn test_project_builds_nested_tree() {
        let ops = vec![
            create("src/main.tsx", "render()"),
            create("src/App.tsx", "component"),
            create("index.html", "<html></html>"),
        ];
        let projection = project(&ops);

        assert_eq!(projection.contents.len(), 3);
        let TreeNode::Dir { children } = &projection.tree else {
            panic!("root must be a directory");
        };
        assert!(children.contains_key("index.html"));
        let TreeNode::Dir { children: src } = &children["src"] else {
            panic!("src must be a directory");
        };
        assert_eq!(src.len(), 2);
        assert_eq!(
            src["main.tsx"],
            TreeNode::File {
                size: 8,
                language: "typescript"
            }
        );
    }

    #[test]
    fn test_project_is_order_independent() {
        let forward = vec![create("a/x.ts", "1"), create("b/y.css", "22")];
        let reversed = vec![create("b/y.css", "22"), create("a/x.ts", "1")];
        assert_eq!(project(&forward), project(&reversed));
    }

    #[test]
    fn test_project_is_idempotent() {
        let ops = vec![create("src/app.tsx", "x"), create("readme.md", "hello")];
        assert_eq!(project(&ops), project(&ops));
    }

    #[test]
    fn test_project_last_write_wins() {
        let ops = vec![create("a.ts", "first"), create("a.ts", "second")];
        let projection = project(&ops);
        assert_eq!(projection.contents["a.ts"], "second");
    }

    #[test]
    fn test_project_delete_removes_earlier_create() {
        let ops = vec![create("a.ts", "x"), create("b.ts", "y"), delete("a.ts")];
        let projection = project(&ops);
        assert!(!projection.contents.contains_key("a.ts"));
        assert!(projection.contents.contains_key("b.ts"));
    }

    #[test]
    fn test_project_delete_of_missing_path_is_noop() {
        let ops = vec![delete("ghost.ts"), create("a.ts", "x")];
        let projection = project(&ops);
        assert_eq!(projection.contents.len(), 1);
    }

    #[test]
    fn test_file_language_mapping() {
        assert_eq!(file_language("src/app.tsx"), "typescript");
        assert_eq!(file_language("main.js"), "javascript");
        assert_eq!(file_language("style.CSS"), "css");
        assert_eq!(file_language("notes.md"), "markdown");
        assert_eq!(file_language("Makefile"), "text");
    }

    #[test]
    fn test_tree_serializes_for_consumers() {
        let projection = project(&[create("src/a.ts", "x")]);
        let json = serde_json::to_value(&projection.tree).expect("should serialize");
        assert_eq!(json["kind"], "dir");
        assert_eq!(json["children"]["src"]["children"]["a.ts"]["language"], "typescript");
    }
}
