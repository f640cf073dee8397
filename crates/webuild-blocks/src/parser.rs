//! Block parser - validates scanned blocks into a [`ParseResult`].

use crate::error::ParseError;
use crate::ops::{CommandOperation, FileAction, FileOperation, ParseResult};
use crate::scanner::{self, RawBlock};
use std::path::Path;

/// Tag the original tooling emits; configurable for other prompts.
const DEFAULT_TAG: &str = "weBuild";

/// Per-file content ceiling (1 MiB).
/// Prevents a runaway generation from flooding the sandbox filesystem.
const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024;

/// Extensions a generated web project is allowed to touch.
const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "css", "scss", "html", "json", "md", "svg", "txt",
    "yml", "yaml", "toml", "ico",
];

/// Configuration for the block parser.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Tag name to scan for (default `weBuild`).
    pub tag: String,
    /// Maximum content size per file, in bytes.
    pub max_file_size: usize,
    /// Allowed file extensions; extensionless names always pass.
    pub allowed_extensions: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Parser for model output in the tagged block format.
///
/// Parsing is deterministic and side-effect-free: calling [`parse`] twice
/// on identical input yields structurally identical results, and a failed
/// parse never produces a partial [`ParseResult`].
///
/// [`parse`]: Parser::parse
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// Create a parser with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with explicit configuration.
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Get the configuration used by this parser.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse raw model output into an ordered, validated operation list.
    ///
    /// Files and commands come out in the order their blocks appear in the
    /// source text. Duplicate paths are preserved; last-write-wins is
    /// resolved by the consumer, not here.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] encountered; nothing is returned
    /// for the blocks that preceded it.
    pub fn parse(&self, raw: &str) -> Result<ParseResult, ParseError> {
        let blocks = scanner::scan(raw, &self.config.tag)?;

        let mut files = Vec::new();
        let mut commands = Vec::new();

        for block in &blocks {
            match block.attribute("action") {
                Some("create") => files.push(self.file_operation(FileAction::Create, block)?),
                Some("update") => files.push(self.file_operation(FileAction::Update, block)?),
                Some("delete") => files.push(self.file_operation(FileAction::Delete, block)?),
                Some("terminal") => {
                    let command = block
                        .attribute("command")
                        .map(str::trim)
                        .filter(|command| !command.is_empty())
                        .ok_or(ParseError::MissingCommand {
                            block_index: block.index,
                        })?;
                    commands.push(CommandOperation {
                        command: command.to_string(),
                    });
                }
                other => {
                    return Err(ParseError::InvalidAction {
                        block_index: block.index,
                        action: other.unwrap_or("(none)").to_string(),
                    })
                }
            }
        }

        tracing::debug!(
            blocks = blocks.len(),
            files = files.len(),
            commands = commands.len(),
            "parsed model output"
        );

        Ok(ParseResult {
            files,
            commands,
            total_blocks: blocks.len(),
        })
    }

    fn file_operation(
        &self,
        action: FileAction,
        block: &RawBlock<'_>,
    ) -> Result<FileOperation, ParseError> {
        let block_index = block.index;
        let file_name = block
            .attribute("fileName")
            .ok_or(ParseError::MissingFileName { block_index })?;

        self.validate_path(file_name, block_index)?;

        // Delete blocks ignore content entirely.
        let content = if action == FileAction::Delete {
            String::new()
        } else {
            let normalized = normalize_content(block.content);
            if normalized.is_empty() {
                return Err(ParseError::EmptyContent {
                    block_index,
                    file_name: file_name.to_string(),
                });
            }
            if normalized.len() > self.config.max_file_size {
                return Err(ParseError::FileTooLarge {
                    block_index,
                    file_name: file_name.to_string(),
                    size: normalized.len(),
                    limit: self.config.max_file_size,
                });
            }
            normalized
        };

        let size = content.len();
        Ok(FileOperation {
            action,
            path: file_name.to_string(),
            content,
            size,
        })
    }

    fn validate_path(&self, path: &str, block_index: usize) -> Result<(), ParseError> {
        if path.is_empty()
            || path.starts_with('/')
            || path.split(['/', '\\']).any(|segment| segment == "..")
        {
            return Err(ParseError::InvalidPath {
                block_index,
                file_name: path.to_string(),
            });
        }

        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            let allowed = self
                .config
                .allowed_extensions
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ext));
            if !allowed {
                return Err(ParseError::DisallowedExtension {
                    block_index,
                    file_name: path.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Normalize block content: CRLF/CR to LF, then trim surrounding blank space.
fn normalize_content(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<ParseResult, ParseError> {
        Parser::new().parse(raw)
    }

    #[test]
    fn test_parse_create_and_terminal() {
        let raw = "<weBuild action=\"create\" fileName=\"app/page.tsx\">export default function Page() {}</weBuild>\
                   <weBuild action=\"terminal\" command=\"npm install\"></weBuild>";
        let result = parse(raw).expect("should parse");

        assert_eq!(result.total_blocks, 2);
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].action, FileAction::Create);
        assert_eq!(result.files[0].path, "app/page.tsx");
        assert_eq!(result.files[0].size, result.files[0].content.len());
        assert_eq!(result.commands.len(), 1);
        assert_eq!(result.commands[0].command, "npm install");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = "<weBuild action=\"create\" fileName=\"a.ts\">a</weBuild>\
                   <weBuild action=\"update\" fileName=\"b.css\">b {}</weBuild>\
                   <weBuild action=\"terminal\" command=\"npm run dev\"></weBuild>";
        let first = parse(raw).expect("should parse");
        let second = parse(raw).expect("should parse");
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_missing_file_name() {
        let raw = "<weBuild action=\"create\">content</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert_eq!(err, ParseError::MissingFileName { block_index: 0 });
    }

    #[test]
    fn test_parse_error_produces_no_partial_result() {
        // The first block is valid; the second is not. Nothing comes back.
        let raw = "<weBuild action=\"create\" fileName=\"a.ts\">a</weBuild>\
                   <weBuild action=\"create\">missing name</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert_eq!(err, ParseError::MissingFileName { block_index: 1 });
    }

    #[test]
    fn test_parse_invalid_action() {
        let raw = "<weBuild action=\"destroy\" fileName=\"a.ts\">x</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert_eq!(
            err,
            ParseError::InvalidAction {
                block_index: 0,
                action: "destroy".to_string()
            }
        );
    }

    #[test]
    fn test_parse_missing_action() {
        let raw = "<weBuild fileName=\"a.ts\">x</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert_eq!(
            err,
            ParseError::InvalidAction {
                block_index: 0,
                action: "(none)".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_parent_traversal() {
        let raw = "<weBuild action=\"create\" fileName=\"../../etc/passwd\">x</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert!(matches!(err, ParseError::InvalidPath { block_index: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_absolute_path() {
        let raw = "<weBuild action=\"create\" fileName=\"/etc/passwd\">x</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert!(matches!(err, ParseError::InvalidPath { .. }));
    }

    #[test]
    fn test_parse_rejects_backslash_traversal() {
        let raw = "<weBuild action=\"create\" fileName=\"..\\secrets.txt\">x</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert!(matches!(err, ParseError::InvalidPath { .. }));
    }

    #[test]
    fn test_parse_rejects_disallowed_extension() {
        let raw = "<weBuild action=\"create\" fileName=\"run.sh\">echo hi</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert!(matches!(err, ParseError::DisallowedExtension { .. }));
    }

    #[test]
    fn test_parse_allows_extensionless_file() {
        let raw = "<weBuild action=\"create\" fileName=\"LICENSE\">MIT</weBuild>";
        let result = parse(raw).expect("should parse");
        assert_eq!(result.files[0].path, "LICENSE");
    }

    #[test]
    fn test_parse_empty_content_rejected() {
        let raw = "<weBuild action=\"create\" fileName=\"a.ts\">\n\n   \n</weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert!(matches!(err, ParseError::EmptyContent { .. }));
    }

    #[test]
    fn test_parse_delete_ignores_content() {
        let raw = "<weBuild action=\"delete\" fileName=\"old.ts\"></weBuild>";
        let result = parse(raw).expect("should parse");
        assert_eq!(result.files[0].action, FileAction::Delete);
        assert_eq!(result.files[0].content, "");
        assert_eq!(result.files[0].size, 0);
    }

    #[test]
    fn test_parse_delete_requires_file_name() {
        let raw = "<weBuild action=\"delete\"></weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert_eq!(err, ParseError::MissingFileName { block_index: 0 });
    }

    #[test]
    fn test_parse_file_too_large() {
        let parser = Parser::with_config(ParserConfig {
            max_file_size: 8,
            ..ParserConfig::default()
        });
        let raw = "<weBuild action=\"create\" fileName=\"a.ts\">0123456789</weBuild>";
        let err = parser.parse(raw).expect_err("should fail");
        assert_eq!(
            err,
            ParseError::FileTooLarge {
                block_index: 0,
                file_name: "a.ts".to_string(),
                size: 10,
                limit: 8,
            }
        );
    }

    #[test]
    fn test_parse_terminal_missing_command() {
        let raw = "<weBuild action=\"terminal\"></weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert_eq!(err, ParseError::MissingCommand { block_index: 0 });
    }

    #[test]
    fn test_parse_terminal_blank_command_rejected() {
        let raw = "<weBuild action=\"terminal\" command=\"   \"></weBuild>";
        let err = parse(raw).expect_err("should fail");
        assert_eq!(err, ParseError::MissingCommand { block_index: 0 });
    }

    #[test]
    fn test_parse_normalizes_line_endings() {
        let raw = "<weBuild action=\"create\" fileName=\"a.ts\">\r\nlet a = 1;\r\nlet b = 2;\r\n</weBuild>";
        let result = parse(raw).expect("should parse");
        assert_eq!(result.files[0].content, "let a = 1;\nlet b = 2;");
    }

    #[test]
    fn test_parse_preserves_duplicate_paths_in_order() {
        let raw = "<weBuild action=\"create\" fileName=\"a.ts\">first</weBuild>\
                   <weBuild action=\"update\" fileName=\"a.ts\">second</weBuild>";
        let result = parse(raw).expect("should parse");
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.files[0].content, "first");
        assert_eq!(result.files[1].content, "second");
    }

    #[test]
    fn test_parse_no_blocks_is_empty_result() {
        let result = parse("just some chatter, no blocks").expect("should parse");
        assert!(result.is_empty());
    }
}
