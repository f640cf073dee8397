//! Error types for webuild-blocks.

use thiserror::Error;

/// Errors raised while parsing model output into operations.
///
/// A parse either succeeds completely or fails with the first error
/// encountered; no partial result is ever returned. `block_index` is the
/// zero-based order of appearance of the offending block in the source
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The `action` attribute is missing or not one of
    /// `create`, `update`, `delete`, `terminal`.
    #[error("block {block_index}: invalid action `{action}`")]
    InvalidAction {
        /// Zero-based block position.
        block_index: usize,
        /// The offending attribute value (`(none)` when absent).
        action: String,
    },

    /// A file block without the required `fileName` attribute.
    #[error("block {block_index}: fileName is required for file actions")]
    MissingFileName {
        /// Zero-based block position.
        block_index: usize,
    },

    /// A terminal block without a non-empty `command` attribute.
    #[error("block {block_index}: command is required for terminal actions")]
    MissingCommand {
        /// Zero-based block position.
        block_index: usize,
    },

    /// A create/update block whose content is empty after normalization.
    #[error("block {block_index}: `{file_name}` has no content")]
    EmptyContent {
        /// Zero-based block position.
        block_index: usize,
        /// The file the block targeted.
        file_name: String,
    },

    /// A path containing a `..` segment or starting with `/`.
    #[error("block {block_index}: invalid path `{file_name}`")]
    InvalidPath {
        /// Zero-based block position.
        block_index: usize,
        /// The rejected path.
        file_name: String,
    },

    /// A path whose extension is outside the allow-list.
    #[error("block {block_index}: extension of `{file_name}` is not allowed")]
    DisallowedExtension {
        /// Zero-based block position.
        block_index: usize,
        /// The rejected path.
        file_name: String,
    },

    /// File content over the configured byte ceiling.
    #[error("block {block_index}: `{file_name}` is {size} bytes, limit is {limit}")]
    FileTooLarge {
        /// Zero-based block position.
        block_index: usize,
        /// The file the block targeted.
        file_name: String,
        /// Content size in bytes.
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// An opening tag with no matching closing tag.
    #[error("block {block_index}: missing closing tag")]
    UnterminatedBlock {
        /// Zero-based block position.
        block_index: usize,
    },

    /// Attribute syntax the scanner could not make sense of
    /// (unclosed quote, missing `=`, truncated tag).
    #[error("block {block_index}: malformed attributes")]
    MalformedAttributes {
        /// Zero-based block position.
        block_index: usize,
    },
}
