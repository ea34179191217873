use thiserror::Error;

/// Decode failures. Every variant names the file it happened in, plus a byte
/// offset or line number where one exists, so errors in referenced companion
/// files stay traceable to the right source.
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("{file}: malformed container: {reason}")]
    MalformedContainer { file: String, reason: String },

    #[error("{file}: read of {count} bytes at offset {offset} exceeds buffer length {length}")]
    OutOfBounds {
        file: String,
        offset: usize,
        count: usize,
        length: usize,
    },

    #[error("{file}: {element}: invalid reference into {pool}: {reason}")]
    InvalidReference {
        file: String,
        element: String,
        pool: &'static str,
        reason: String,
    },

    #[error("{file}: {path}: expected {expected}")]
    SchemaViolation {
        file: String,
        path: String,
        expected: String,
    },

    #[error("{file}:{line}: unrecognized directive '{directive}'")]
    UnrecognizedDirective {
        file: String,
        line: usize,
        directive: String,
    },

    #[error("{file}: unrecognized chunk tag {tag:#06x} at offset {offset}")]
    UnrecognizedChunk { file: String, tag: u16, offset: usize },

    #[error("{file}: the file is violating the expected format, because: {reason}")]
    FormatError { file: String, reason: String },
}

pub mod common;
pub mod document;
pub mod gltf;
pub mod obj;
pub mod tds;
