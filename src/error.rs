//! Error types for catalog loading and string lookup.
//!
//! Load-time failures ([`CatalogError`]) are fatal to the one catalog being
//! loaded. Lookup-time conditions ([`LookupError`]) are only surfaced by the
//! strict APIs; the lenient paths log them and fall back to source text.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce a [`Catalog`](crate::Catalog) from serialized input.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed markup or a document that does not follow the TS layout.
    ///
    /// `line` and `column` are 1-based.
    #[error("catalog parse error at {line}:{column}: {message}")]
    Parse {
        line: u64,
        column: u64,
        message: String,
    },

    /// A plural message carries a different number of forms than the
    /// declared language's plural rule expects.
    #[error(
        "plural rule mismatch in context '{context}' for '{source_text}': \
         language '{language}' expects {expected} forms, found {found}"
    )]
    PluralRuleMismatch {
        language: String,
        context: String,
        source_text: String,
        expected: usize,
        found: usize,
    },

    /// Two live messages share the same (source, disambiguation) key.
    #[error("duplicate message '{source_text}' in context '{context}'")]
    DuplicateMessage {
        context: String,
        source_text: String,
    },

    /// Two contexts share the same name.
    #[error("duplicate context '{0}'")]
    DuplicateContext(String),

    #[error("failed to read catalog '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No catalog file exists for the requested language.
    #[error("no catalog found for language '{0}'")]
    NotFound(String),

    #[error("failed to write catalog: {0}")]
    Write(String),

    #[error("invalid translator configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Conditions raised while resolving a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("plural count must not be negative, got {0}")]
    InvalidPluralCount(i64),

    /// A `%N` marker refers to an argument the caller did not supply.
    #[error("placeholder %{index} has no argument ({supplied} supplied)")]
    MissingArgument { index: usize, supplied: usize },
}
