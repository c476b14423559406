//! Error types for crash parsing and the debug session.
//!
//! Parse-time failures ([`CrashError`]) abort a whole launch. Session
//! failures ([`SessionError`]) are local to one request unless they wrap a
//! parse failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while turning crash text into a [`CrashInfo`](crate::parser::CrashInfo).
///
/// Every variant is fatal for the parse: no partial result is ever produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrashError {
    /// The line's leading whitespace does not describe a valid tree position.
    ///
    /// `line` is 1-based over the non-blank lines handed to the builder.
    #[error("Malformed indentation on line {line}: {reason}")]
    MalformedIndentation { line: usize, reason: String },

    /// A top-level line is not a heading, or names a heading this format
    /// does not know.
    #[error("Unknown crash section: {0}")]
    UnknownCrashSection(String),

    /// A stack line did not match the format's frame grammar.
    #[error("Unrecognized stack frame: {0}")]
    UnrecognizedFrameSyntax(String),

    /// The first stack frame is missing or its path cannot anchor the addon root.
    #[error("Malformed stack header: {0}")]
    MalformedStackHeader(String),

    /// A local variable's value is none of the known value kinds.
    #[error("Unrecognized value for `{name}`: {value}")]
    UnrecognizedValueSyntax { name: String, value: String },

    /// The walk finished without an error message or without frames.
    #[error("Incomplete crash info: {0}")]
    IncompleteCrashInfo(String),
}

/// Failure answering a session request.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A request needed crash data before a successful `launch`.
    #[error("No crash has been loaded")]
    NotLaunched,

    /// The handle is unknown, stale, or points at nothing composite.
    #[error("Invalid variable reference: {0}")]
    InvalidVariableReference(i64),

    /// The `variables` filter is not `named`, `indexed` or unset.
    #[error("Unsupported variables filter: {0}")]
    UnsupportedFilter(String),

    /// A frame id outside the loaded stack.
    #[error("Unknown stack frame: {0}")]
    UnknownFrame(usize),

    /// The client went away before sending `configurationDone`.
    #[error("Configuration was never completed")]
    ConfigurationAborted,

    #[error("Failed to read crash file {}: {source}", .path.display())]
    ReadCrashFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] CrashError),
}
