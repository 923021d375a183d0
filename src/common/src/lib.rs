#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

use std::error::Error;
use std::fmt;
use std::io;

pub mod path;
pub use path::{Path, Segment};
pub mod property;
pub use property::{Location, Name, Property, Value};
pub mod plan;
pub mod problems;
pub use problems::Problems;
pub mod query;
pub mod schemata;
pub mod testutil;

/// Custom error type.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoError {
    /// IO Errors.
    IOError(String),
    /// Malformed or incomplete configuration.
    ConfigError(String),
    /// Validation errors.
    ValidationError(String),
    /// A path string that could not be parsed.
    InvalidPath(String),
    /// A projection rule string that could not be parsed.
    InvalidRule(String),
    /// No node exists at the path; `lowest_existing` is the closest ancestor that does.
    PathNotFound { path: Path, lowest_existing: Path },
    /// The workspace does not exist in the named source.
    InvalidWorkspace { workspace: String, source: String },
    /// A request that cannot be carried out against the target node.
    InvalidRequest(String),
    /// Failure reported by an underlying source connection.
    SourceError(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RepoError::ValidationError(s) => format!("Validation Error: {}", s),
                RepoError::ConfigError(s) => format!("Config Error: {}", s),
                RepoError::InvalidPath(s) => format!("Invalid Path: {}", s),
                RepoError::InvalidRule(s) => format!("Invalid Projection Rule: {}", s),
                RepoError::PathNotFound {
                    path,
                    lowest_existing,
                } => format!(
                    "Path Not Found: {} (lowest existing ancestor is {})",
                    path, lowest_existing
                ),
                RepoError::InvalidWorkspace { workspace, source } => format!(
                    "Invalid Workspace: '{}' does not exist in '{}'",
                    workspace, source
                ),
                RepoError::InvalidRequest(s) => format!("Invalid Request: {}", s),
                RepoError::SourceError(s) => format!("Source Error: {}", s),
                RepoError::IOError(s) => s.to_string(),
            }
        )
    }
}

// Implement std::convert::From for RepoError; from io::Error
impl From<io::Error> for RepoError {
    fn from(error: io::Error) -> Self {
        RepoError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(error: serde_json::Error) -> Self {
        RepoError::ConfigError(error.to_string())
    }
}

impl Error for RepoError {}
