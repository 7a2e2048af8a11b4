//! Errors surfaced by the public API. Failures inside the interpreter are
//! plain [ExecError](crate::core::ExecError) codes and only show up here once
//! a message as a whole has failed.

use thiserror::Error;

use crate::core::{ExecError, Status};

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    /// The token was already rolled back or discarded, or an older token was.
    #[error("snapshot token is stale")]
    Stale,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    #[error("line {line}: unknown instruction `{token}`")]
    UnknownInstruction { line: usize, token: String },
    #[error("line {line}: malformed immediate `{token}`")]
    BadImmediate { line: usize, token: String },
    #[error("line {line}: label `{label}` defined twice")]
    DuplicateLabel { line: usize, label: String },
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("program of {0} bytes does not fit a 16-bit offset")]
    TooLarge(usize),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("contract deployment ended with {status:?} ({reason:?})")]
    Deploy {
        status: Status,
        reason: Option<ExecError>,
    },
    #[error("malformed call argument `{0}`")]
    Arg(String),
    #[error("malformed configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
