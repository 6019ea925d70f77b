//! Error taxonomy of the processing engine.
//!
//! Every failure surfaced by [`Processor`](crate::Processor) carries a kind
//! that the HTTP layer maps onto a status code with [`Error::status_code`].

use std::fmt::Write as _;

use reqwest::StatusCode;
use thiserror::Error;

use crate::activity_pub::model::Iri;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The activity violates a protocol rule.
    #[error("not valid: {0}")]
    NotValid(String),
    /// The submitted item is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Also returned for activities from blocked senders, so the block itself
    /// is never confirmed to the sender.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// The store already holds an item with this id.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    /// Independent failures of one fan-out, joined.
    #[error("{context}: {}", format_failures(.failures))]
    Aggregate {
        context: String,
        failures: Vec<(Iri, Error)>,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_failures(failures: &[(Iri, Error)]) -> String {
    let mut out = String::new();
    for (idx, (target, error)) in failures.iter().enumerate() {
        if idx > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{target}: {error}");
    }
    out
}

impl Error {
    pub fn not_valid(msg: impl Into<String>) -> Error {
        Error::NotValid(msg.into())
    }
    pub fn bad_request(msg: impl Into<String>) -> Error {
        Error::BadRequest(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Error {
        Error::Unauthorized(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Error {
        Error::NotFound(msg.into())
    }
    pub fn not_implemented(msg: impl Into<String>) -> Error {
        Error::NotImplemented(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Error {
        Error::Conflict(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::DuplicateKey(_))
    }
    /// Errors the client can fix by correcting the request.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::NotValid(_) | Error::BadRequest(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotValid(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::Conflict(_) | Error::DuplicateKey(_) => StatusCode::CONFLICT,
            Error::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Aggregate { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Outcomes of one best-effort fan-out over several targets.
///
/// Every target is attempted; the aggregate error is derived afterwards.
#[derive(Debug, Default)]
pub struct FanOut {
    outcomes: Vec<(Iri, Result<()>)>,
}

impl FanOut {
    pub fn new() -> FanOut {
        FanOut::default()
    }
    pub fn record(&mut self, target: Iri, outcome: Result<()>) {
        self.outcomes.push((target, outcome));
    }
    pub fn extend(&mut self, other: FanOut) {
        self.outcomes.extend(other.outcomes);
    }
    pub fn outcomes(&self) -> &[(Iri, Result<()>)] {
        &self.outcomes
    }
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_err()).count()
    }
    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed()
    }
    pub fn into_result(self, context: impl Into<String>) -> Result<()> {
        let failures: Vec<_> = self
            .outcomes
            .into_iter()
            .filter_map(|(target, r)| r.err().map(|e| (target, e)))
            .collect();
        if failures.is_empty() {
            return Ok(());
        }
        Err(Error::Aggregate {
            context: context.into(),
            failures,
        })
    }
}
