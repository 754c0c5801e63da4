use std::{fmt, time::Duration};

use crate::api::{AuthorizationStatus, Problem};

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while talking to an ACME provider.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The account key is unusable. Raised before any request is made.
    #[error("account key rejected: {0}")]
    Key(String),

    /// The ACME server could not be reached, or the connection failed mid-request.
    #[error("request to ACME server failed")]
    Transport(#[from] reqwest::Error),

    /// The ACME server answered with a non-success status.
    #[error("ACME server responded with {status}: {problem}")]
    Protocol { status: u16, problem: Problem },

    /// A response body or header did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No nonce was pooled and fetching a fresh one failed.
    #[error("could not obtain a replay nonce")]
    Nonce(#[source] Box<Error>),

    /// No registered solver covers any challenge combination offered for the domain.
    #[error("no registered solver covers any challenge combination offered for {domain}")]
    NoSolver { domain: String },

    /// A solver failed to provision its validation artifact.
    #[error("solver failed for {domain}: {report}")]
    Solver { domain: String, report: eyre::Report },

    /// The server decided an authorization against us.
    #[error("authorization for {domain} ended as {status:?}{}", fmt_problem(.problem))]
    AuthorizationInvalid {
        domain: String,
        status: AuthorizationStatus,
        problem: Option<Problem>,
    },

    /// One or more identifiers of an order could not be authorized.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// A poll loop ran out of its wait budget.
    #[error("gave up waiting for {resource} after {waited:?}")]
    Timeout { resource: String, waited: Duration },

    /// The order could not be created or progressed.
    #[error("order failed: {0}")]
    Order(String),

    /// The server moved the order to `invalid`.
    #[error("order is invalid{}", fmt_problem(.0))]
    OrderInvalid(Option<Problem>),

    /// Certificate download attempted without a finalized order.
    #[error("certificate download failed: {0}")]
    Download(String),

    /// A request payload could not be serialized.
    #[error("could not encode request payload")]
    Encode(#[from] serde_json::Error),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the server's problem document, if this error carries one.
    pub fn problem(&self) -> Option<&Problem> {
        match self {
            Error::Protocol { problem, .. } => Some(problem),
            Error::AuthorizationInvalid { problem, .. } | Error::OrderInvalid(problem) => {
                problem.as_ref()
            }
            _ => None,
        }
    }
}

fn fmt_problem(problem: &Option<Problem>) -> String {
    match problem {
        Some(problem) => format!(": {problem}"),
        None => String::new(),
    }
}

/// A single identifier that failed to authorize, and why.
#[derive(Debug)]
pub struct DomainFailure {
    pub domain: String,
    pub error: Error,
}

/// Aggregate of every identifier in an order that failed to authorize.
#[derive(Debug)]
pub struct AuthorizationError {
    failures: Vec<DomainFailure>,
}

impl AuthorizationError {
    pub(crate) fn new(failures: Vec<DomainFailure>) -> Self {
        Self { failures }
    }

    /// Failures, in the order the authorizations appear on the order.
    pub fn failures(&self) -> &[DomainFailure] {
        &self.failures
    }

    /// Names of the failed domains.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|failure| failure.domain.as_str())
    }

    /// Returns the failure recorded for `domain`, if any.
    pub fn get(&self, domain: &str) -> Option<&Error> {
        self.failures
            .iter()
            .find(|failure| failure.domain == domain)
            .map(|failure| &failure.error)
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authorization failed for {} domain(s)", self.failures.len())?;

        for failure in &self.failures {
            write!(f, "; {}: {}", failure.domain, failure.error)?;
        }

        Ok(())
    }
}

impl std::error::Error for AuthorizationError {}
