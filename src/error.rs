use thiserror::Error;

use crate::merge::operator::OpFailureScope;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid internal key, undecodable wide-column entity, or a failure
    /// reported by the merge operator. When the merge operator is the
    /// source, `scope` carries the blast radius it reported.
    #[error("corruption: {reason}")]
    Corruption {
        reason: String,
        scope: Option<OpFailureScope>,
    },
    /// The shutdown signal tripped mid-scan. Partial accumulation has been
    /// discarded and must not be treated as valid output.
    #[error("shutdown in progress")]
    ShutdownInProgress,
    /// Belongs to the blob/read-ahead collaborator's asynchronous protocol.
    /// Never raised by this crate itself; collaborators may surface it
    /// through a merge call and callers own the retry.
    #[error("operation must be retried: {0}")]
    TryAgain(String),
    #[error("I/O operation error: {0}")]
    IO(#[from] std::io::Error),
}

impl Error {
    pub fn corruption(reason: impl Into<String>) -> Self {
        Error::Corruption {
            reason: reason.into(),
            scope: None,
        }
    }

    pub fn merge_operator_failed(scope: OpFailureScope) -> Self {
        Error::Corruption {
            reason: "merge operator failed to merge".to_owned(),
            scope: Some(scope),
        }
    }

    /// The failure scope reported by the merge operator, if this error
    /// originated there.
    pub fn op_failure_scope(&self) -> Option<OpFailureScope> {
        match self {
            Error::Corruption { scope, .. } => *scope,
            _ => None,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption { .. })
    }
}

pub type IResult<T> = std::result::Result<T, Error>;
