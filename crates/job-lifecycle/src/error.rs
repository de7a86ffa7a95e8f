//! Error types for the lifecycle core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Job '{job}' has no completion time, cannot clean it up")]
    MissingCompletionTime { job: String },

    #[error("Invalid status on pod '{pod}': {reason}")]
    InvalidPodStatus { pod: String, reason: String },

    #[error("{}", join_messages(.0))]
    Aggregate(Vec<Error>),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// True for a missing object, whether reported by an adapter or as an API 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube(kube::Error::Api(response)) => response.code == 404,
            _ => false,
        }
    }

    /// Collapses per-item failures of a batch into one error, or `Ok` when
    /// nothing failed.
    pub fn from_batch(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Aggregate(errors)),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
