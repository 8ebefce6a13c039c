use std::io;

use tarpc::client::RpcError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    /// The call did not complete within its budget.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The RPC layer or the service reported a failure.
    #[error("rpc failed: {0}")]
    Rpc(#[source] RpcError),

    /// Connecting or operator I/O failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Operator input could not be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A batch answer did not line up with its request.
    #[error("batch mismatch: sent {expected} requests, got {actual} responses")]
    BatchMismatch { expected: usize, actual: usize },
}

impl From<RpcError> for HarnessError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::DeadlineExceeded => HarnessError::DeadlineExceeded,
            other => HarnessError::Rpc(other),
        }
    }
}

impl HarnessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::DeadlineExceeded)
    }
}
