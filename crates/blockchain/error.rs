use bytes::Bytes;
use hostevm_common::errors::{ChainIdError, MessageError};
use hostevm_storage::error::StoreError;
use hostevm_vm::{EvmError, tracers::TracerError};

use crate::{host::HostError, trace::TIMEOUT_REASON};

/// Coarse classification of a [`QueryError`], used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Internal,
    Execution,
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Resolution(String),
    #[error("{0}")]
    Evm(#[from] EvmError),
    #[error("execution reverted{}", revert_suffix(.reason))]
    Revert { reason: Option<String>, data: Bytes },
    #[error("gas required exceeds allowance ({0})")]
    GasAllowanceExceeded(u64),
    #[error("{0}")]
    VmError(String),
    #[error("{0}")]
    Timeout(String),
    #[error("Tracer error: {0}")]
    Tracer(String),
    #[error("{0}")]
    Internal(String),
    #[error("DB error: {0}")]
    Store(#[from] StoreError),
}

fn revert_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|reason| format!(": {reason}"))
        .unwrap_or_default()
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            QueryError::Evm(_)
            | QueryError::Revert { .. }
            | QueryError::GasAllowanceExceeded(_)
            | QueryError::VmError(_) => ErrorKind::Execution,
            QueryError::Timeout(_) => ErrorKind::Timeout,
            QueryError::Resolution(_)
            | QueryError::Tracer(_)
            | QueryError::Internal(_)
            | QueryError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<MessageError> for QueryError {
    fn from(err: MessageError) -> Self {
        QueryError::InvalidArgument(err.to_string())
    }
}

impl From<ChainIdError> for QueryError {
    fn from(err: ChainIdError) -> Self {
        QueryError::InvalidArgument(err.to_string())
    }
}

impl From<HostError> for QueryError {
    fn from(err: HostError) -> Self {
        QueryError::Resolution(err.0)
    }
}

impl From<TracerError> for QueryError {
    fn from(err: TracerError) -> Self {
        let message = err.to_string();
        match err {
            TracerError::Stopped(reason) if reason == TIMEOUT_REASON => QueryError::Timeout(reason),
            TracerError::InvalidConfig(_) => QueryError::InvalidArgument(message),
            TracerError::Unknown(_) => QueryError::Internal(message),
            _ => QueryError::Tracer(message),
        }
    }
}
