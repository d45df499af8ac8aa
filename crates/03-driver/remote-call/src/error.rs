use thiserror::Error;

use crate::signature::{FunctionId, JobId};

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for function {0}")]
    UnknownFunction(FunctionId),

    #[error("function {0} registered twice")]
    DuplicateFunction(FunctionId),

    #[error("function id {0} exceeds the dispatch table limit")]
    FunctionIdTooLarge(FunctionId),

    #[error("function {id}: {reason}")]
    InvalidSignature { id: FunctionId, reason: String },

    #[error("function {function}: argument buffer holds {available} bytes, signature needs {needed}")]
    ArgumentUnderrun {
        function: FunctionId,
        needed: usize,
        available: usize,
    },

    #[error("function {function}: argument {index} does not match its slot ({reason})")]
    ArgumentMismatch {
        function: FunctionId,
        index: usize,
        reason: &'static str,
    },

    #[error("function {function}: handler returned {got} bytes, descriptor says {expected}")]
    ReturnMismatch {
        function: FunctionId,
        expected: usize,
        got: usize,
    },

    #[error("no argument buffer pending for job {0}")]
    MissingJob(JobId),

    #[error("unsupported pointer width {0}")]
    InvalidLayout(usize),
}

impl DispatchError {
    /// The buffer and the signature disagree; producer and dispatcher are out of step.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, DispatchError::ArgumentUnderrun { .. })
    }
}
