use primitive_types::H256;

/// Error taxonomy surfaced by every façade operation (spec §7). `Fatal` is
/// deliberately not `Clone`: it is meant to be handled exactly once, at the
/// binary's top level, by logging and terminating the process.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("user facing error: {0}")]
    UserFacing(String),

    #[error("L1 block rejected: {message} (current L1 head: {l1_head:?})")]
    BlockReject { message: String, l1_head: H256 },

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("enclave unavailable: {0}")]
    Unavailable(String),

    #[error("fatal error, enclave must restart: {0}")]
    Fatal(String),
}

impl SystemError {
    pub fn user_facing(msg: impl Into<String>) -> Self {
        SystemError::UserFacing(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SystemError::Internal(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        SystemError::Unavailable(msg.into())
    }

    pub fn block_reject(message: impl Into<String>, l1_head: H256) -> Self {
        SystemError::BlockReject {
            message: message.into(),
            l1_head,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SystemError::UserFacing(_) => "UserFacing",
            SystemError::BlockReject { .. } => "BlockReject",
            SystemError::Internal(_) => "Internal",
            SystemError::Unavailable(_) => "Unavailable",
            SystemError::Fatal(_) => "Fatal",
        }
    }
}

pub type SystemResult<T> = Result<T, SystemError>;
