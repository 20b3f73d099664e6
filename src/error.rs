//! Crate-wide error type.
//!
//! The engine's contract with its (out-of-scope) host binding is a single
//! integer status per connection. [`ProxyError::code`] recovers that value
//! from whichever layer actually failed: a socket syscall, the zstd codec,
//! or connection setup.

use std::io;

use thiserror::Error;

/// Fatal error produced by a pipeline or by engine setup.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A receive, send, or completion-wait syscall failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The zstd codec reported a failure while compressing or decompressing.
    #[error("codec error: {0}")]
    Codec(String),

    /// Allocation, ring creation, or buffer registration failed before any
    /// pipeline started running.
    #[error("setup error: {0}")]
    Setup(String),
}

impl ProxyError {
    /// A fixed negative code used for setup failures that have no
    /// underlying `errno` (ring creation, allocation).
    const SETUP_CODE: i32 = -1;
    /// A fixed negative code used for codec failures, which carry a zstd
    /// error string rather than an OS error number.
    const CODEC_CODE: i32 = -2;

    /// Recover the single integer status code the invocation contract
    /// promises a caller (zero on success is represented by `Ok(())`
    /// elsewhere; this is only ever called on the `Err` side).
    pub fn code(&self) -> i32 {
        match self {
            ProxyError::Io(e) => e.raw_os_error().unwrap_or(Self::SETUP_CODE),
            ProxyError::Codec(_) => Self::CODEC_CODE,
            ProxyError::Setup(_) => Self::SETUP_CODE,
        }
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        ProxyError::Codec(msg.into())
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        ProxyError::Setup(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
