// Copyright (c) 2022-2023 The MobileCoin Foundation

use tokio::time::error::Elapsed;

use hw_wire::{rpc, CodecError, RpcError};

use crate::transport::TransportError;

/// Resolver error type
///
/// Every operation completes with a result or exactly one of these outcomes;
/// no partial per-input state survives a failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-side contract violation (missing AE commitment, missing
    /// trusted commitment for a confidential input, unsupported capability
    /// for the bound device family). Raised before any transport traffic,
    /// never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport disconnect or round-trip timeout. The caller decides
    /// whether to reconnect and restart the whole operation.
    #[error("device unreachable: {0}")]
    DeviceUnreachable(TransportError),

    /// Explicit rejection, on-device or caller-initiated
    #[error("operation cancelled")]
    Cancelled,

    /// Malformed or unexpected device response, indicates a firmware /
    /// host compatibility defect rather than a connectivity issue
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::DeviceUnreachable(e)
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::DeviceUnreachable(TransportError::Timeout)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Protocol(e.to_string())
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        match e.code {
            rpc::USER_CANCELLED => Error::Cancelled,
            _ => Error::Protocol(format!("device error: {e}")),
        }
    }
}
