// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Wire message definitions for CBOR-RPC hardware signer communication
//!
//! This crate provides the typed request and response payloads exchanged with
//! a hardware signer, together with the `{id, method, params}` envelope and
//! the codec mapping them to framed CBOR bytes.
//!
//! Payloads form a closed set keyed by [Method]; fields that are absent are
//! omitted from the encoded map entirely (never encoded as null), while
//! decoding tolerates both absent and explicit-null optional fields for
//! compatibility with older firmware. Binary blobs (scripts, transactions,
//! keys, commitments) are always CBOR byte strings, never arrays or text.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub mod address;
pub mod blinding;
pub mod message;
pub mod tx;
pub mod version;
pub mod xpub;

/// RPC methods issued by the host
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display, strum::AsRefStr, strum::EnumString)]
pub enum Method {
    /// Fetch firmware version / capability information
    #[strum(serialize = "get_version_info")]
    GetVersionInfo,

    /// Contribute host entropy to the device RNG pool
    #[strum(serialize = "add_entropy")]
    AddEntropy,

    /// Derive an extended public key
    #[strum(serialize = "get_xpub")]
    GetXpub,

    /// Sign a message (first AE round when a host commitment is attached)
    #[strum(serialize = "sign_message")]
    SignMessage,

    /// Reveal host entropy and fetch a pending AE signature
    #[strum(serialize = "get_signature")]
    GetSignature,

    /// Initialise a transaction signing operation
    #[strum(serialize = "sign_tx")]
    SignTx,

    /// Initialise a confidential (Liquid) transaction signing operation
    #[strum(serialize = "sign_liquid_tx")]
    SignLiquidTx,

    /// Send one transaction input descriptor
    #[strum(serialize = "tx_input")]
    TxInput,

    /// Derive and display a receive address
    #[strum(serialize = "get_receive_address")]
    GetReceiveAddress,

    /// Fetch the blinding public key for a script
    #[strum(serialize = "get_blinding_key")]
    GetBlindingKey,

    /// Fetch the ECDH shared nonce for a script / counterparty key
    #[strum(serialize = "get_shared_nonce")]
    GetSharedNonce,

    /// Fetch the SLIP-0077 master blinding key
    #[strum(serialize = "get_master_blinding_key")]
    GetMasterBlindingKey,

    /// Fetch deterministic output blinding factors
    #[strum(serialize = "get_blinding_factor")]
    GetBlindingFactor,
}

/// Device-reported RPC error codes
pub mod rpc {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const UNKNOWN_METHOD: i32 = -32601;
    pub const BAD_PARAMETERS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const USER_CANCELLED: i32 = -32000;
    pub const PROTOCOL_ERROR: i32 = -32001;
    pub const HW_LOCKED: i32 = -32002;
    pub const NETWORK_MISMATCH: i32 = -32003;
}

/// Codec error type
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a request envelope
    #[error("CBOR encode failed: {0}")]
    Encode(serde_cbor::Error),

    /// Failed to decode a response frame
    #[error("CBOR decode failed: {0}")]
    Decode(serde_cbor::Error),
}

/// Request envelope, `{id, method, params}`
///
/// `id` values are unique per connection lifetime and monotonically
/// increasing from the host side. `params` is dropped from the encoded map
/// when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request<P> {
    pub id: u32,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<P: Serialize> Request<P> {
    /// Create a new request carrying a parameter payload
    pub fn new(id: u32, method: Method, params: P) -> Self {
        Self {
            id,
            method: method.to_string(),
            params: Some(params),
        }
    }

    /// Encode the request envelope to framed CBOR bytes
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_cbor::to_vec(self).map_err(CodecError::Encode)
    }
}

impl Request<()> {
    /// Create a request with no parameter payload
    pub fn bare(id: u32, method: Method) -> Self {
        Self {
            id,
            method: method.to_string(),
            params: None,
        }
    }
}

/// Structured error returned by the device
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl core::fmt::Display for RpcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Response envelope, `{id, result}` or `{id, error}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response<R> {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl<R: DeserializeOwned> Response<R> {
    /// Decode a typed response from a framed CBOR message
    pub fn decode(buff: &[u8]) -> Result<Self, CodecError> {
        serde_cbor::from_slice(buff).map_err(CodecError::Decode)
    }
}

/// Response envelope with the result left undecoded, used to correlate a
/// frame to its request before committing to a payload type
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResponseHeader {
    pub id: u32,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl ResponseHeader {
    /// Decode only the envelope of a response frame
    pub fn decode(buff: &[u8]) -> Result<Self, CodecError> {
        serde_cbor::from_slice(buff).map_err(CodecError::Decode)
    }
}
