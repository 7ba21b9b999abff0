// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Transaction signing payloads
//!
//! A signing operation opens with `sign_tx` / `sign_liquid_tx` carrying the
//! whole-transaction context (serialized transaction, change descriptors,
//! per-output trusted commitments for Liquid), followed by one `tx_input`
//! message per input. Input descriptors carry the anti-exfiltration host
//! commitment when that protocol is in use; the host entropy is only ever
//! sent via `get_signature` (see [crate::message::GetSignatureParams]).

use serde::{Deserialize, Serialize};

/// Parameters for `sign_tx` / `sign_liquid_tx`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignTxParams {
    /// Change descriptor per output, `None` for outputs requiring on-screen
    /// confirmation
    pub change: Vec<Option<TxChangeOutput>>,
    pub network: String,
    pub num_inputs: u32,
    /// Per-output commitment data, Liquid only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_commitments: Option<Vec<Option<TrustedCommitment>>>,
    pub use_ae_signatures: bool,
    #[serde(with = "serde_bytes")]
    pub txn: Vec<u8>,
}

/// Descriptor for an output the device should recognise as its own change
/// and auto-verify rather than display
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxChangeOutput {
    pub path: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_xpub: Option<String>,
    pub csv_blocks: u32,
    /// Script descriptor variant, e.g. `wpkh(k)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Blinded output commitment data a Liquid-aware signer needs to validate a
/// confidential amount / asset before signing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustedCommitment {
    #[serde(with = "serde_bytes")]
    pub asset_id: Vec<u8>,
    pub value: u64,
    #[serde(with = "serde_bytes")]
    pub abf: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub vbf: Vec<u8>,
    /// Explicit asset generator, only required by legacy firmware
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset_generator: Option<Vec<u8>>,
    /// Explicit value commitment, only required by legacy firmware
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub value_commitment: Option<Vec<u8>>,
    #[serde(with = "serde_bytes")]
    pub blinding_key: Vec<u8>,
}

/// Input descriptor for a plain (non-confidential) chain
///
/// Legacy inputs carry the full previous transaction for on-device amount
/// verification; witness inputs carry the prevout script and satoshi amount
/// instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxInputBtc {
    pub is_witness: bool,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_tx: Option<Vec<u8>>,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub script: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satoshi: Option<u64>,
    pub path: Vec<u32>,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub ae_host_commitment: Option<Vec<u8>>,
}

/// Input descriptor for a confidential (Liquid) chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxInputLiquid {
    pub is_witness: bool,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub script: Option<Vec<u8>>,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub value_commitment: Option<Vec<u8>>,
    pub path: Vec<u32>,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub ae_host_commitment: Option<Vec<u8>>,
}

/// Input descriptor, tagged per device chain family
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TxInput {
    Btc(TxInputBtc),
    Liquid(TxInputLiquid),
}

impl TxInput {
    /// Host commitment attached to this input, when AE is engaged
    pub fn ae_host_commitment(&self) -> Option<&[u8]> {
        match self {
            TxInput::Btc(i) => i.ae_host_commitment.as_deref(),
            TxInput::Liquid(i) => i.ae_host_commitment.as_deref(),
        }
    }
}
