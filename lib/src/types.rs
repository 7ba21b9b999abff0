// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Domain model shared between the capability interface, the model builders
//! and the device protocol implementations

use std::collections::HashMap;
use std::fmt;

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Network the signer is asked to operate on
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[non_exhaustive]
pub enum Network {
    #[strum(serialize = "mainnet")]
    Mainnet,
    #[strum(serialize = "testnet")]
    Testnet,
    #[strum(serialize = "liquid")]
    Liquid,
    #[strum(serialize = "testnet-liquid")]
    TestnetLiquid,
}

impl Network {
    pub fn is_liquid(&self) -> bool {
        matches!(self, Network::Liquid | Network::TestnetLiquid)
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet | Network::Liquid)
    }
}

/// Script type of an input or output, as reported by the wallet session
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum AddressType {
    #[strum(serialize = "csv")]
    Csv,
    #[strum(serialize = "p2wsh")]
    P2wsh,
    #[strum(serialize = "p2wpkh")]
    P2wpkh,
    #[strum(serialize = "p2sh-p2wpkh")]
    P2shP2wpkh,
    #[strum(serialize = "p2pkh")]
    P2pkh,
    #[strum(serialize = "p2sh")]
    P2sh,
}

impl AddressType {
    /// Witness (segwit) inputs carry script + amount instead of the full
    /// previous transaction
    pub fn is_segwit(&self) -> bool {
        matches!(
            self,
            AddressType::Csv | AddressType::P2wsh | AddressType::P2wpkh | AddressType::P2shP2wpkh
        )
    }

    /// Singlesig script descriptor variant understood by the device
    pub fn descriptor_variant(&self) -> Option<&'static str> {
        match self {
            AddressType::P2pkh => Some("pkh(k)"),
            AddressType::P2wpkh => Some("wpkh(k)"),
            AddressType::P2shP2wpkh => Some("sh(wpkh(k))"),
            _ => None,
        }
    }
}

/// Anti-exfiltration host material for one signature slot
///
/// Owns 32 bytes of host entropy and derives the commitment transmitted in
/// the first protocol round. The entropy accessor is crate-private: only the
/// resolver's reveal step, which runs strictly after the device's signer
/// commitment has been received, can read it.
#[derive(Clone, PartialEq, Eq)]
pub struct AeCommitment {
    entropy: [u8; 32],
}

impl AeCommitment {
    /// Generate fresh host entropy from the OS RNG
    pub fn generate() -> Self {
        let mut entropy = [0u8; 32];
        OsRng.fill_bytes(&mut entropy);
        Self { entropy }
    }

    /// Wrap caller-supplied entropy
    pub fn from_entropy(entropy: [u8; 32]) -> Self {
        Self { entropy }
    }

    /// Commitment to the host entropy, safe to transmit ahead of the
    /// device's own commitment
    pub fn commitment(&self) -> [u8; 32] {
        Sha256::digest(self.entropy).into()
    }

    /// Reveal the committed entropy (resolver only)
    pub(crate) fn reveal(&self) -> &[u8; 32] {
        &self.entropy
    }
}

impl fmt::Debug for AeCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Entropy stays out of logs, the commitment identifies the slot
        f.debug_struct("AeCommitment")
            .field("commitment", &hex::encode(self.commitment()))
            .finish()
    }
}

/// Message signing request
#[derive(Clone, Debug)]
pub struct SignMessageRequest {
    pub path: Vec<u32>,
    pub message: String,
    pub use_ae_protocol: bool,
    /// Host AE material, required when `use_ae_protocol` is set
    pub ae: Option<AeCommitment>,
}

/// Message signing result
#[derive(Clone, Debug, PartialEq)]
pub struct SignMessageResult {
    /// DER-encoded signature
    pub signature: Vec<u8>,
    /// Device nonce commitment, present when the AE protocol ran
    pub signer_commitment: Option<Vec<u8>>,
}

/// Receive address derivation / verification request
#[derive(Clone, Debug)]
pub struct ReceiveAddressRequest {
    pub network: Network,
    pub multisig: bool,
    pub path: Vec<u32>,
    /// Recovery xpub for 2of3 script variants
    pub recovery_xpub: Option<String>,
    /// Subaccount pointer for multisig wallets
    pub subaccount: Option<u32>,
    pub address_type: Option<AddressType>,
    pub csv_blocks: u32,
}

/// One input of an unsigned transaction, as supplied by the wallet session
#[derive(Clone, Debug)]
pub struct TransactionInput {
    /// Previous transaction id, display (big-endian) hex
    pub txhash: String,
    /// Previous output index
    pub pt_idx: u32,
    pub sequence: u32,
    pub address_type: AddressType,
    pub prevout_script: Vec<u8>,
    pub satoshi: u64,
    pub user_path: Vec<u32>,
    /// Whether the input amount / asset is blinded (Liquid)
    pub confidential: bool,
    /// Value commitment for a confidential input
    pub value_commitment: Option<Vec<u8>>,
}

/// One output of an unsigned transaction
#[derive(Clone, Debug, Default)]
pub struct TransactionOutput {
    pub satoshi: u64,
    pub script: Option<Vec<u8>>,
    pub is_change: bool,
    pub address_type: Option<AddressType>,
    pub user_path: Vec<u32>,
    pub recovery_xpub: Option<String>,
    pub csv_blocks: u32,
    /// Blinding public key, present for blinded (Liquid) outputs
    pub blinding_key: Option<Vec<u8>>,
    pub asset_id: Option<Vec<u8>>,
    pub abf: Option<Vec<u8>>,
    pub vbf: Option<Vec<u8>>,
    /// Explicit asset generator for legacy firmware
    pub asset_generator: Option<Vec<u8>>,
    /// Explicit value commitment for legacy firmware
    pub value_commitment: Option<Vec<u8>>,
}

impl TransactionOutput {
    pub fn is_blinded(&self) -> bool {
        self.blinding_key.is_some()
    }
}

/// Unsigned transaction handed over by the wallet session
#[derive(Clone, Debug, Default)]
pub struct UnsignedTransaction {
    pub version: u32,
    pub locktime: u32,
    /// Serialized unsigned transaction
    pub txn: Vec<u8>,
    /// Inputs in signing order; `signature[i]` answers `inputs[i]`
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Raw previous transactions keyed by display-hex txid, required for
    /// legacy (non-witness) inputs
    pub previous_txs: HashMap<String, Vec<u8>>,
}

/// Transaction signing result
///
/// Both lists are aligned to the request's input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignTxResult {
    pub signatures: Vec<Vec<u8>>,
    /// Device nonce commitments, one per input when the AE protocol ran,
    /// empty otherwise
    pub signer_commitments: Vec<Vec<u8>>,
}

/// Deterministic output blinding factors (Liquid)
///
/// Entries align with the transaction's outputs; unblinded outputs (fee)
/// hold empty blinders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlindingFactorsResult {
    pub asset_blinders: Vec<Vec<u8>>,
    pub amount_blinders: Vec<Vec<u8>>,
}
