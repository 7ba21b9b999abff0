// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Receive address derivation payloads

use serde::{Deserialize, Serialize};

/// Parameters for `get_receive_address` on a multisig-shield wallet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetReceiveMultisigAddressParams {
    pub network: String,
    pub pointer: u32,
    pub subaccount: u32,
    pub branch: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_xpub: Option<String>,
    pub csv_blocks: u32,
}

/// Parameters for `get_receive_address` on a singlesig wallet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetReceiveSinglesigAddressParams {
    pub network: String,
    pub path: Vec<u32>,
    /// Script descriptor variant, e.g. `sh(wpkh(k))`
    pub variant: String,
}
