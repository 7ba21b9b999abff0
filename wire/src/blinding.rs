// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Confidential asset (Liquid) blinding payloads

use serde::{Deserialize, Serialize};

/// Parameters for `get_blinding_key`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetBlindingKeyParams {
    #[serde(with = "serde_bytes")]
    pub script: Vec<u8>,
}

/// Parameters for `get_shared_nonce`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetSharedNonceParams {
    #[serde(with = "serde_bytes")]
    pub script: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub their_pubkey: Vec<u8>,
}

/// Parameters for `get_master_blinding_key`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetMasterBlindingKeyParams {
    /// Skip the on-device confirmation screen if the key has already been
    /// exported this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if_silent: Option<bool>,
}

/// Blinding factor selector for `get_blinding_factor`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorType {
    #[serde(rename = "ASSET")]
    Asset,
    #[serde(rename = "VALUE")]
    Value,
    /// Both factors in one call, concatenated `abf || vbf` (firmware 0.1.48+)
    #[serde(rename = "ASSET_AND_VALUE")]
    AssetAndValue,
}

/// Parameters for `get_blinding_factor`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetBlindingFactorParams {
    #[serde(with = "serde_bytes")]
    pub hash_prevouts: Vec<u8>,
    pub output_index: u32,
    #[serde(rename = "type")]
    pub factor_type: FactorType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{encode_decode_request, param_keys};
    use crate::{Method, Request};

    #[test]
    fn encode_decode_shared_nonce() {
        let req = Request::new(
            40,
            Method::GetSharedNonce,
            GetSharedNonceParams {
                script: vec![0xa9, 0x14],
                their_pubkey: vec![0x02; 33],
            },
        );

        encode_decode_request(&req);
    }

    #[test]
    fn encode_decode_blinding_factor() {
        let req = Request::new(
            41,
            Method::GetBlindingFactor,
            GetBlindingFactorParams {
                hash_prevouts: vec![0x5e; 32],
                output_index: 0,
                factor_type: FactorType::AssetAndValue,
            },
        );

        encode_decode_request(&req);

        let keys = param_keys(&req.encode().unwrap());
        assert!(keys.contains(&"type".to_string()));
    }

    #[test]
    fn master_blinding_key_flag_omitted() {
        let req = Request::new(
            42,
            Method::GetMasterBlindingKey,
            GetMasterBlindingKeyParams {
                only_if_silent: None,
            },
        );

        let keys = param_keys(&req.encode().unwrap());
        assert!(keys.is_empty());
    }
}
