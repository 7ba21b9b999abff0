// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Firmware version / capability payloads

use serde::{Deserialize, Serialize};

/// Firmware that accepts the combined `ASSET_AND_VALUE` blinding factor call
/// and explicit trusted-commitment generators
const SWAP_SUPPORT_VERSION: &str = "0.1.48";

/// Result payload of `get_version_info`
///
/// Only the fields the resolver gates behaviour on are decoded; the firmware
/// reports more and unknown keys are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "JADE_VERSION")]
    pub version: String,
    #[serde(rename = "BOARD_TYPE", default)]
    pub board_type: Option<String>,
    #[serde(rename = "JADE_FEATURES", default)]
    pub features: Option<String>,
    #[serde(rename = "JADE_HAS_PIN", default)]
    pub has_pin: Option<bool>,
}

impl VersionInfo {
    /// Whether combined blinding-factor calls are supported
    pub fn has_swap_support(&self) -> bool {
        self.version.as_str() >= SWAP_SUPPORT_VERSION
    }
}

/// Parameters for `add_entropy`, the host's noise contribution to the device
/// RNG pool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddEntropyParams {
    #[serde(with = "serde_bytes")]
    pub entropy: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Response;

    #[test]
    fn decode_version_info() {
        let frame = serde_cbor::to_vec(&Response {
            id: 1,
            result: Some(VersionInfo {
                version: "0.1.48".to_string(),
                board_type: Some("JADE_V1.1".to_string()),
                features: Some("SB".to_string()),
                has_pin: Some(true),
            }),
            error: None,
        })
        .unwrap();

        let resp: Response<VersionInfo> = Response::decode(&frame).unwrap();
        let info = resp.result.unwrap();
        assert!(info.has_swap_support());
    }

    #[test]
    fn swap_support_threshold() {
        let mut info = VersionInfo {
            version: "0.1.47".to_string(),
            board_type: None,
            features: None,
            has_pin: None,
        };
        assert!(!info.has_swap_support());

        info.version = "0.1.48".to_string();
        assert!(info.has_swap_support());
    }
}
