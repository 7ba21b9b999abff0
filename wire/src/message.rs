// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Message signing payloads
//!
//! With the anti-exfiltration protocol engaged, `sign_message` carries the
//! host *commitment* only; the matching host *entropy* exists solely in
//! [GetSignatureParams] and is revealed in a later round, after the device
//! has returned its own signer commitment. Early reveal is therefore not
//! representable on the wire.

use serde::{Deserialize, Serialize};

/// Parameters for `sign_message`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignMessageParams {
    pub message: String,
    pub path: Vec<u32>,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub ae_host_commitment: Option<Vec<u8>>,
}

/// Parameters for `get_signature`, the anti-exfiltration entropy reveal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetSignatureParams {
    #[serde(with = "serde_bytes")]
    pub ae_host_entropy: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{encode_decode_request, param_keys};
    use crate::{Method, Request};

    #[test]
    fn encode_decode_sign_message() {
        let req = Request::new(
            11,
            Method::SignMessage,
            SignMessageParams {
                message: "greenaddress.it      login ABCDE".to_string(),
                path: vec![1195487518],
                ae_host_commitment: Some(vec![0xab; 32]),
            },
        );

        encode_decode_request(&req);
    }

    #[test]
    fn absent_commitment_is_omitted() {
        let req = Request::new(
            12,
            Method::SignMessage,
            SignMessageParams {
                message: "test".to_string(),
                path: vec![0],
                ae_host_commitment: None,
            },
        );

        let keys = param_keys(&req.encode().unwrap());
        assert!(!keys.contains(&"ae_host_commitment".to_string()));
        assert!(keys.contains(&"message".to_string()));
    }
}
