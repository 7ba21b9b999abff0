// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Extended public key derivation payloads

use serde::{Deserialize, Serialize};

/// Parameters for `get_xpub`
///
/// The device answers with the base58 serialization of the BIP32 node at
/// `path`, versioned for `network`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetXpubParams {
    pub network: String,
    pub path: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::encode_decode_request;
    use crate::{Method, Request};

    #[test]
    fn encode_decode_get_xpub() {
        let req = Request::new(
            3,
            Method::GetXpub,
            GetXpubParams {
                network: "mainnet".to_string(),
                path: vec![2147483692, 2147483648, 2147483648],
            },
        );

        encode_decode_request(&req);
    }
}
