// Copyright (c) 2022-2023 The MobileCoin Foundation

//! APDU signing device (Ledger bitcoin app)
//!
//! Covers the subset of the capability surface the bitcoin app exposes:
//! xpub derivation, message signing and witness-input transaction signing.
//! Confidential (Liquid) operations, the anti-exfiltration protocol and
//! on-device address verification are structurally unavailable on this
//! family and are rejected as [Error::InvalidArgument] before any frame is
//! written.

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    transport::{CancelToken, Connection, ConnectionState, Transport},
    types::{
        Network, SignMessageRequest, SignMessageResult, SignTxResult, TransactionInput,
        UnsignedTransaction,
    },
    Error,
};

pub mod apdu;

use apdu::{Apdu, Instruction};

/// BIP32 serialization version bytes for public keys
const XPUB_VERSION_MAINNET: [u8; 4] = [0x04, 0x88, 0xb2, 0x1e];
const XPUB_VERSION_TESTNET: [u8; 4] = [0x04, 0x35, 0x87, 0xcf];

/// Handle to an APDU signing device running the bitcoin app
pub struct Ledger<T: Transport> {
    conn: Connection<T>,
    cancel: CancelToken,
}

impl<T: Transport> Ledger<T> {
    /// Bind a device handle to an established connection
    pub fn new(conn: Connection<T>) -> Self {
        Self {
            conn,
            cancel: CancelToken::default(),
        }
    }

    /// Cancellation handle for the operation currently in flight
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    async fn exchange(
        &self,
        state: &mut ConnectionState<T>,
        apdu: Apdu,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let frame = state.transfer(&apdu.encode()?, timeout).await?;
        apdu::parse_response(&frame)
    }

    /// Derive extended public keys, one per requested path
    ///
    /// The app returns the raw public key and chain code; depth and parent
    /// fingerprint are not recoverable from a single exchange and are
    /// serialized as zero, which the wallet session accepts for account
    /// level keys.
    pub async fn xpubs(&self, network: Network, paths: &[Vec<u32>]) -> Result<Vec<String>, Error> {
        let version = xpub_version(network)?;

        self.cancel.reset();
        let mut state = self.conn.lock().await;

        let mut xpubs = Vec::with_capacity(paths.len());
        for path in paths {
            let mut data = vec![];
            apdu::write_path(&mut data, path)?;

            let resp = self
                .exchange(
                    &mut state,
                    Apdu::new(Instruction::GetWalletPublicKey, 0, 0, data),
                    self.conn.request_timeout(),
                )
                .await?;

            let (pubkey, chain_code) = parse_wallet_public_key(&resp)?;
            let child = path.last().copied().unwrap_or(0);
            xpubs.push(serialize_xpub(version, child, &chain_code, &pubkey));
        }

        Ok(xpubs)
    }

    /// Sign a message under the requested derivation path
    pub async fn sign_message(&self, req: &SignMessageRequest) -> Result<SignMessageResult, Error> {
        if req.use_ae_protocol {
            return Err(Error::InvalidArgument(
                "device family does not support the anti-exfiltration protocol".to_string(),
            ));
        }

        let mut data = vec![];
        apdu::write_path(&mut data, &req.path)?;
        let msg = req.message.as_bytes();
        data.extend_from_slice(&(msg.len() as u16).to_be_bytes());
        data.extend_from_slice(msg);
        if data.len() > apdu::MAX_DATA_LEN {
            return Err(Error::InvalidArgument("message too long".to_string()));
        }

        self.cancel.reset();
        let mut state = self.conn.lock().await;

        // Prepare round loads path and message, sign round waits for the
        // on-device confirmation
        self.exchange(
            &mut state,
            Apdu::new(Instruction::SignMessage, 0x00, 0x01, data),
            self.conn.request_timeout(),
        )
        .await?;

        let mut signature = self
            .exchange(
                &mut state,
                Apdu::new(Instruction::SignMessage, 0x80, 0x01, vec![0x00]),
                self.conn.user_timeout(),
            )
            .await?;
        if signature.is_empty() {
            return Err(Error::Protocol("empty message signature".to_string()));
        }

        // The app substitutes the DER sequence tag with parity bits
        signature[0] = 0x30;

        Ok(SignMessageResult {
            signature,
            signer_commitment: None,
        })
    }

    /// Sign every wallet input of an unsigned transaction
    ///
    /// Only witness inputs are supported; the full-prevout legacy flow is
    /// not implemented for this family.
    pub async fn sign_transaction(
        &self,
        network: Network,
        tx: &UnsignedTransaction,
        use_ae: bool,
    ) -> Result<SignTxResult, Error> {
        if network.is_liquid() {
            return Err(unsupported("confidential transactions"));
        }
        if use_ae {
            return Err(unsupported("the anti-exfiltration protocol"));
        }
        if tx.inputs.is_empty() {
            return Err(Error::InvalidArgument("transaction has no inputs".into()));
        }
        if let Some(i) = tx.inputs.iter().position(|i| !i.address_type.is_segwit()) {
            return Err(Error::InvalidArgument(format!(
                "input {i} is not a witness input"
            )));
        }

        let outputs = serialize_outputs(tx)?;

        self.cancel.reset();
        let mut state = self.conn.lock().await;

        debug!("hashing {} witness inputs", tx.inputs.len());

        // First pass presents the full input set so the app can compute the
        // witness hashes, outputs are confirmed once
        self.start_untrusted_hash(&mut state, true, &tx.inputs, None, tx.version)
            .await?;
        self.finalize_outputs(&mut state, &outputs).await?;

        // Then each input is re-presented alone, with its real script, and
        // signed
        let mut signatures = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            self.start_untrusted_hash(
                &mut state,
                false,
                std::slice::from_ref(input),
                Some(&input.prevout_script),
                tx.version,
            )
            .await?;

            let mut data = vec![];
            apdu::write_path(&mut data, &input.user_path)?;
            data.push(0x00);
            data.extend_from_slice(&tx.locktime.to_be_bytes());
            data.push(0x01); // SIGHASH_ALL

            let mut signature = self
                .exchange(
                    &mut state,
                    Apdu::new(Instruction::HashSign, 0, 0, data),
                    self.conn.user_timeout(),
                )
                .await?;
            if signature.is_empty() {
                return Err(Error::Protocol("empty input signature".to_string()));
            }
            signature[0] = 0x30;
            signatures.push(signature);
        }

        Ok(SignTxResult {
            signatures,
            signer_commitments: vec![],
        })
    }

    async fn start_untrusted_hash(
        &self,
        state: &mut ConnectionState<T>,
        new_transaction: bool,
        inputs: &[TransactionInput],
        script: Option<&[u8]>,
        version: u32,
    ) -> Result<(), Error> {
        let p2 = match new_transaction {
            true => 0x02, // witness hashing
            false => 0x80,
        };

        let mut data = vec![];
        data.extend_from_slice(&version.to_le_bytes());
        apdu::write_varint(&mut data, inputs.len() as u64);
        self.exchange(
            state,
            Apdu::new(Instruction::HashInputStart, 0x00, p2, data),
            self.conn.request_timeout(),
        )
        .await?;

        for input in inputs {
            let mut data = vec![0x02]; // witness input marker
            let mut txid = hex::decode(&input.txhash)
                .map_err(|_| Error::InvalidArgument("malformed txid".to_string()))?;
            if txid.len() != 32 {
                return Err(Error::InvalidArgument("malformed txid".to_string()));
            }
            txid.reverse();
            data.extend_from_slice(&txid);
            data.extend_from_slice(&input.pt_idx.to_le_bytes());
            data.extend_from_slice(&input.satoshi.to_le_bytes());

            let script = script.unwrap_or(&[]);
            apdu::write_varint(&mut data, script.len() as u64);
            data.extend_from_slice(script);
            data.extend_from_slice(&input.sequence.to_le_bytes());

            for chunk in data.chunks(apdu::MAX_DATA_LEN) {
                self.exchange(
                    state,
                    Apdu::new(Instruction::HashInputStart, 0x80, 0x00, chunk.to_vec()),
                    self.conn.request_timeout(),
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn finalize_outputs(
        &self,
        state: &mut ConnectionState<T>,
        outputs: &[u8],
    ) -> Result<(), Error> {
        let chunks: Vec<&[u8]> = outputs.chunks(apdu::MAX_DATA_LEN).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let last = i + 1 == chunks.len();
            // The final chunk triggers the on-device confirmation
            self.exchange(
                state,
                Apdu::new(
                    Instruction::HashInputFinalizeFull,
                    if last { 0x80 } else { 0x00 },
                    0x00,
                    chunk.to_vec(),
                ),
                if last {
                    self.conn.user_timeout()
                } else {
                    self.conn.request_timeout()
                },
            )
            .await?;
        }
        Ok(())
    }
}

fn unsupported(what: &str) -> Error {
    Error::InvalidArgument(format!("device family does not support {what}"))
}

fn xpub_version(network: Network) -> Result<[u8; 4], Error> {
    if network.is_liquid() {
        return Err(unsupported("confidential networks"));
    }
    match network.is_mainnet() {
        true => Ok(XPUB_VERSION_MAINNET),
        false => Ok(XPUB_VERSION_TESTNET),
    }
}

/// Split a `GetWalletPublicKey` response into compressed public key and
/// chain code
fn parse_wallet_public_key(resp: &[u8]) -> Result<([u8; 33], [u8; 32]), Error> {
    let malformed = || Error::Protocol("malformed public key response".to_string());

    let key_len = *resp.first().ok_or_else(malformed)? as usize;
    let rest = resp.get(1..).ok_or_else(malformed)?;
    let key = rest.get(..key_len).ok_or_else(malformed)?;
    let rest = &rest[key_len..];

    let addr_len = *rest.first().ok_or_else(malformed)? as usize;
    let rest = rest.get(1 + addr_len..).ok_or_else(malformed)?;

    let chain_code: [u8; 32] = rest.try_into().map_err(|_| malformed())?;

    // The app reports uncompressed points
    let compressed: [u8; 33] = match key_len {
        65 if key[0] == 0x04 => {
            let mut c = [0u8; 33];
            c[0] = 0x02 | (key[64] & 0x01);
            c[1..].copy_from_slice(&key[1..33]);
            c
        }
        33 => key.try_into().map_err(|_| malformed())?,
        _ => return Err(malformed()),
    };

    Ok((compressed, chain_code))
}

/// BIP32 base58check serialization with zeroed depth and parent fingerprint
fn serialize_xpub(version: [u8; 4], child: u32, chain_code: &[u8; 32], key: &[u8; 33]) -> String {
    let mut buff = Vec::with_capacity(82);
    buff.extend_from_slice(&version);
    buff.push(0); // depth
    buff.extend_from_slice(&[0; 4]); // parent fingerprint
    buff.extend_from_slice(&child.to_be_bytes());
    buff.extend_from_slice(chain_code);
    buff.extend_from_slice(key);

    let check = Sha256::digest(Sha256::digest(&buff));
    buff.extend_from_slice(&check[..4]);

    bs58::encode(buff).into_string()
}

fn serialize_outputs(tx: &UnsignedTransaction) -> Result<Vec<u8>, Error> {
    let mut buff = vec![];
    apdu::write_varint(&mut buff, tx.outputs.len() as u64);
    for (i, out) in tx.outputs.iter().enumerate() {
        let script = out
            .script
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument(format!("output {i} lacks a script")))?;
        buff.extend_from_slice(&out.satoshi.to_le_bytes());
        apdu::write_varint(&mut buff, script.len() as u64);
        buff.extend_from_slice(script);
    }
    Ok(buff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uncompressed_public_key() {
        let mut key = vec![0x04];
        key.extend_from_slice(&[0x11; 32]); // x
        let mut y = [0x22; 32];
        y[31] = 0x23; // odd
        key.extend_from_slice(&y);

        let mut resp = vec![65];
        resp.extend_from_slice(&key);
        resp.push(4);
        resp.extend_from_slice(b"addr");
        resp.extend_from_slice(&[0x33; 32]);

        let (pubkey, chain_code) = parse_wallet_public_key(&resp).unwrap();
        assert_eq!(pubkey[0], 0x03);
        assert_eq!(&pubkey[1..], &[0x11; 32]);
        assert_eq!(chain_code, [0x33; 32]);
    }

    #[test]
    fn truncated_public_key_response() {
        assert!(matches!(
            parse_wallet_public_key(&[65, 0x04]),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn xpub_roundtrip_shape() {
        let xpub = serialize_xpub(
            XPUB_VERSION_MAINNET,
            0x80000000,
            &[0x55; 32],
            &[0x02; 33],
        );
        assert!(xpub.starts_with("xpub"));

        let raw = bs58::decode(&xpub).into_vec().unwrap();
        assert_eq!(raw.len(), 82);
        // checksum verifies
        let check = Sha256::digest(Sha256::digest(&raw[..78]));
        assert_eq!(&raw[78..], &check[..4]);
    }

    #[test]
    fn output_serialization() {
        let tx = UnsignedTransaction {
            outputs: vec![crate::types::TransactionOutput {
                satoshi: 1000,
                script: Some(vec![0x00, 0x14]),
                ..Default::default()
            }],
            ..Default::default()
        };

        let buff = serialize_outputs(&tx).unwrap();
        let mut expect = vec![0x01];
        expect.extend_from_slice(&1000u64.to_le_bytes());
        expect.extend_from_slice(&[0x02, 0x00, 0x14]);
        assert_eq!(buff, expect);
    }
}
