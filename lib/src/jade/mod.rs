// Copyright (c) 2022-2023 The MobileCoin Foundation

//! CBOR-RPC signing device
//!
//! Commands map one-to-one onto the wire methods in [hw_wire]; the
//! multi-round signing flows live in [resolver]. Every public operation
//! takes the connection lock for its full duration, so concurrent callers
//! queue FIFO and never interleave round-trips on the wire.

use log::debug;
use serde_bytes::ByteBuf;

use hw_wire::{
    address::{GetReceiveMultisigAddressParams, GetReceiveSinglesigAddressParams},
    blinding::{
        FactorType, GetBlindingFactorParams, GetBlindingKeyParams, GetMasterBlindingKeyParams,
        GetSharedNonceParams,
    },
    version::{AddEntropyParams, VersionInfo},
    xpub::GetXpubParams,
    Method,
};

use crate::{
    builder,
    transport::{CancelToken, Connection, Transport},
    types::{
        BlindingFactorsResult, Network, ReceiveAddressRequest, SignMessageRequest,
        SignMessageResult, SignTxResult, UnsignedTransaction,
    },
    Error,
};

mod resolver;

/// Handle to a CBOR-RPC signing device
pub struct Jade<T: Transport> {
    conn: Connection<T>,
    cancel: CancelToken,
}

impl<T: Transport> Jade<T> {
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

    /// Fetch firmware version / capability information
    pub async fn version_info(&self) -> Result<VersionInfo, Error> {
        self.cancel.reset();
        let mut state = self.conn.lock().await;
        state
            .request_bare(
                Method::GetVersionInfo,
                self.conn.request_timeout(),
                &self.cancel,
            )
            .await
    }

    /// Contribute host entropy to the device RNG pool
    pub async fn add_entropy(&self, entropy: Vec<u8>) -> Result<(), Error> {
        self.cancel.reset();
        let mut state = self.conn.lock().await;
        let ok: bool = state
            .request(
                Method::AddEntropy,
                AddEntropyParams { entropy },
                self.conn.request_timeout(),
                &self.cancel,
            )
            .await?;
        match ok {
            true => Ok(()),
            false => Err(Error::Protocol("device rejected entropy".to_string())),
        }
    }

    /// Derive extended public keys, one per requested path
    pub async fn xpubs(
        &self,
        network: Network,
        paths: &[Vec<u32>],
    ) -> Result<Vec<String>, Error> {
        self.cancel.reset();
        let mut state = self.conn.lock().await;

        let mut xpubs = Vec::with_capacity(paths.len());
        for path in paths {
            let xpub: String = state
                .request(
                    Method::GetXpub,
                    GetXpubParams {
                        network: network.to_string(),
                        path: path.clone(),
                    },
                    self.conn.request_timeout(),
                    &self.cancel,
                )
                .await?;
            xpubs.push(xpub);
        }

        Ok(xpubs)
    }

    /// Derive a receive address, displayed on-device for user verification
    ///
    /// For 2of3 multisig the caller supplies `recovery_xpub` already derived
    /// to the branch level; it is forwarded to the device as-is.
    pub async fn receive_address(&self, req: &ReceiveAddressRequest) -> Result<String, Error> {
        self.cancel.reset();
        let mut state = self.conn.lock().await;
        let timeout = self.conn.user_timeout();

        if req.multisig {
            // Green multisig paths end in [branch, pointer]
            let n = req.path.len();
            if n < 2 {
                return Err(Error::InvalidArgument(
                    "multisig address path too short".to_string(),
                ));
            }
            state
                .request(
                    Method::GetReceiveAddress,
                    GetReceiveMultisigAddressParams {
                        network: req.network.to_string(),
                        pointer: req.path[n - 1],
                        subaccount: req.subaccount.unwrap_or(0),
                        branch: req.path[n - 2],
                        recovery_xpub: req.recovery_xpub.clone(),
                        csv_blocks: req.csv_blocks,
                    },
                    timeout,
                    &self.cancel,
                )
                .await
        } else {
            let variant = req
                .address_type
                .and_then(|at| at.descriptor_variant())
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "address type {:?} has no singlesig descriptor",
                        req.address_type
                    ))
                })?;
            state
                .request(
                    Method::GetReceiveAddress,
                    GetReceiveSinglesigAddressParams {
                        network: req.network.to_string(),
                        path: req.path.clone(),
                        variant: variant.to_string(),
                    },
                    timeout,
                    &self.cancel,
                )
                .await
        }
    }

    /// Fetch the blinding public key for an output script
    pub async fn blinding_key(&self, script: Vec<u8>) -> Result<Vec<u8>, Error> {
        self.cancel.reset();
        let mut state = self.conn.lock().await;
        let key: ByteBuf = state
            .request(
                Method::GetBlindingKey,
                GetBlindingKeyParams { script },
                self.conn.request_timeout(),
                &self.cancel,
            )
            .await?;
        Ok(key.into_vec())
    }

    /// Fetch the ECDH nonce shared with a counterparty key
    pub async fn shared_nonce(
        &self,
        script: Vec<u8>,
        their_pubkey: Vec<u8>,
    ) -> Result<Vec<u8>, Error> {
        self.cancel.reset();
        let mut state = self.conn.lock().await;
        let nonce: ByteBuf = state
            .request(
                Method::GetSharedNonce,
                GetSharedNonceParams {
                    script,
                    their_pubkey,
                },
                self.conn.request_timeout(),
                &self.cancel,
            )
            .await?;
        Ok(nonce.into_vec())
    }

    /// Export the SLIP-0077 master blinding key, subject to on-device
    /// confirmation unless `only_if_silent` is set
    pub async fn master_blinding_key(&self, only_if_silent: bool) -> Result<Vec<u8>, Error> {
        self.cancel.reset();
        let mut state = self.conn.lock().await;
        let key: ByteBuf = state
            .request(
                Method::GetMasterBlindingKey,
                GetMasterBlindingKeyParams {
                    only_if_silent: only_if_silent.then_some(true),
                },
                self.conn.user_timeout(),
                &self.cancel,
            )
            .await?;
        Ok(key.into_vec())
    }

    /// Fetch deterministic blinding factors for every output of `tx`
    ///
    /// Unblinded outputs (fee) yield empty blinders so the result stays
    /// aligned with the transaction's output order.
    pub async fn blinding_factors(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<BlindingFactorsResult, Error> {
        let hash_prevouts = builder::hash_prevouts(&tx.inputs)?;

        self.cancel.reset();
        let mut state = self.conn.lock().await;
        let timeout = self.conn.request_timeout();

        // Newer firmware returns both factors in one call
        let info: VersionInfo = state
            .request_bare(Method::GetVersionInfo, timeout, &self.cancel)
            .await?;
        let combined = info.has_swap_support();
        debug!(
            "blinding factors for {} outputs (combined={combined})",
            tx.outputs.len()
        );

        let mut result = BlindingFactorsResult::default();
        for (i, out) in tx.outputs.iter().enumerate() {
            if !out.is_blinded() {
                result.asset_blinders.push(vec![]);
                result.amount_blinders.push(vec![]);
                continue;
            }

            let factor = |factor_type| GetBlindingFactorParams {
                hash_prevouts: hash_prevouts.to_vec(),
                output_index: i as u32,
                factor_type,
            };

            if combined {
                let both: ByteBuf = state
                    .request(
                        Method::GetBlindingFactor,
                        factor(FactorType::AssetAndValue),
                        timeout,
                        &self.cancel,
                    )
                    .await?;
                if both.len() != 64 {
                    return Err(Error::Protocol(format!(
                        "combined blinding factor is {} bytes, expected 64",
                        both.len()
                    )));
                }
                // The session consumes blinders in reversed byte order
                result
                    .asset_blinders
                    .push(both[..32].iter().rev().copied().collect());
                result
                    .amount_blinders
                    .push(both[32..].iter().rev().copied().collect());
            } else {
                let abf: ByteBuf = state
                    .request(
                        Method::GetBlindingFactor,
                        factor(FactorType::Asset),
                        timeout,
                        &self.cancel,
                    )
                    .await?;
                let vbf: ByteBuf = state
                    .request(
                        Method::GetBlindingFactor,
                        factor(FactorType::Value),
                        timeout,
                        &self.cancel,
                    )
                    .await?;
                let mut abf = abf.into_vec();
                let mut vbf = vbf.into_vec();
                abf.reverse();
                vbf.reverse();
                result.asset_blinders.push(abf);
                result.amount_blinders.push(vbf);
            }
        }

        Ok(result)
    }

    /// Sign a message under the requested derivation path
    pub async fn sign_message(&self, req: &SignMessageRequest) -> Result<SignMessageResult, Error> {
        self.cancel.reset();
        resolver::sign_message(&self.conn, &self.cancel, req).await
    }

    /// Sign every wallet input of an unsigned transaction
    pub async fn sign_transaction(
        &self,
        network: Network,
        tx: &UnsignedTransaction,
        use_ae: bool,
    ) -> Result<SignTxResult, Error> {
        if network.is_liquid() {
            return Err(Error::InvalidArgument(
                "confidential network requires sign_liquid_transaction".to_string(),
            ));
        }
        self.cancel.reset();
        resolver::sign_transaction(&self.conn, &self.cancel, network, tx, use_ae).await
    }

    /// Sign every wallet input of an unsigned confidential transaction
    pub async fn sign_liquid_transaction(
        &self,
        network: Network,
        tx: &UnsignedTransaction,
        use_ae: bool,
    ) -> Result<SignTxResult, Error> {
        if !network.is_liquid() {
            return Err(Error::InvalidArgument(
                "non-confidential network requires sign_transaction".to_string(),
            ));
        }
        self.cancel.reset();
        resolver::sign_transaction(&self.conn, &self.cancel, network, tx, use_ae).await
    }
}
