// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device-agnostic capability interface
//!
//! The wallet session programs against [HwSigner] only; which wire protocol
//! answers a call is decided once, at connection time, by constructing the
//! matching [Device] variant. Capabilities a family cannot serve resolve as
//! [Error::InvalidArgument] without touching the transport, so the caller
//! can distinguish "this device will never do that" from connectivity
//! failures.

use async_trait::async_trait;

use crate::{
    jade::Jade,
    ledger::Ledger,
    transport::{CancelToken, Transport},
    types::{
        BlindingFactorsResult, Network, ReceiveAddressRequest, SignMessageRequest,
        SignMessageResult, SignTxResult, UnsignedTransaction,
    },
    Error,
};

/// Capability interface implemented by every supported signing device
#[async_trait]
pub trait HwSigner {
    /// Derive extended public keys, one per requested path
    async fn xpubs(&self, network: Network, paths: &[Vec<u32>]) -> Result<Vec<String>, Error>;

    /// Sign a message under a derivation path
    async fn sign_message(&self, req: &SignMessageRequest) -> Result<SignMessageResult, Error>;

    /// Sign every wallet input of an unsigned transaction
    async fn sign_transaction(
        &self,
        network: Network,
        tx: &UnsignedTransaction,
        use_ae: bool,
    ) -> Result<SignTxResult, Error>;

    /// Sign every wallet input of an unsigned confidential transaction
    async fn sign_liquid_transaction(
        &self,
        network: Network,
        tx: &UnsignedTransaction,
        use_ae: bool,
    ) -> Result<SignTxResult, Error>;

    /// Derive a receive address for on-device verification
    async fn receive_address(&self, req: &ReceiveAddressRequest) -> Result<String, Error>;

    /// Export the SLIP-0077 master blinding key
    async fn master_blinding_key(&self, only_if_silent: bool) -> Result<Vec<u8>, Error>;

    /// Fetch the blinding public key for an output script
    async fn blinding_key(&self, script: Vec<u8>) -> Result<Vec<u8>, Error>;

    /// Fetch the ECDH nonce shared with a counterparty key
    async fn shared_nonce(&self, script: Vec<u8>, their_pubkey: Vec<u8>)
        -> Result<Vec<u8>, Error>;

    /// Fetch deterministic blinding factors for a transaction's outputs
    async fn blinding_factors(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<BlindingFactorsResult, Error>;

    /// Cancellation handle for the operation currently in flight
    fn cancel_token(&self) -> CancelToken;
}

/// A connected signing device, dispatching by protocol family
pub enum Device<T: Transport> {
    Jade(Jade<T>),
    Ledger(Ledger<T>),
}

fn liquid_unsupported() -> Error {
    Error::InvalidArgument("device family does not support confidential assets".to_string())
}

#[async_trait]
impl<T: Transport> HwSigner for Device<T> {
    async fn xpubs(&self, network: Network, paths: &[Vec<u32>]) -> Result<Vec<String>, Error> {
        match self {
            Device::Jade(d) => d.xpubs(network, paths).await,
            Device::Ledger(d) => d.xpubs(network, paths).await,
        }
    }

    async fn sign_message(&self, req: &SignMessageRequest) -> Result<SignMessageResult, Error> {
        match self {
            Device::Jade(d) => d.sign_message(req).await,
            Device::Ledger(d) => d.sign_message(req).await,
        }
    }

    async fn sign_transaction(
        &self,
        network: Network,
        tx: &UnsignedTransaction,
        use_ae: bool,
    ) -> Result<SignTxResult, Error> {
        match self {
            Device::Jade(d) => d.sign_transaction(network, tx, use_ae).await,
            Device::Ledger(d) => d.sign_transaction(network, tx, use_ae).await,
        }
    }

    async fn sign_liquid_transaction(
        &self,
        network: Network,
        tx: &UnsignedTransaction,
        use_ae: bool,
    ) -> Result<SignTxResult, Error> {
        match self {
            Device::Jade(d) => d.sign_liquid_transaction(network, tx, use_ae).await,
            Device::Ledger(_) => Err(liquid_unsupported()),
        }
    }

    async fn receive_address(&self, req: &ReceiveAddressRequest) -> Result<String, Error> {
        match self {
            Device::Jade(d) => d.receive_address(req).await,
            Device::Ledger(_) => Err(Error::InvalidArgument(
                "device family does not support on-device address verification".to_string(),
            )),
        }
    }

    async fn master_blinding_key(&self, only_if_silent: bool) -> Result<Vec<u8>, Error> {
        match self {
            Device::Jade(d) => d.master_blinding_key(only_if_silent).await,
            Device::Ledger(_) => Err(liquid_unsupported()),
        }
    }

    async fn blinding_key(&self, script: Vec<u8>) -> Result<Vec<u8>, Error> {
        match self {
            Device::Jade(d) => d.blinding_key(script).await,
            Device::Ledger(_) => Err(liquid_unsupported()),
        }
    }

    async fn shared_nonce(
        &self,
        script: Vec<u8>,
        their_pubkey: Vec<u8>,
    ) -> Result<Vec<u8>, Error> {
        match self {
            Device::Jade(d) => d.shared_nonce(script, their_pubkey).await,
            Device::Ledger(_) => Err(liquid_unsupported()),
        }
    }

    async fn blinding_factors(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<BlindingFactorsResult, Error> {
        match self {
            Device::Jade(d) => d.blinding_factors(tx).await,
            Device::Ledger(_) => Err(liquid_unsupported()),
        }
    }

    fn cancel_token(&self) -> CancelToken {
        match self {
            Device::Jade(d) => d.cancel_token(),
            Device::Ledger(d) => d.cancel_token(),
        }
    }
}
