// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Multi-round signing flows
//!
//! Two wire sequencings share this module. With anti-exfiltration (AE)
//! engaged, each `tx_input` round-trip returns the device's signer
//! commitment, and only once every commitment is in hand does the host
//! reveal its committed entropy via `get_signature` to collect the actual
//! signatures. Without AE, all `tx_input` frames are written back-to-back
//! and the device streams one signature result per input in request order.
//!
//! On any failure the ids of still-outstanding requests are marked
//! cancelled on the connection, so response frames that surface later are
//! dropped instead of corrupting the next operation.

use log::debug;
use serde_bytes::ByteBuf;

use hw_wire::{
    message::{GetSignatureParams, SignMessageParams},
    tx::SignTxParams,
    Method,
};

use crate::{
    builder::{self, SigningPlan},
    sig,
    transport::{CancelToken, Connection, ConnectionState, Transport},
    types::{Network, SignMessageRequest, SignMessageResult, SignTxResult, UnsignedTransaction},
    Error,
};

pub(crate) async fn sign_message<T: Transport>(
    conn: &Connection<T>,
    cancel: &CancelToken,
    req: &SignMessageRequest,
) -> Result<SignMessageResult, Error> {
    let ae = match req.use_ae_protocol {
        true => Some(req.ae.clone().ok_or_else(|| {
            Error::InvalidArgument("AE message signing requires host commitment material".into())
        })?),
        false => None,
    };

    let mut state = conn.lock().await;
    let timeout = conn.user_timeout();

    let params = SignMessageParams {
        message: req.message.clone(),
        path: req.path.clone(),
        ae_host_commitment: ae.as_ref().map(|c| c.commitment().to_vec()),
    };

    match ae {
        Some(ae) => {
            // Round one returns the signer commitment, the signature is
            // withheld until the host entropy is revealed
            let signer_commitment: ByteBuf = state
                .request(Method::SignMessage, params, timeout, cancel)
                .await?;
            debug!("message signer commitment received, revealing entropy");

            let signature: String = state
                .request(
                    Method::GetSignature,
                    GetSignatureParams {
                        ae_host_entropy: ae.reveal().to_vec(),
                    },
                    timeout,
                    cancel,
                )
                .await?;

            Ok(SignMessageResult {
                signature: sig::decode_message_signature(&signature)?,
                signer_commitment: Some(signer_commitment.into_vec()),
            })
        }
        None => {
            let signature: String = state
                .request(Method::SignMessage, params, timeout, cancel)
                .await?;

            Ok(SignMessageResult {
                signature: sig::decode_message_signature(&signature)?,
                signer_commitment: None,
            })
        }
    }
}

pub(crate) async fn sign_transaction<T: Transport>(
    conn: &Connection<T>,
    cancel: &CancelToken,
    network: Network,
    tx: &UnsignedTransaction,
    use_ae: bool,
) -> Result<SignTxResult, Error> {
    // All validation and AE material generation happens before the
    // connection is taken; a rejected request sends no frames at all
    let (method, plan) = match network.is_liquid() {
        true => (Method::SignLiquidTx, builder::plan_liquid(tx, use_ae)?),
        false => (Method::SignTx, builder::plan_btc(tx, use_ae)?),
    };

    let params = SignTxParams {
        change: plan.change.clone(),
        network: network.to_string(),
        num_inputs: plan.inputs.len() as u32,
        trusted_commitments: plan.trusted_commitments.clone(),
        use_ae_signatures: use_ae,
        txn: tx.txn.clone(),
    };

    let mut state = conn.lock().await;

    debug!(
        "signing {} inputs on {network} (ae={use_ae})",
        plan.inputs.len()
    );

    let ack: bool = state
        .request(method, params, conn.request_timeout(), cancel)
        .await?;
    if !ack {
        return Err(Error::Protocol(
            "device refused the signing request".to_string(),
        ));
    }

    match use_ae {
        true => sign_inputs_ae(&mut state, conn, cancel, &plan).await,
        false => sign_inputs_legacy(&mut state, conn, cancel, &plan).await,
    }
}

/// AE sequencing: commit, collect the device commitments, then reveal
async fn sign_inputs_ae<T: Transport>(
    state: &mut ConnectionState<T>,
    conn: &Connection<T>,
    cancel: &CancelToken,
    plan: &SigningPlan,
) -> Result<SignTxResult, Error> {
    let timeout = conn.user_timeout();
    let mut signer_commitments = Vec::with_capacity(plan.inputs.len());

    for input in &plan.inputs {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let id = state.post(Method::TxInput, input).await?;
        let commitment: ByteBuf = match state.recv_result(id, timeout, cancel).await {
            Ok(c) => c,
            Err(e) => {
                state.mark_cancelled(id);
                return Err(e);
            }
        };
        signer_commitments.push(commitment.into_vec());
    }

    // Entropy reveal is only reachable with the full commitment set
    assert_eq!(signer_commitments.len(), plan.ae.len());
    debug!("all signer commitments received, revealing host entropy");

    let mut signatures = Vec::with_capacity(plan.ae.len());
    for ae in &plan.ae {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let id = state
            .post(
                Method::GetSignature,
                GetSignatureParams {
                    ae_host_entropy: ae.reveal().to_vec(),
                },
            )
            .await?;
        let signature: ByteBuf = match state.recv_result(id, timeout, cancel).await {
            Ok(s) => s,
            Err(e) => {
                state.mark_cancelled(id);
                return Err(e);
            }
        };
        signatures.push(signature.into_vec());
    }

    Ok(SignTxResult {
        signatures,
        signer_commitments,
    })
}

/// Legacy sequencing: write every input descriptor, then read the
/// signatures back in request order
async fn sign_inputs_legacy<T: Transport>(
    state: &mut ConnectionState<T>,
    conn: &Connection<T>,
    cancel: &CancelToken,
    plan: &SigningPlan,
) -> Result<SignTxResult, Error> {
    let timeout = conn.user_timeout();

    let mut ids = Vec::with_capacity(plan.inputs.len());
    for input in &plan.inputs {
        if cancel.is_cancelled() {
            for id in &ids {
                state.mark_cancelled(*id);
            }
            return Err(Error::Cancelled);
        }
        ids.push(state.post(Method::TxInput, input).await?);
    }

    let mut signatures = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        let signature: ByteBuf = match state.recv_result(*id, timeout, cancel).await {
            Ok(s) => s,
            Err(e) => {
                for id in &ids[i..] {
                    state.mark_cancelled(*id);
                }
                return Err(e);
            }
        };
        signatures.push(signature.into_vec());
    }

    Ok(SignTxResult {
        signatures,
        signer_commitments: vec![],
    })
}
