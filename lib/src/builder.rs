// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Input / output model builders
//!
//! Translate the session-supplied [UnsignedTransaction] into the wire-level
//! descriptors the resolver packages into signing requests. Input ordering
//! is preserved exactly: `signature[i]` answers `inputs[i]`, so any
//! reordering here would misalign the returned signature list.
//!
//! Validation is fail-fast: a request that cannot be represented completely
//! (legacy input without its previous transaction, confidential input
//! without its value commitment, blinded output without blinding data) is
//! rejected with [Error::InvalidArgument] before any bytes reach the device.

use sha2::{Digest, Sha256};

use hw_wire::tx::{TrustedCommitment, TxChangeOutput, TxInput, TxInputBtc, TxInputLiquid};

use crate::{
    types::{AddressType, AeCommitment, TransactionInput, TransactionOutput, UnsignedTransaction},
    Error,
};

/// Wire descriptors plus host AE material for one signing operation
pub(crate) struct SigningPlan {
    /// Input descriptors, in the unsigned transaction's order
    pub inputs: Vec<TxInput>,
    /// Host AE material per input, empty when AE is off
    pub ae: Vec<AeCommitment>,
    /// Change descriptor per output
    pub change: Vec<Option<TxChangeOutput>>,
    /// Per-output trusted commitments, Liquid only
    pub trusted_commitments: Option<Vec<Option<TrustedCommitment>>>,
}

/// Build the signing plan for a plain (non-confidential) chain
pub(crate) fn plan_btc(tx: &UnsignedTransaction, use_ae: bool) -> Result<SigningPlan, Error> {
    if tx.inputs.is_empty() {
        return Err(Error::InvalidArgument("transaction has no inputs".into()));
    }

    let ae = ae_material(tx.inputs.len(), use_ae);

    let mut inputs = Vec::with_capacity(tx.inputs.len());
    for (i, input) in tx.inputs.iter().enumerate() {
        let witness = input.address_type.is_segwit();

        // Legacy inputs prove their amount with the full previous
        // transaction, witness inputs with script + satoshi
        let input_tx = match witness {
            true => None,
            false => match tx.previous_txs.get(&input.txhash) {
                Some(raw) => Some(raw.clone()),
                None => {
                    return Err(Error::InvalidArgument(format!(
                        "input {i}: previous transaction {} missing",
                        input.txhash
                    )))
                }
            },
        };

        inputs.push(TxInput::Btc(TxInputBtc {
            is_witness: witness,
            input_tx,
            script: Some(input.prevout_script.clone()),
            satoshi: witness.then_some(input.satoshi),
            path: input.user_path.clone(),
            ae_host_commitment: host_commitment(&ae, i),
        }));
    }

    Ok(SigningPlan {
        inputs,
        ae,
        change: change_outputs(&tx.outputs),
        trusted_commitments: None,
    })
}

/// Build the signing plan for a confidential (Liquid) chain
pub(crate) fn plan_liquid(tx: &UnsignedTransaction, use_ae: bool) -> Result<SigningPlan, Error> {
    if tx.inputs.is_empty() {
        return Err(Error::InvalidArgument("transaction has no inputs".into()));
    }

    let ae = ae_material(tx.inputs.len(), use_ae);

    let mut inputs = Vec::with_capacity(tx.inputs.len());
    for (i, input) in tx.inputs.iter().enumerate() {
        // A confidential input without its commitment data must never be
        // forwarded to the device
        if input.confidential && input.value_commitment.is_none() {
            return Err(Error::InvalidArgument(format!(
                "confidential input {i} lacks a trusted commitment"
            )));
        }

        inputs.push(TxInput::Liquid(TxInputLiquid {
            is_witness: input.address_type.is_segwit(),
            script: Some(input.prevout_script.clone()),
            value_commitment: input.value_commitment.clone(),
            path: input.user_path.clone(),
            ae_host_commitment: host_commitment(&ae, i),
        }));
    }

    let commitments = tx
        .outputs
        .iter()
        .enumerate()
        .map(|(i, out)| trusted_commitment(i, out))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(SigningPlan {
        inputs,
        ae,
        change: change_outputs(&tx.outputs),
        trusted_commitments: Some(commitments),
    })
}

/// Generate fresh host AE material, one slot per input
fn ae_material(n: usize, use_ae: bool) -> Vec<AeCommitment> {
    match use_ae {
        true => (0..n).map(|_| AeCommitment::generate()).collect(),
        false => vec![],
    }
}

fn host_commitment(ae: &[AeCommitment], i: usize) -> Option<Vec<u8>> {
    ae.get(i).map(|c| c.commitment().to_vec())
}

/// Change descriptors for outputs the device should auto-verify
pub(crate) fn change_outputs(outputs: &[TransactionOutput]) -> Vec<Option<TxChangeOutput>> {
    outputs
        .iter()
        .map(|out| {
            if !out.is_change {
                return None;
            }
            let csv_blocks = match out.address_type {
                Some(AddressType::Csv) => out.csv_blocks,
                _ => 0,
            };
            Some(TxChangeOutput {
                path: out.user_path.clone(),
                recovery_xpub: out.recovery_xpub.clone(),
                csv_blocks,
                variant: out
                    .address_type
                    .and_then(|at| at.descriptor_variant())
                    .map(str::to_string),
            })
        })
        .collect()
}

/// Trusted commitment for one output, `None` for unblinded outputs (fee)
fn trusted_commitment(
    i: usize,
    out: &TransactionOutput,
) -> Result<Option<TrustedCommitment>, Error> {
    if !out.is_blinded() {
        return Ok(None);
    }

    let missing =
        |field: &str| Error::InvalidArgument(format!("blinded output {i} lacks {field}"));

    Ok(Some(TrustedCommitment {
        asset_id: out.asset_id.clone().ok_or_else(|| missing("asset id"))?,
        value: out.satoshi,
        abf: out.abf.clone().ok_or_else(|| missing("asset blinder"))?,
        vbf: out.vbf.clone().ok_or_else(|| missing("amount blinder"))?,
        asset_generator: out.asset_generator.clone(),
        value_commitment: out.value_commitment.clone(),
        blinding_key: out
            .blinding_key
            .clone()
            .ok_or_else(|| missing("blinding key"))?,
    }))
}

/// `hash_prevouts` over the transaction's inputs, committing the blinding
/// factor derivation to this exact input set
pub(crate) fn hash_prevouts(inputs: &[TransactionInput]) -> Result<[u8; 32], Error> {
    let mut buff = Vec::with_capacity(inputs.len() * 36);

    for (i, input) in inputs.iter().enumerate() {
        let mut txid = hex::decode(&input.txhash)
            .map_err(|_| Error::InvalidArgument(format!("input {i}: malformed txid")))?;
        if txid.len() != 32 {
            return Err(Error::InvalidArgument(format!(
                "input {i}: malformed txid"
            )));
        }
        // Display hex is big-endian, the hash commits to wire order
        txid.reverse();

        buff.extend_from_slice(&txid);
        buff.extend_from_slice(&input.pt_idx.to_le_bytes());
    }

    let once = Sha256::digest(&buff);
    Ok(Sha256::digest(once).into())
}
