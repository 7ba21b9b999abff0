// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Hardware signer resolution library
//!
//! Resolves wallet signing requests against an attached hardware signer:
//! translating session-level requests (xpubs, messages, transactions,
//! confidential-asset material) into the device's wire protocol, running
//! the multi-round exchanges including the anti-exfiltration commitment
//! scheme, and folding every failure into a four-outcome error taxonomy
//! the caller can act on.
//!
//! The wallet session holds a [Device] behind the [HwSigner] capability
//! trait; per-device-family protocol code lives in [jade] and [ledger],
//! both driving a [Connection] over a caller-provided framed [Transport].

pub use hw_wire as wire;

mod builder;
mod error;
pub mod jade;
pub mod ledger;
mod sig;
mod signer;
pub mod transport;
pub mod types;

pub use error::Error;
pub use jade::Jade;
pub use ledger::Ledger;
pub use sig::{decode_message_signature, EC_SIGNATURE_LEN, EC_SIGNATURE_RECOVERABLE_LEN};
pub use signer::{Device, HwSigner};
pub use transport::{CancelToken, Connection, Transport, TransportError};
