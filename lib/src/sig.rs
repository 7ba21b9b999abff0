// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Signature normalisation helpers
//!
//! Message signatures arrive from the device base64-encoded in compact (or
//! recoverable) form and are converted to DER for the wallet session.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::Error;

/// Compact ECDSA signature length
pub const EC_SIGNATURE_LEN: usize = 64;

/// Recoverable signature length (leading recovery id byte)
pub const EC_SIGNATURE_RECOVERABLE_LEN: usize = 65;

/// Decode a base64 device signature and normalise it to DER
pub fn decode_message_signature(b64: &str) -> Result<Vec<u8>, Error> {
    let mut sig = BASE64
        .decode(b64)
        .map_err(|e| Error::Protocol(format!("invalid base64 signature: {e}")))?;

    // Truncate the recovery id byte of a recoverable signature
    if sig.len() == EC_SIGNATURE_RECOVERABLE_LEN {
        sig.remove(0);
    }
    if sig.len() != EC_SIGNATURE_LEN {
        return Err(Error::Protocol(format!(
            "unexpected signature length {}",
            sig.len()
        )));
    }

    let mut compact = [0u8; EC_SIGNATURE_LEN];
    compact.copy_from_slice(&sig);

    Ok(compact_to_der(&compact))
}

/// Convert a compact `r || s` signature to DER encoding
pub(crate) fn compact_to_der(sig: &[u8; EC_SIGNATURE_LEN]) -> Vec<u8> {
    let r = der_integer(&sig[..32]);
    let s = der_integer(&sig[32..]);

    let mut der = Vec::with_capacity(r.len() + s.len() + 2);
    der.push(0x30);
    der.push((r.len() + s.len()) as u8);
    der.extend_from_slice(&r);
    der.extend_from_slice(&s);
    der
}

/// Encode one signature scalar as a DER INTEGER
fn der_integer(scalar: &[u8]) -> Vec<u8> {
    // Minimal encoding: strip leading zeroes, keep one for the zero scalar
    let mut v: &[u8] = scalar;
    while v.len() > 1 && v[0] == 0 {
        v = &v[1..];
    }

    let pad = v[0] & 0x80 != 0;
    let len = v.len() + usize::from(pad);

    let mut out = Vec::with_capacity(len + 2);
    out.push(0x02);
    out.push(len as u8);
    if pad {
        out.push(0x00);
    }
    out.extend_from_slice(v);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_to_der_minimal() {
        let mut sig = [0u8; 64];
        sig[31] = 0x01;
        sig[63] = 0x02;

        assert_eq!(
            compact_to_der(&sig),
            vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn compact_to_der_pads_high_bit() {
        let mut sig = [0u8; 64];
        sig[0] = 0x80;
        sig[63] = 0x01;

        let der = compact_to_der(&sig);
        // r keeps all 32 bytes plus a zero pad byte
        assert_eq!(der[0], 0x30);
        assert_eq!(der[2], 0x02);
        assert_eq!(der[3], 33);
        assert_eq!(der[4], 0x00);
        assert_eq!(der[5], 0x80);
    }

    #[test]
    fn decode_strips_recovery_byte() {
        let mut raw = vec![0x1f];
        raw.extend_from_slice(&[0u8; 63]);
        raw.push(0x01);
        assert_eq!(raw.len(), 65);

        let b64 = base64::engine::general_purpose::STANDARD.encode(&raw);
        let der = decode_message_signature(&b64).unwrap();
        assert_eq!(der[0], 0x30);
    }

    #[test]
    fn decode_rejects_bad_length() {
        let b64 = base64::engine::general_purpose::STANDARD.encode([0u8; 10]);
        assert!(matches!(
            decode_message_signature(&b64),
            Err(Error::Protocol(_))
        ));
    }
}
