// Copyright (c) 2022-2023 The MobileCoin Foundation

//! APDU framing for the Ledger bitcoin app
//!
//! Commands are the classic 5-byte header (`cla ins p1 p2 len`) followed by
//! up to 255 bytes of payload; responses carry a trailing two-byte status
//! word. Status words map onto the resolver outcomes here so the device
//! layer only ever sees payload bytes or an [Error].

use crate::Error;

/// Application class byte for the bitcoin app
pub const CLA: u8 = 0xe0;

/// Maximum payload per APDU frame
pub const MAX_DATA_LEN: usize = 255;

/// Success status word
pub const SW_OK: u16 = 0x9000;

/// On-device rejection status words
pub const SW_DENIED: u16 = 0x6985;
pub const SW_NOT_ALLOWED: u16 = 0x6982;

/// Bitcoin app instructions used by the resolver
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum Instruction {
    /// Fetch a public key / chain code for a derivation path
    GetWalletPublicKey = 0x40,
    /// Start hashing an untrusted transaction input set
    HashInputStart = 0x44,
    /// Sign the currently hashed input
    HashSign = 0x48,
    /// Provide the transaction outputs and finalize the hash
    HashInputFinalizeFull = 0x4a,
    /// Sign an arbitrary message
    SignMessage = 0x4e,
}

/// One APDU command frame
#[derive(Clone, Debug, PartialEq)]
pub struct Apdu {
    pub ins: Instruction,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl Apdu {
    pub fn new(ins: Instruction, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self { ins, p1, p2, data }
    }

    /// Encode to the 5-byte header plus payload
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        if self.data.len() > MAX_DATA_LEN {
            return Err(Error::InvalidArgument(format!(
                "APDU payload of {} bytes exceeds the frame limit",
                self.data.len()
            )));
        }

        let mut buff = Vec::with_capacity(5 + self.data.len());
        buff.push(CLA);
        buff.push(self.ins as u8);
        buff.push(self.p1);
        buff.push(self.p2);
        buff.push(self.data.len() as u8);
        buff.extend_from_slice(&self.data);
        Ok(buff)
    }
}

/// Strip and check the status word of a response frame, returning the
/// payload bytes
pub fn parse_response(frame: &[u8]) -> Result<Vec<u8>, Error> {
    if frame.len() < 2 {
        return Err(Error::Protocol(format!(
            "APDU response of {} bytes lacks a status word",
            frame.len()
        )));
    }

    let (payload, sw) = frame.split_at(frame.len() - 2);
    let sw = u16::from_be_bytes([sw[0], sw[1]]);

    match sw {
        SW_OK => Ok(payload.to_vec()),
        SW_DENIED | SW_NOT_ALLOWED => Err(Error::Cancelled),
        _ => Err(Error::Protocol(format!("device status {sw:#06x}"))),
    }
}

/// Bitcoin-style variable length integer
pub fn write_varint(buff: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buff.push(n as u8),
        0xfd..=0xffff => {
            buff.push(0xfd);
            buff.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            buff.push(0xfe);
            buff.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buff.push(0xff);
            buff.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// BIP32 path serialization, one byte count then big-endian elements
pub fn write_path(buff: &mut Vec<u8>, path: &[u32]) -> Result<(), Error> {
    if path.len() > 10 {
        return Err(Error::InvalidArgument(
            "derivation path too deep".to_string(),
        ));
    }
    buff.push(path.len() as u8);
    for p in path {
        buff.extend_from_slice(&p.to_be_bytes());
    }
    Ok(())
}
