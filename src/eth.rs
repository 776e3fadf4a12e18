//! Hex parsing and secp256k1 address derivation.

use anyhow::Context as _;
use k256::ecdsa::SigningKey;
use sha3::{Digest as _, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

fn decode_fixed<const N: usize>(raw: &str) -> anyhow::Result<[u8; N]> {
    let bytes = hex::decode(raw).context("hex decode")?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected {}-byte hex, got {len}", N))
}

/// Private key, `0x` optional; short input is left-padded with zeros.
pub fn parse_hex_32(s: &str) -> anyhow::Result<[u8; 32]> {
    let s = s.trim();
    let raw = s.strip_prefix("0x").unwrap_or(s);
    decode_fixed(&format!("{raw:0>64}"))
}

/// Account address; the `0x` prefix is mandatory.
pub fn parse_hex_20(s: &str) -> anyhow::Result<[u8; 20]> {
    let raw = s
        .trim()
        .strip_prefix("0x")
        .context("address must start with 0x")?;
    decode_fixed(raw)
}

/// EIP-55 checksummed address controlled by `key`.
pub fn checksum_address(key: &SigningKey) -> String {
    let point = key.verifying_key().to_encoded_point(false);
    // Skip the 0x04 SEC1 tag; the address is the last 20 bytes of the hash.
    let digest = keccak256(&point.as_bytes()[1..]);
    let lower = hex::encode(&digest[12..]);

    let mask = keccak256(lower.as_bytes());
    let mut out = String::from("0x");
    out.extend(lower.chars().enumerate().map(|(i, ch)| {
        let shift = if i % 2 == 0 { 4 } else { 0 };
        let nibble = (mask[i / 2] >> shift) & 0x0f;
        if nibble >= 8 {
            ch.to_ascii_uppercase()
        } else {
            ch
        }
    }));
    out
}
