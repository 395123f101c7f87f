// C4 ID encoding
// Digest bytes -> base58 (order-preserving alphabet) -> padded, prefixed text

use super::digest::{Sha512Digest, DIGEST_LENGTH};
use super::error::{C4Error, Result};

/// Base58 alphabet in ascending ASCII order, so string order matches numeric order.
pub const C4_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Every C4 ID starts with this prefix.
pub const C4_PREFIX: &str = "c4";

/// Total length of a C4 ID, prefix included.
pub const C4_ID_LENGTH: usize = 90;

/// Length of the base58 part of a C4 ID.
pub const ENCODED_LENGTH: usize = C4_ID_LENGTH - C4_PREFIX.len();

const BASE: u32 = 58;

/// Encode a digest as a 90 character C4 ID.
pub fn encode(digest: &Sha512Digest) -> String {
    let encoded = b58encode(digest);
    let padding = ENCODED_LENGTH.saturating_sub(encoded.len());

    let mut id = String::with_capacity(C4_PREFIX.len() + padding + encoded.len());
    id.push_str(C4_PREFIX);
    id.extend(std::iter::repeat('1').take(padding));
    id.push_str(&encoded);
    id
}

/// Base58 encode `bytes` read as a big-endian unsigned integer.
///
/// Leading zero bytes carry no value, so a zero input encodes as the single
/// symbol `1` and no other leading `1`s are produced.
pub fn b58encode(bytes: &[u8]) -> String {
    // Work on the significant bytes only; the number is repeatedly divided by 58
    // and the remainders collected least significant first.
    let mut number: Vec<u8> = bytes.iter().copied().skip_while(|&b| b == 0).collect();
    let mut digits: Vec<u8> = Vec::with_capacity(ENCODED_LENGTH);

    while !number.is_empty() {
        let mut remainder = 0u32;
        let mut quotient = Vec::with_capacity(number.len());
        for &byte in &number {
            let acc = (remainder << 8) | u32::from(byte);
            let q = acc / BASE;
            remainder = acc % BASE;
            if !quotient.is_empty() || q != 0 {
                quotient.push(q as u8);
            }
        }
        digits.push(C4_ALPHABET[remainder as usize]);
        number = quotient;
    }

    if digits.is_empty() {
        digits.push(C4_ALPHABET[0]);
    }

    digits.reverse();
    // Alphabet is ASCII.
    digits.into_iter().map(char::from).collect()
}

/// Decode the text of a C4 ID back to its digest.
pub fn decode(id: &str) -> Result<Sha512Digest> {
    let invalid = |reason| C4Error::InvalidId {
        id: id.to_string(),
        reason,
    };

    if id.len() != C4_ID_LENGTH {
        return Err(invalid("expected exactly 90 characters"));
    }
    let encoded = id
        .strip_prefix(C4_PREFIX)
        .ok_or_else(|| invalid("missing \"c4\" prefix"))?;

    let mut digest = [0u8; DIGEST_LENGTH];
    for symbol in encoded.bytes() {
        let value = symbol_value(symbol).ok_or_else(|| invalid("character outside the base58 alphabet"))?;

        // digest = digest * 58 + value, most significant byte first in the array
        let mut carry = u32::from(value);
        for byte in digest.iter_mut().rev() {
            let acc = u32::from(*byte) * BASE + carry;
            *byte = (acc & 0xff) as u8;
            carry = acc >> 8;
        }
        if carry != 0 {
            return Err(invalid("value does not fit in 512 bits"));
        }
    }
    Ok(digest)
}

fn symbol_value(symbol: u8) -> Option<u8> {
    C4_ALPHABET
        .iter()
        .position(|&s| s == symbol)
        .map(|p| p as u8)
}
