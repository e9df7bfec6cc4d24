// ============================================================================
// src/crypt/salt.rs – random salts for crypt(3)-style password hashes
// ============================================================================

use getrandom::getrandom;

use crate::error::{Error, Result};

/// The crypt(3) alphabet. Ordered for hash compatibility, not RFC 4648.
const ALPHABET: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Bounds and magic prefix of one hash scheme's salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt {
    pub magic_prefix: &'static str,

    pub salt_len_min: usize,
    pub salt_len_max: usize,

    pub rounds_min: u32,
    pub rounds_max: u32,
    pub rounds_default: u32,
}

impl Salt {
    /// Generate a random salt of `length` characters, clamped into
    /// `[salt_len_min, salt_len_max]`.
    pub fn generate(&self, length: usize) -> Result<String> {
        let length = self.clamp_len(length);
        let mut out = String::with_capacity(self.magic_prefix.len() + length);
        out.push_str(self.magic_prefix);
        out.push_str(&random_chars(length)?);
        Ok(out)
    }

    /// Like [`Salt::generate`], with an explicit `rounds=N$` segment.
    ///
    /// `None` takes `rounds_default`; anything else is clamped into
    /// `[rounds_min, rounds_max]`. The segment is left out when the resolved
    /// value is the default, since the hash format implies it.
    pub fn generate_with_rounds(&self, length: usize, rounds: Option<u32>) -> Result<String> {
        let length = self.clamp_len(length);
        let rounds = self.resolve_rounds(rounds);

        let mut out = String::with_capacity(self.magic_prefix.len() + 20 + length);
        out.push_str(self.magic_prefix);
        if rounds != self.rounds_default {
            out.push_str(&format!("rounds={rounds}$"));
        }
        out.push_str(&random_chars(length)?);
        Ok(out)
    }

    fn clamp_len(&self, length: usize) -> usize {
        length.clamp(self.salt_len_min, self.salt_len_max)
    }

    fn resolve_rounds(&self, rounds: Option<u32>) -> u32 {
        match rounds {
            None => self.rounds_default,
            Some(r) => r.clamp(self.rounds_min, self.rounds_max),
        }
    }
}

/// `length` alphabet characters drawn from `ceil(length*6/8)` random bytes.
fn random_chars(length: usize) -> Result<String> {
    let byte_len = (length * 6).div_ceil(8);
    let mut raw = vec![0u8; byte_len];
    getrandom(&mut raw).map_err(Error::RandomSource)?;

    let mut encoded = encode_24bit(&raw);
    encoded.truncate(length);
    Ok(encoded)
}

/// Encode bytes with the crypt alphabet, in little-endian 24-bit groups.
pub fn encode_24bit(src: &[u8]) -> String {
    let mut out = String::with_capacity((src.len() * 8).div_ceil(6));
    let sym = |v: u8| ALPHABET[(v & 0x3f) as usize] as char;

    for chunk in src.chunks(3) {
        match *chunk {
            [a, b, c] => {
                out.push(sym(a));
                out.push(sym((a >> 6) | (b << 2)));
                out.push(sym((b >> 4) | (c << 4)));
                out.push(sym(c >> 2));
            }
            [a, b] => {
                out.push(sym(a));
                out.push(sym((a >> 6) | (b << 2)));
                out.push(sym(b >> 4));
            }
            [a] => {
                out.push(sym(a));
                out.push(sym(a >> 6));
            }
            _ => unreachable!("chunks(3) yields one to three bytes"),
        }
    }
    out
}
