// ============================================================================
// src/crypt/sha.rs – SHA-256-crypt ($5$) and SHA-512-crypt ($6$)
// ============================================================================

use crate::crypt::{Crypter, Method, Salt};
use crate::error::{Error, Result};

pub const SHA256_SALT: Salt = Salt {
    magic_prefix: "$5$",
    salt_len_min: 1,
    salt_len_max: 16,
    rounds_min: 1000,
    rounds_max: 999_999_999,
    rounds_default: 5000,
};

pub const SHA512_SALT: Salt = Salt {
    magic_prefix: "$6$",
    salt_len_min: 1,
    salt_len_max: 16,
    rounds_min: 1000,
    rounds_max: 999_999_999,
    rounds_default: 5000,
};

/// glibc-compatible SHA-crypt.
#[derive(Debug, Clone)]
pub struct ShaCrypt {
    method: Method,
    salt: Salt,
}

impl ShaCrypt {
    pub fn new(method: Method) -> Self {
        let salt = match method {
            Method::Sha256 => SHA256_SALT,
            Method::Sha512 => SHA512_SALT,
        };
        Self { method, salt }
    }
}

impl Crypter for ShaCrypt {
    fn salt(&self) -> &Salt {
        &self.salt
    }

    fn hash(&self, secret: &[u8], salt: &str) -> Result<String> {
        let hashed = match self.method {
            // $5$ rows still exist in older tables and ENCRYPT_METHOD may ask for them.
            #[allow(deprecated)]
            Method::Sha256 => pwhash::sha256_crypt::hash_with(salt, secret),
            Method::Sha512 => pwhash::sha512_crypt::hash_with(salt, secret),
        };
        hashed.map_err(|e| Error::Hash(e.to_string()))
    }

    // Stored hashes may predate the configured method, so dispatch on the
    // prefix actually found on disk.
    fn verify(&self, stored: &str, candidate: &[u8]) -> Result<()> {
        if pwhash::unix::verify(candidate, stored) {
            Ok(())
        } else {
            Err(Error::PasswordMismatch)
        }
    }
}
