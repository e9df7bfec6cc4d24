// ============================================================================
// src/crypt/mod.rs – pluggable password hashing (hash + verify)
// ============================================================================

pub mod salt;
pub mod sha;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use salt::Salt;
pub use sha::ShaCrypt;

/// A password hashing scheme. The account manager holds one and never
/// inspects hashes itself.
pub trait Crypter: Send + Sync {
    /// Salt parameters of this scheme.
    fn salt(&self) -> &Salt;

    /// Turn `secret` into a storable hash using `salt` (magic prefix included).
    fn hash(&self, secret: &[u8], salt: &str) -> Result<String>;

    /// `Ok(())` when `candidate` produces `stored`, `PasswordMismatch` otherwise.
    fn verify(&self, stored: &str, candidate: &[u8]) -> Result<()>;

    /// Hash with a freshly generated salt.
    fn hash_fresh(&self, secret: &[u8], salt_len: usize, rounds: Option<u32>) -> Result<String> {
        let salt = self.salt().generate_with_rounds(salt_len, rounds)?;
        self.hash(secret, &salt)
    }
}

/// Hash schemes selectable from configuration (`ENCRYPT_METHOD`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Sha256,
    #[default]
    Sha512,
}

impl Method {
    pub fn from_login_defs(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SHA256" => Some(Self::Sha256),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn crypter(self) -> ShaCrypt {
        ShaCrypt::new(self)
    }
}
