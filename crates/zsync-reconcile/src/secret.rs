//! Placeholder credentials for newly created accounts.
//!
//! New accounts authenticate through the directory, so the initial password is
//! never handed to anyone. It only has to be unpredictable.

use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes behind each generated secret.
pub const SECRET_BYTES: usize = 24;

/// An initial account password. **Redacted in `Debug` output.**
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<REDACTED>)")
    }
}

/// Produces a fresh secret per call.
pub trait SecretGenerator {
    fn generate(&self) -> Secret;
}

/// OS CSPRNG, hex encoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRngSecretGenerator;

impl SecretGenerator for OsRngSecretGenerator {
    fn generate(&self) -> Secret {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Secret(hex::encode(bytes))
    }
}
