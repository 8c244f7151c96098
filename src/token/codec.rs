//! HMAC-SHA256 token derivation and constant-time verification.

use ring::hmac;
use subtle::ConstantTimeEq;

use super::payload::{decode_payload, encode_payload};

/// Length of a token in hex characters (64 bits of the digest).
pub const TOKEN_LEN: usize = 16;

const TOKEN_BYTES: usize = TOKEN_LEN / 2;

/// Token issued for an entity, ready to be printed on a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCard {
    pub entity_id: String,
    pub token: String,
    pub payload: String,
}

/// Token codec bound to a single process-wide secret.
///
/// Holds the prepared HMAC key so repeated derivations do not rebuild it.
pub struct TokenCodec {
    key: hmac::Key,
}

impl TokenCodec {
    /// Create a codec for the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    /// Derive the token for an entity.
    ///
    /// Deterministic for a fixed secret. An empty `entity_id` is accepted and
    /// yields a valid token; callers reject empty identifiers upstream.
    pub fn derive(&self, entity_id: &str) -> String {
        let tag = hmac::sign(&self.key, entity_id.as_bytes());
        hex::encode(&tag.as_ref()[..TOKEN_BYTES])
    }

    /// Check a candidate token against the one derived for `entity_id`.
    pub fn verify(&self, candidate: &str, entity_id: &str) -> bool {
        let expected = self.derive(entity_id);
        constant_time_eq(candidate.as_bytes(), expected.as_bytes())
    }

    /// Derive a token and wrap it in a scan payload.
    pub fn issue(&self, entity_id: &str) -> IssuedCard {
        let token = self.derive(entity_id);
        let payload = encode_payload(entity_id, &token);
        IssuedCard {
            entity_id: entity_id.to_string(),
            token,
            payload,
        }
    }

    /// Decode a scanned payload and authenticate its token.
    ///
    /// Returns the entity id only when both steps succeed. Malformed input
    /// and a wrong token are indistinguishable to the caller.
    pub fn validate_scan(&self, payload: &str) -> Option<String> {
        let claim = decode_payload(payload)?;
        if self.verify(&claim.token, &claim.entity_id) {
            Some(claim.entity_id)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

/// Derive the token for `entity_id` under `secret`.
pub fn derive_token(entity_id: &str, secret: &[u8]) -> String {
    TokenCodec::new(secret).derive(entity_id)
}

/// Verify `candidate` against the token derived for `entity_id`.
pub fn verify_token(candidate: &str, entity_id: &str, secret: &[u8]) -> bool {
    TokenCodec::new(secret).verify(candidate, entity_id)
}

/// Decode and authenticate a scanned payload under `secret`.
pub fn validate_scan(payload: &str, secret: &[u8]) -> Option<String> {
    TokenCodec::new(secret).validate_scan(payload)
}

/// Compare two byte strings without an early exit on mismatch.
///
/// Length is not secret: a length mismatch returns at once.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    xor_accumulate(a.iter().zip(b.iter())).ct_eq(&0).into()
}

/// OR together the XOR of every pair. Every pair is consumed.
fn xor_accumulate<'a, I>(pairs: I) -> u8
where
    I: Iterator<Item = (&'a u8, &'a u8)>,
{
    pairs.fold(0u8, |acc, (x, y)| acc | (x ^ y))
}
