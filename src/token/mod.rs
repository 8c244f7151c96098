//! QR attendance tokens.
//!
//! A token is the first 64 bits of HMAC-SHA256(secret, entity id), hex
//! encoded. It is never stored: issuance and verification both recompute it.
//! The token travels inside a compact scan payload printed on ID cards.
//!
//! Every function here is total. Untrusted scan input yields `None` or
//! `false`, never an error or a panic.

mod codec;
mod payload;

pub use codec::{derive_token, validate_scan, verify_token, IssuedCard, TokenCodec, TOKEN_LEN};
pub use payload::{
    decode_payload, decode_versioned, encode_payload, CompactPayload, LegacyPayload, ScanClaim,
    ScanPayload, CURRENT_VERSION, LEGACY_VERSION, MAX_PAYLOAD_LEN,
};
