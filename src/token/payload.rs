//! Scan payload wire format.
//!
//! A payload is URL-safe base64 (unpadded) of a compact JSON object:
//!
//! ```text
//! v2 (current): {"i":"<entity id>","t":"<token>","v":2}
//! v1 (legacy):  {"id":"<entity id>","t":"<token>","v":1}
//! ```
//!
//! Only v2 is ever encoded. Both decode, so cards printed before the format
//! change keep scanning.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Version written by [`encode_payload`].
pub const CURRENT_VERSION: u8 = 2;

/// Legacy version still accepted by [`decode_payload`].
pub const LEGACY_VERSION: u8 = 1;

/// Longest scanned input considered for decoding, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 2048;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// Older encoders used the standard alphabet with padding.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The identity claim carried by a decoded payload. Not yet authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanClaim {
    pub entity_id: String,
    pub token: String,
}

/// Current compact payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactPayload {
    #[serde(rename = "i")]
    pub entity_id: String,
    #[serde(rename = "t")]
    pub token: String,
    #[serde(rename = "v")]
    pub version: u8,
}

/// Legacy payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyPayload {
    #[serde(rename = "id")]
    pub entity_id: String,
    #[serde(rename = "t")]
    pub token: String,
}

/// A payload decoded under the schema of its declared version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPayload {
    V1(LegacyPayload),
    V2(CompactPayload),
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    v: Option<u64>,
}

impl ScanPayload {
    /// Parse decoded JSON bytes, dispatching on the `v` field.
    ///
    /// A missing `v` is treated as the legacy version.
    fn from_json(bytes: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
        let probe: VersionProbe = serde_json::from_value(value.clone()).ok()?;

        match probe.v {
            None | Some(1) => serde_json::from_value(value).ok().map(ScanPayload::V1),
            Some(2) => serde_json::from_value(value).ok().map(ScanPayload::V2),
            Some(_) => None,
        }
    }

    /// Format version of this payload.
    pub fn version(&self) -> u8 {
        match self {
            ScanPayload::V1(_) => LEGACY_VERSION,
            ScanPayload::V2(_) => CURRENT_VERSION,
        }
    }

    /// Collapse into the version-independent claim.
    pub fn into_claim(self) -> ScanClaim {
        match self {
            ScanPayload::V1(p) => ScanClaim {
                entity_id: p.entity_id,
                token: p.token,
            },
            ScanPayload::V2(p) => ScanClaim {
                entity_id: p.entity_id,
                token: p.token,
            },
        }
    }
}

/// Encode a scan payload at the current version.
pub fn encode_payload(entity_id: &str, token: &str) -> String {
    let payload = CompactPayload {
        entity_id: entity_id.to_string(),
        token: token.to_string(),
        version: CURRENT_VERSION,
    };
    // Serializing two strings and an integer cannot fail.
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode any supported payload version.
///
/// Returns `None` on bad base64, bad JSON, unknown versions, missing or
/// empty fields. Never panics.
pub fn decode_payload(payload: &str) -> Option<ScanClaim> {
    decode_versioned(payload).map(ScanPayload::into_claim)
}

/// Decode a payload, keeping its version.
pub fn decode_versioned(payload: &str) -> Option<ScanPayload> {
    let trimmed = payload.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_PAYLOAD_LEN {
        return None;
    }

    let bytes = URL_SAFE_LENIENT
        .decode(trimmed)
        .or_else(|_| STANDARD_LENIENT.decode(trimmed))
        .ok()?;

    let decoded = ScanPayload::from_json(&bytes)?;
    let claim_is_complete = match &decoded {
        ScanPayload::V1(p) => !p.entity_id.is_empty() && !p.token.is_empty(),
        ScanPayload::V2(p) => !p.entity_id.is_empty() && !p.token.is_empty(),
    };
    claim_is_complete.then_some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(entity_id: &str, token: &str) -> ScanClaim {
        ScanClaim {
            entity_id: entity_id.to_string(),
            token: token.to_string(),
        }
    }

    fn encode_json(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    #[test]
    fn test_encode_is_compact_and_unpadded() {
        let payload = encode_payload("student-42", "d81b14b851e19212");
        assert_eq!(
            payload,
            "eyJpIjoic3R1ZGVudC00MiIsInQiOiJkODFiMTRiODUxZTE5MjEyIiwidiI6Mn0"
        );
        assert!(!payload.contains('='));
        assert!(!payload.contains('+'));
        assert!(!payload.contains('/'));
    }

    #[test]
    fn test_round_trip() {
        for (id, token) in [
            ("student-42", "d81b14b851e19212"),
            ("NIS/2024/0007", "0123456789abcdef"),
            ("siswa ü ñ 名前", "ffffffffffffffff"),
        ] {
            assert_eq!(decode_payload(&encode_payload(id, token)), Some(claim(id, token)));
        }
    }

    #[test]
    fn test_current_version_tag() {
        let decoded = decode_versioned(&encode_payload("a", "b")).unwrap();
        assert_eq!(decoded.version(), CURRENT_VERSION);
    }

    #[test]
    fn test_legacy_payload_decodes() {
        assert_eq!(
            decode_payload("eyJpZCI6IlgiLCJ0IjoiWSIsInYiOjF9"),
            Some(claim("X", "Y"))
        );
        let decoded = decode_versioned("eyJpZCI6IlgiLCJ0IjoiWSIsInYiOjF9").unwrap();
        assert_eq!(decoded.version(), LEGACY_VERSION);
    }

    #[test]
    fn test_legacy_without_version_decodes() {
        let payload = encode_json(r#"{"id":"X","t":"Y"}"#);
        assert_eq!(decode_payload(&payload), Some(claim("X", "Y")));
    }

    #[test]
    fn test_standard_alphabet_fallback() {
        // Padded, standard alphabet, contains '/'
        let payload = "eyJpZCI6InNpc3dhfjA/PiIsInQiOiJkODFiMTRiODUxZTE5MjEyIiwidiI6MX0=";
        assert_eq!(
            decode_payload(payload),
            Some(claim("siswa~0?>", "d81b14b851e19212"))
        );
    }

    #[test]
    fn test_padded_url_safe_accepted() {
        let payload = format!("{}=", encode_payload("ab", "cd"));
        // Only accepted when the padding is canonical; either way no panic.
        let _ = decode_payload(&payload);
        let padded = base64::engine::general_purpose::URL_SAFE.encode(br#"{"i":"ab","t":"cd","v":2}"#);
        assert_eq!(decode_payload(&padded), Some(claim("ab", "cd")));
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let payload = format!("  {}\n", encode_payload("student-1", "abc"));
        assert_eq!(decode_payload(&payload), Some(claim("student-1", "abc")));
    }

    #[test]
    fn test_mixed_keys_rejected_by_version() {
        // v2 requires the compact keys
        assert_eq!(decode_payload(&encode_json(r#"{"id":"X","t":"Y","v":2}"#)), None);
        // v1 requires the legacy keys
        assert_eq!(decode_payload(&encode_json(r#"{"i":"X","t":"Y","v":1}"#)), None);
    }

    #[test]
    fn test_unknown_version_rejected() {
        assert_eq!(decode_payload(&encode_json(r#"{"i":"X","t":"Y","v":3}"#)), None);
        assert_eq!(decode_payload(&encode_json(r#"{"i":"X","t":"Y","v":"2"}"#)), None);
    }

    #[test]
    fn test_missing_or_empty_fields_rejected() {
        for json in [
            r#"{"i":"X","v":2}"#,
            r#"{"t":"Y","v":2}"#,
            r#"{"i":"","t":"Y","v":2}"#,
            r#"{"i":"X","t":"","v":2}"#,
            r#"{"id":"X","v":1}"#,
            r#"{"i":42,"t":"Y","v":2}"#,
            r#"[]"#,
            r#""string""#,
            r#"null"#,
        ] {
            assert_eq!(decode_payload(&encode_json(json)), None, "json {}", json);
        }
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert_eq!(decode_payload(""), None);
        assert_eq!(decode_payload("!!!"), None);
        assert_eq!(decode_payload(&encode_json("{not json")), None);
        assert_eq!(decode_payload(&"A".repeat(MAX_PAYLOAD_LEN + 4)), None);
    }
}
