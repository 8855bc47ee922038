//! Wire shapes for the signing protocol.
//!
//! The request is a single JSON object; the response is exactly one of two
//! envelopes: `{"ok":true,"data":<base64>}` on success or
//! `{"ok":false,"error":<code>}` on failure. Both field sets are stable.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::DigestAlgorithm;

/// Stable wire error codes.
///
/// These four identities are the only errors the protocol may emit; every
/// internal failure is mapped to exactly one of them before crossing the
/// trust boundary. They drive different proxy-side behavior, so the set and
/// the spellings are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Client input invalid: bad JSON, missing fields, unknown method.
    MalformedRequest,
    /// No key provisioned for the fingerprint (includes "store unreachable",
    /// degraded to a per-request miss).
    NotFound,
    /// Reserved policy-rejection code. Stable on the wire; no internal
    /// condition currently raises it.
    RequestDenied,
    /// Any internal failure: crypto, key decoding, serialization.
    Unspecified,
}

impl ErrorCode {
    /// Wire spelling of the code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "MALFORMED_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::RequestDenied => "REQUEST_DENIED",
            Self::Unspecified => "UNSPECIFIED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dispatched private-key operation, with ECDHE's digest resolved at
/// parse time so later states never see an unvalidated combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Sign an ECDHE transcript hash with the named digest.
    Sign {
        /// Digest the transcript is hashed with before signing.
        digest: DigestAlgorithm,
    },
    /// Decrypt an RSA premaster secret.
    Decrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum RawMethod {
    #[serde(rename = "ECDHE")]
    Ecdhe,
    #[serde(rename = "RSA")]
    Rsa,
}

#[derive(Deserialize)]
struct RawRequest {
    method: RawMethod,
    spki: String,
    input: String,
    #[serde(default)]
    hash: Option<String>,
}

/// A validated inbound request. Immutable once parsed; validity is a pure
/// function of its fields, checked exactly once here.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// The operation to dispatch.
    pub operation: Operation,
    /// Certificate fingerprint used as the key-store lookup key. Opaque:
    /// no particular hash algorithm or encoding is assumed.
    pub spki: String,
    /// Base64-encoded operand bytes.
    pub input: String,
}

impl SigningRequest {
    /// Parse and validate a raw request body.
    ///
    /// Malformed JSON, missing or empty required fields, an unrecognized
    /// `method`, or a missing/unknown digest for `ECDHE` all map to
    /// [`ErrorCode::MalformedRequest`]. The `hash` field is ignored for
    /// `RSA` requests.
    pub fn parse(body: &[u8]) -> Result<Self, ErrorCode> {
        let raw: RawRequest = serde_json::from_slice(body).map_err(|e| {
            debug!(error = %e, "Rejected unparseable request body");
            ErrorCode::MalformedRequest
        })?;

        if raw.spki.trim().is_empty() || raw.input.is_empty() {
            debug!("Rejected request with empty spki or input");
            return Err(ErrorCode::MalformedRequest);
        }

        let operation = match raw.method {
            RawMethod::Ecdhe => {
                let name = raw.hash.as_deref().unwrap_or("");
                let digest =
                    DigestAlgorithm::from_name(name).ok_or(ErrorCode::MalformedRequest)?;
                Operation::Sign { digest }
            }
            RawMethod::Rsa => Operation::Decrypt,
        };

        Ok(Self {
            operation,
            spki: raw.spki,
            input: raw.input,
        })
    }
}

/// Best-effort fingerprint extraction for audit logging. Never fails; an
/// unparseable body simply yields nothing.
#[must_use]
pub fn peek_fingerprint(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Peek {
        spki: Option<String>,
    }
    serde_json::from_slice::<Peek>(body).ok()?.spki
}

/// Outcome of one handled request: a success payload or a classified
/// failure. Never both. Converted to wire JSON only at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Operation succeeded; `data` is base64 of the raw operation output.
    Success {
        /// Base64-encoded result bytes.
        data: String,
    },
    /// Operation failed with a stable wire code.
    Failure {
        /// The classified error.
        code: ErrorCode,
    },
}

#[derive(Serialize)]
struct SuccessEnvelope<'a> {
    ok: bool,
    data: &'a str,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    ok: bool,
    error: &'static str,
}

impl Outcome {
    /// Shorthand failure constructor.
    #[must_use]
    pub fn failure(code: ErrorCode) -> Self {
        Outcome::Failure { code }
    }

    /// Serialize the wire envelope.
    #[must_use]
    pub fn to_json(&self) -> String {
        let serialized = match self {
            Outcome::Success { data } => serde_json::to_string(&SuccessEnvelope { ok: true, data }),
            Outcome::Failure { code } => serde_json::to_string(&ErrorEnvelope {
                ok: false,
                error: code.as_str(),
            }),
        };
        serialized.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Response serialization failed");
            format!(r#"{{"ok":false,"error":"{}"}}"#, ErrorCode::Unspecified)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_ecdhe_request() {
        let body = json!({
            "method": "ECDHE",
            "spki": "abc123",
            "input": "aGVsbG8=",
            "hash": "SHA256"
        });
        let request = SigningRequest::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            request.operation,
            Operation::Sign {
                digest: DigestAlgorithm::Sha256
            }
        );
        assert_eq!(request.spki, "abc123");
    }

    #[test]
    fn test_parse_valid_rsa_request_ignores_hash() {
        let body = json!({
            "method": "RSA",
            "spki": "abc123",
            "input": "aGVsbG8=",
            "hash": "not-a-digest"
        });
        let request = SigningRequest::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(request.operation, Operation::Decrypt);
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        assert_eq!(
            SigningRequest::parse(b"{not json").unwrap_err(),
            ErrorCode::MalformedRequest
        );
        assert_eq!(
            SigningRequest::parse(b"").unwrap_err(),
            ErrorCode::MalformedRequest
        );
    }

    #[test]
    fn test_parse_rejects_unknown_method() {
        let body = json!({"method": "DSA", "spki": "abc", "input": "aGk="});
        assert_eq!(
            SigningRequest::parse(body.to_string().as_bytes()).unwrap_err(),
            ErrorCode::MalformedRequest
        );
    }

    #[test]
    fn test_parse_rejects_missing_and_empty_fields() {
        let missing = json!({"method": "RSA", "input": "aGk="});
        let empty_spki = json!({"method": "RSA", "spki": "  ", "input": "aGk="});
        let empty_input = json!({"method": "RSA", "spki": "abc", "input": ""});
        for body in [missing, empty_spki, empty_input] {
            assert_eq!(
                SigningRequest::parse(body.to_string().as_bytes()).unwrap_err(),
                ErrorCode::MalformedRequest
            );
        }
    }

    #[test]
    fn test_parse_rejects_ecdhe_without_usable_digest() {
        let missing = json!({"method": "ECDHE", "spki": "abc", "input": "aGk="});
        let unknown = json!({"method": "ECDHE", "spki": "abc", "input": "aGk=", "hash": "MD5"});
        for body in [missing, unknown] {
            assert_eq!(
                SigningRequest::parse(body.to_string().as_bytes()).unwrap_err(),
                ErrorCode::MalformedRequest
            );
        }
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::MalformedRequest.as_str(), "MALFORMED_REQUEST");
        assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
        assert_eq!(ErrorCode::RequestDenied.as_str(), "REQUEST_DENIED");
        assert_eq!(ErrorCode::Unspecified.as_str(), "UNSPECIFIED");
    }

    #[test]
    fn test_success_envelope_shape() {
        let outcome = Outcome::Success {
            data: "c2ln".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(value, json!({"ok": true, "data": "c2ln"}));
    }

    #[test]
    fn test_error_envelope_shape() {
        let outcome = Outcome::failure(ErrorCode::NotFound);
        let value: serde_json::Value = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(value, json!({"ok": false, "error": "NOT_FOUND"}));
    }

    #[test]
    fn test_peek_fingerprint() {
        assert_eq!(
            peek_fingerprint(br#"{"spki":"abc123"}"#).as_deref(),
            Some("abc123")
        );
        assert_eq!(peek_fingerprint(b"junk"), None);
        assert_eq!(peek_fingerprint(br#"{"method":"RSA"}"#), None);
    }
}
