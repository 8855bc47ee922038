//! Cryptographic operation adapters.
//!
//! Stateless functions of (private key, input, digest). Nothing in this
//! module retains key material beyond a single call; callers own the key's
//! lifetime and scope it to one request.

pub mod decrypt;
pub mod error;
pub mod sign;

pub use decrypt::decrypt_premaster;
pub use error::CryptoError;
pub use sign::sign_transcript;

use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;

/// Digest algorithms accepted for ECDHE transcript signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Every supported digest, in preference order.
    pub const ALL: [DigestAlgorithm; 5] = [
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha224,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    /// Parse a wire digest name. Accepts dashed and undashed forms,
    /// case-insensitive (`SHA256`, `sha-256`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().replace('-', "").as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA224" => Some(Self::Sha224),
            "SHA256" => Some(Self::Sha256),
            "SHA384" => Some(Self::Sha384),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha224 => "SHA224",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }
}

/// Load a private key from PKCS8 DER bytes.
///
/// Failure here is an internal condition; the handler reports it to the
/// client only as `UNSPECIFIED`.
pub fn load_private_key(der: &[u8]) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_der(der).map_err(|e| CryptoError::key_decoding(e.to_string()))
}
