//! ECDHE transcript signing.
//!
//! In a classic ECDHE_RSA exchange the holder of the certificate's private
//! key signs the handshake transcript hash; this adapter performs that
//! signature on the proxy's behalf.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use super::{CryptoError, DigestAlgorithm};

/// Sign the base64 `input` with `key` using the named digest and PKCS#1
/// v1.5 padding, returning the base64 signature.
pub fn sign_transcript(
    input: &str,
    key: &RsaPrivateKey,
    digest: DigestAlgorithm,
) -> Result<String, CryptoError> {
    let data = STANDARD
        .decode(input.trim())
        .map_err(|e| CryptoError::input_decoding(e.to_string()))?;

    let signature = match digest {
        DigestAlgorithm::Sha1 => key.sign(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(&data)),
        DigestAlgorithm::Sha224 => key.sign(Pkcs1v15Sign::new::<Sha224>(), &Sha224::digest(&data)),
        DigestAlgorithm::Sha256 => key.sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(&data)),
        DigestAlgorithm::Sha384 => key.sign(Pkcs1v15Sign::new::<Sha384>(), &Sha384::digest(&data)),
        DigestAlgorithm::Sha512 => key.sign(Pkcs1v15Sign::new::<Sha512>(), &Sha512::digest(&data)),
    }
    .map_err(|e| CryptoError::signing(e.to_string()))?;

    Ok(STANDARD.encode(signature))
}
