//! RSA premaster-secret decryption.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

use super::CryptoError;

/// Decrypt the base64 `input` premaster secret with `key` (PKCS#1 v1.5
/// padding), returning the base64 plaintext.
///
/// The error path never says why decryption failed: a wrong key and bad
/// padding produce the same [`CryptoError::Decryption`], so nothing
/// downstream can turn this adapter into a padding oracle.
pub fn decrypt_premaster(input: &str, key: &RsaPrivateKey) -> Result<String, CryptoError> {
    let ciphertext = STANDARD
        .decode(input.trim())
        .map_err(|e| CryptoError::input_decoding(e.to_string()))?;

    let plaintext = key
        .decrypt(Pkcs1v15Encrypt, &ciphertext)
        .map_err(|_| CryptoError::Decryption)?;

    Ok(STANDARD.encode(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap()
    }

    #[test]
    fn test_premaster_round_trip() {
        let key = test_key();
        // 48-byte premaster secret as a TLS client would send it
        let premaster: Vec<u8> = (0u8..48).collect();
        let ciphertext = key
            .to_public_key()
            .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, &premaster)
            .unwrap();

        let plaintext_b64 = decrypt_premaster(&STANDARD.encode(ciphertext), &key).unwrap();
        assert_eq!(STANDARD.decode(plaintext_b64).unwrap(), premaster);
    }

    #[test]
    fn test_wrong_key_and_garbage_fail_identically() {
        let key = test_key();
        let other_key = test_key();
        let ciphertext = key
            .to_public_key()
            .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, b"secret")
            .unwrap();

        let wrong_key = decrypt_premaster(&STANDARD.encode(&ciphertext), &other_key);
        let garbage = decrypt_premaster(&STANDARD.encode(vec![0u8; 128]), &key);

        assert!(matches!(wrong_key, Err(CryptoError::Decryption)));
        assert!(matches!(garbage, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_invalid_base64_input() {
        let key = test_key();
        let result = decrypt_premaster("%%%", &key);
        assert!(matches!(result, Err(CryptoError::InputDecoding(_))));
    }
}
