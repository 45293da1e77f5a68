//! RSA primitives for the signed-request handshake.
//!
//! # Algorithms
//!
//! - **Verification**: RSASSA-PKCS1-v1_5 over SHA-512 of the identifier bytes
//! - **Challenge**: RSAES-PKCS1-v1_5 encryption of the identifier bytes
//!
//! Keys arrive as PEM text from the key authority, either SPKI
//! (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`).

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha512};
use tracing::debug;

use crate::identity::Identifier;
use crate::keys::PublicKeyPem;
use crate::types::{Result, SiteError};

// =============================================================================
// Key Parsing
// =============================================================================

/// Parse a PEM public key in either SPKI or PKCS#1 form
pub fn parse_public_key(pem: &PublicKeyPem) -> Option<RsaPublicKey> {
    let text = pem.as_str().trim();
    RsaPublicKey::from_public_key_pem(text)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(text))
        .ok()
}

// =============================================================================
// Verification
// =============================================================================

/// Check that `signature_b64` is a valid RSA-SHA512 signature of the identifier.
///
/// Returns true only on an exact cryptographic match. Bad base64, an
/// unparseable key and a mismatching signature all return false.
pub fn verify(identifier: &Identifier, signature_b64: &str, public_key: &PublicKeyPem) -> bool {
    let Ok(signature) = STANDARD.decode(signature_b64.trim()) else {
        debug!("Signature is not valid base64");
        return false;
    };

    let Some(key) = parse_public_key(public_key) else {
        debug!("Public key could not be parsed");
        return false;
    };

    let digest = Sha512::digest(identifier.as_bytes());
    key.verify(Pkcs1v15Sign::new::<Sha512>(), &digest, &signature)
        .is_ok()
}

// =============================================================================
// Challenge Encryption
// =============================================================================

/// Encrypt the identifier under the authority's key.
///
/// # Errors
///
/// `EncryptionFailed` when the key cannot be parsed or the primitive rejects
/// the input (for example a modulus too small for the payload).
pub fn encrypt_for_challenge(identifier: &Identifier, public_key: &PublicKeyPem) -> Result<Vec<u8>> {
    let key = parse_public_key(public_key)
        .ok_or_else(|| SiteError::EncryptionFailed("unparseable public key".to_string()))?;

    key.encrypt(&mut OsRng, Pkcs1v15Encrypt, identifier.as_bytes())
        .map_err(|e| SiteError::EncryptionFailed(e.to_string()))
}
