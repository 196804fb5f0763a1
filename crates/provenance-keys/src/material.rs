//! Raw key material: generation, encoding, signing, and verification.
//!
//! Everything in this module that touches a private key is `pub(crate)`.
//! Private keys leave it only as PKCS#8 DER wrapped in `Zeroizing`, and only
//! to be sealed by `KeySealer`.

use ed25519_dalek::Signer as _;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use rsa::{
    pss,
    signature::{RandomizedSigner, SignatureEncoding, Verifier},
    RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use provenance_contracts::{
    error::{ProvenanceError, ProvenanceResult},
    key::KeyType,
};

/// Size reported for the fixed-size curves.
pub const CURVE_BITS: u32 = 256;

/// Largest RSA modulus the SPKI decoder accepts back.
pub const MAX_RSA_BITS: u32 = 4096;

/// An unsealed private key.
pub(crate) enum KeyMaterial {
    Rsa(Box<RsaPrivateKey>),
    Ecdsa(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

fn crypto_err(context: &str, e: impl std::fmt::Display) -> ProvenanceError {
    ProvenanceError::Crypto {
        reason: format!("{context}: {e}"),
    }
}

fn malformed(context: &str, e: impl std::fmt::Display) -> ProvenanceError {
    ProvenanceError::MalformedInput {
        reason: format!("{context}: {e}"),
    }
}

impl KeyMaterial {
    /// Generate a fresh key. Size validation is the manager's job; `bits`
    /// is only read for RSA.
    pub(crate) fn generate(key_type: KeyType, bits: u32) -> ProvenanceResult<Self> {
        debug!(%key_type, bits, "generating key material");
        let material = match key_type {
            KeyType::Rsa => {
                let key = RsaPrivateKey::new(&mut OsRng, bits as usize)
                    .map_err(|e| crypto_err("RSA key generation failed", e))?;
                KeyMaterial::Rsa(Box::new(key))
            }
            KeyType::Ecdsa => KeyMaterial::Ecdsa(p256::ecdsa::SigningKey::random(&mut OsRng)),
            KeyType::Ed25519 => KeyMaterial::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
        };
        Ok(material)
    }

    pub(crate) fn key_type(&self) -> KeyType {
        match self {
            KeyMaterial::Rsa(_) => KeyType::Rsa,
            KeyMaterial::Ecdsa(_) => KeyType::Ecdsa,
            KeyMaterial::Ed25519(_) => KeyType::Ed25519,
        }
    }

    /// SubjectPublicKeyInfo PEM with LF line endings.
    pub(crate) fn public_key_pem(&self) -> ProvenanceResult<String> {
        let pem = match self {
            KeyMaterial::Rsa(key) => RsaPublicKey::from(key.as_ref()).to_public_key_pem(LineEnding::LF),
            KeyMaterial::Ecdsa(key) => key.verifying_key().to_public_key_pem(LineEnding::LF),
            KeyMaterial::Ed25519(key) => key.verifying_key().to_public_key_pem(LineEnding::LF),
        };
        pem.map_err(|e| crypto_err("public key encoding failed", e))
    }

    pub(crate) fn to_pkcs8_der(&self) -> ProvenanceResult<Zeroizing<Vec<u8>>> {
        let doc = match self {
            KeyMaterial::Rsa(key) => key.to_pkcs8_der(),
            KeyMaterial::Ecdsa(key) => key.to_pkcs8_der(),
            KeyMaterial::Ed25519(key) => key.to_pkcs8_der(),
        }
        .map_err(|e| crypto_err("private key encoding failed", e))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub(crate) fn from_pkcs8_der(key_type: KeyType, der: &[u8]) -> ProvenanceResult<Self> {
        let material = match key_type {
            KeyType::Rsa => KeyMaterial::Rsa(Box::new(
                RsaPrivateKey::from_pkcs8_der(der).map_err(|e| crypto_err("RSA key decoding failed", e))?,
            )),
            KeyType::Ecdsa => KeyMaterial::Ecdsa(
                p256::ecdsa::SigningKey::from_pkcs8_der(der)
                    .map_err(|e| crypto_err("ECDSA key decoding failed", e))?,
            ),
            KeyType::Ed25519 => KeyMaterial::Ed25519(
                ed25519_dalek::SigningKey::from_pkcs8_der(der)
                    .map_err(|e| crypto_err("Ed25519 key decoding failed", e))?,
            ),
        };
        Ok(material)
    }

    /// RSA-PSS/SHA-256 (blinded, randomized salt), ECDSA P-256/SHA-256 with
    /// a random nonce, or plain Ed25519.
    pub(crate) fn sign(&self, data: &[u8]) -> Vec<u8> {
        match self {
            KeyMaterial::Rsa(key) => {
                let signer = pss::BlindedSigningKey::<Sha256>::new(key.as_ref().clone());
                let sig: pss::Signature = signer.sign_with_rng(&mut OsRng, data);
                sig.to_vec()
            }
            KeyMaterial::Ecdsa(key) => {
                let sig: p256::ecdsa::Signature = key.sign_with_rng(&mut OsRng, data);
                sig.to_vec()
            }
            KeyMaterial::Ed25519(key) => key.sign(data).to_bytes().to_vec(),
        }
    }
}

/// Check that `pem` parses as a public key of `key_type`.
pub fn validate_public_key(key_type: KeyType, pem: &str) -> ProvenanceResult<()> {
    match key_type {
        KeyType::Rsa => RsaPublicKey::from_public_key_pem(pem)
            .map(|_| ())
            .map_err(|e| malformed("invalid RSA public key", e)),
        KeyType::Ecdsa => p256::ecdsa::VerifyingKey::from_public_key_pem(pem)
            .map(|_| ())
            .map_err(|e| malformed("invalid ECDSA public key", e)),
        KeyType::Ed25519 => ed25519_dalek::VerifyingKey::from_public_key_pem(pem)
            .map(|_| ())
            .map_err(|e| malformed("invalid Ed25519 public key", e)),
    }
}

/// Verify `signature` over `data` against a bare public key.
///
/// A signature that is cryptographically wrong, or whose bytes do not even
/// parse as a signature of this scheme, yields `Ok(false)`. Only an
/// unusable public key is an error.
pub fn verify_with_public_key(
    key_type: KeyType,
    public_key_pem: &str,
    data: &[u8],
    signature: &[u8],
) -> ProvenanceResult<bool> {
    let valid = match key_type {
        KeyType::Rsa => {
            let public = RsaPublicKey::from_public_key_pem(public_key_pem)
                .map_err(|e| malformed("invalid RSA public key", e))?;
            let verifier = pss::VerifyingKey::<Sha256>::new(public);
            match pss::Signature::try_from(signature) {
                Ok(sig) => verifier.verify(data, &sig).is_ok(),
                Err(_) => false,
            }
        }
        KeyType::Ecdsa => {
            let verifier = p256::ecdsa::VerifyingKey::from_public_key_pem(public_key_pem)
                .map_err(|e| malformed("invalid ECDSA public key", e))?;
            match p256::ecdsa::Signature::from_slice(signature) {
                Ok(sig) => verifier.verify(data, &sig).is_ok(),
                Err(_) => false,
            }
        }
        KeyType::Ed25519 => {
            let verifier = ed25519_dalek::VerifyingKey::from_public_key_pem(public_key_pem)
                .map_err(|e| malformed("invalid Ed25519 public key", e))?;
            match ed25519_dalek::Signature::from_slice(signature) {
                Ok(sig) => verifier.verify(data, &sig).is_ok(),
                Err(_) => false,
            }
        }
    };
    if !valid {
        debug!(%key_type, "signature did not verify");
    }
    Ok(valid)
}
