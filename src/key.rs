//! Private keys for the supported algorithms
//!
//! [`KeyPair`] is a closed tagged union: every algorithm-specific step
//! (public key derivation, signing, private key encoding) is a `match` over
//! its variants.

use std::fmt;

use rand_core::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use sha2::Sha256;
use x509_cert::der::asn1::{Any, ObjectIdentifier};
use x509_cert::der::{Decode, Tag};
use x509_cert::spki::{AlgorithmIdentifierOwned, EncodePublicKey, SubjectPublicKeyInfoOwned};
use zeroize::Zeroizing;

use crate::error::{CertgenError, Result};
use crate::params::{EcdsaCurve, KeyAlgorithm};

/// Smallest RSA modulus accepted for generation.
pub const MIN_RSA_BITS: usize = 1024;

/// PEM label of PKCS#1 RSA private keys.
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// PEM label of SEC1 EC private keys.
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";

const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const ECDSA_WITH_SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// A freshly generated private key; its public half is derived on demand.
///
/// Owned exclusively by the generation call that created it and never cached.
pub enum KeyPair {
    Rsa(RsaPrivateKey),
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl KeyPair {
    /// Generate a key pair for `algorithm` from the operating system CSPRNG.
    pub fn generate(algorithm: &KeyAlgorithm) -> Result<Self> {
        let key = match *algorithm {
            KeyAlgorithm::Rsa { bits } => {
                if bits < MIN_RSA_BITS {
                    return Err(CertgenError::KeyGeneration(format!(
                        "RSA key size of {bits} bits is below the {MIN_RSA_BITS}-bit minimum"
                    )));
                }
                let key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
                    CertgenError::KeyGeneration(format!("failed to generate RSA-{bits} key: {e}"))
                })?;
                Self::Rsa(key)
            }
            KeyAlgorithm::Ecdsa(EcdsaCurve::P224) => Self::P224(p224::SecretKey::random(&mut OsRng)),
            KeyAlgorithm::Ecdsa(EcdsaCurve::P256) => Self::P256(p256::SecretKey::random(&mut OsRng)),
            KeyAlgorithm::Ecdsa(EcdsaCurve::P384) => Self::P384(p384::SecretKey::random(&mut OsRng)),
            KeyAlgorithm::Ecdsa(EcdsaCurve::P521) => Self::P521(p521::SecretKey::random(&mut OsRng)),
        };
        log::debug!("Generated {} private key", key.algorithm());
        Ok(key)
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Rsa(key) => KeyAlgorithm::Rsa {
                bits: key.size() * 8,
            },
            Self::P224(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P224),
            Self::P256(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P256),
            Self::P384(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P384),
            Self::P521(_) => KeyAlgorithm::Ecdsa(EcdsaCurve::P521),
        }
    }

    /// SubjectPublicKeyInfo of the public half.
    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let document = match self {
            Self::Rsa(key) => key.to_public_key().to_public_key_der(),
            Self::P224(key) => key.public_key().to_public_key_der(),
            Self::P256(key) => key.public_key().to_public_key_der(),
            Self::P384(key) => key.public_key().to_public_key_der(),
            Self::P521(key) => key.public_key().to_public_key_der(),
        }
        .map_err(|e| CertgenError::Serialization(format!("failed to encode public key: {e}")))?;

        SubjectPublicKeyInfoOwned::from_der(document.as_bytes())
            .map_err(|e| CertgenError::Serialization(format!("failed to decode public key: {e}")))
    }

    /// Algorithm identifier of the signatures produced by [`KeyPair::sign`].
    pub fn signature_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
        let (oid, parameters) = match self {
            // PKCS#1 signature algorithms carry an explicit NULL parameter
            Self::Rsa(_) => {
                let null = Any::new(Tag::Null, Vec::<u8>::new()).map_err(|e| {
                    CertgenError::Serialization(format!("failed to encode NULL parameter: {e}"))
                })?;
                (SHA256_WITH_RSA, Some(null))
            }
            Self::P224(_) => (ECDSA_WITH_SHA224, None),
            Self::P256(_) => (ECDSA_WITH_SHA256, None),
            Self::P384(_) => (ECDSA_WITH_SHA384, None),
            Self::P521(_) => (ECDSA_WITH_SHA512, None),
        };
        Ok(AlgorithmIdentifierOwned { oid, parameters })
    }

    /// Sign `msg`: PKCS#1 v1.5 over SHA-256 for RSA, DER-encoded ECDSA with
    /// the curve's matching SHA-2 digest otherwise.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let signature = match self {
            Self::Rsa(key) => {
                let signer = RsaSigningKey::<Sha256>::new(key.clone());
                Signer::<rsa::pkcs1v15::Signature>::try_sign(&signer, msg).map(|sig| sig.to_vec())
            }
            Self::P224(key) => {
                let signer = p224::ecdsa::SigningKey::from(key);
                Signer::<p224::ecdsa::Signature>::try_sign(&signer, msg)
                    .map(|sig| sig.to_der().as_bytes().to_vec())
            }
            Self::P256(key) => {
                let signer = p256::ecdsa::SigningKey::from(key);
                Signer::<p256::ecdsa::Signature>::try_sign(&signer, msg)
                    .map(|sig| sig.to_der().as_bytes().to_vec())
            }
            Self::P384(key) => {
                let signer = p384::ecdsa::SigningKey::from(key);
                Signer::<p384::ecdsa::Signature>::try_sign(&signer, msg)
                    .map(|sig| sig.to_der().as_bytes().to_vec())
            }
            Self::P521(key) => p521::ecdsa::SigningKey::from_bytes(&key.to_bytes()).and_then(
                |signer| {
                    Signer::<p521::ecdsa::Signature>::try_sign(&signer, msg)
                        .map(|sig| sig.to_der().as_bytes().to_vec())
                },
            ),
        };
        signature.map_err(|e| {
            CertgenError::Serialization(format!("failed to sign with {} key: {e}", self.algorithm()))
        })
    }

    /// Private key DER: PKCS#1 for RSA, SEC1 (with curve OID and public key) for ECDSA.
    pub fn private_key_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let der = match self {
            Self::Rsa(key) => key
                .to_pkcs1_der()
                .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
                .map_err(|e| e.to_string()),
            Self::P224(key) => key.to_sec1_der().map_err(|e| e.to_string()),
            Self::P256(key) => key.to_sec1_der().map_err(|e| e.to_string()),
            Self::P384(key) => key.to_sec1_der().map_err(|e| e.to_string()),
            Self::P521(key) => key.to_sec1_der().map_err(|e| e.to_string()),
        };
        der.map_err(|e| {
            CertgenError::Serialization(format!(
                "Unable to marshal {} private key: {e}",
                self.algorithm()
            ))
        })
    }

    /// PEM block type matching [`KeyPair::private_key_der`].
    pub fn pem_label(&self) -> &'static str {
        match self {
            Self::Rsa(_) => RSA_PRIVATE_KEY_LABEL,
            Self::P224(_) | Self::P256(_) | Self::P384(_) | Self::P521(_) => EC_PRIVATE_KEY_LABEL,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_undersized_rsa() {
        let err = KeyPair::generate(&KeyAlgorithm::Rsa { bits: 512 }).unwrap_err();
        assert!(matches!(err, CertgenError::KeyGeneration(_)), "{err}");
    }

    #[test]
    fn labels_follow_algorithm() {
        for curve in EcdsaCurve::ALL {
            let key = KeyPair::generate(&KeyAlgorithm::Ecdsa(curve)).unwrap();
            assert_eq!(key.pem_label(), EC_PRIVATE_KEY_LABEL);
            assert_eq!(key.algorithm(), KeyAlgorithm::Ecdsa(curve));
            assert!(key.signature_algorithm().unwrap().parameters.is_none());
        }

        let key = KeyPair::generate(&KeyAlgorithm::Rsa { bits: 2048 }).unwrap();
        assert_eq!(key.pem_label(), RSA_PRIVATE_KEY_LABEL);
        assert_eq!(key.algorithm(), KeyAlgorithm::Rsa { bits: 2048 });
        assert_eq!(key.signature_algorithm().unwrap().oid, SHA256_WITH_RSA);
    }

    #[test]
    fn sec1_key_starts_with_version_one() {
        let key = KeyPair::generate(&KeyAlgorithm::Ecdsa(EcdsaCurve::P256)).unwrap();
        let der = key.private_key_der().unwrap();
        // SEQUENCE { INTEGER 1, OCTET STRING ... }
        assert_eq!(der[0], 0x30);
        assert_eq!(&der[2..5], &[0x02, 0x01, 0x01]);
    }

    #[test]
    fn debug_hides_key_material() {
        let key = KeyPair::generate(&KeyAlgorithm::Ecdsa(EcdsaCurve::P384)).unwrap();
        assert_eq!(format!("{key:?}"), "KeyPair { algorithm: Ecdsa(P384), .. }");
    }
}
