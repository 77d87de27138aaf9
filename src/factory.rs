//! Certificate pair generation and PEM encoding
//!
//! [`generate`] runs the three phases of one generation call (key pair,
//! template, self-signature) and [`encode_pem`] turns the result into the
//! two PEM blocks handed to TLS stacks. Both are stateless: nothing is kept
//! between calls apart from the entropy consumed from the OS.

use pem::{EncodeConfig, LineEnding, Pem};
use zeroize::Zeroizing;

use crate::error::{CertgenError, Result};
use crate::key::KeyPair;
use crate::params::CertParams;
use crate::template::{CertificateTemplate, random_serial};

/// PEM label of X.509 certificates.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Output of one generation call: the private key and its self-signed certificate.
#[derive(Debug)]
pub struct GeneratedCert {
    pub key: KeyPair,
    pub certificate_der: Vec<u8>,
}

impl GeneratedCert {
    /// PKCS#1 (RSA) or SEC1 (ECDSA) encoding of the private key.
    pub fn private_key_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.key.private_key_der()
    }

    /// PEM block type of the private key.
    pub fn key_label(&self) -> &'static str {
        self.key.pem_label()
    }
}

/// PEM-encoded certificate and private key.
#[derive(Clone, PartialEq, Eq)]
pub struct PemPair {
    pub cert: String,
    pub key: String,
}

impl std::fmt::Debug for PemPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemPair")
            .field("cert", &self.cert)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Generate a key pair and a certificate for it, signed by itself.
pub fn generate(params: &CertParams) -> Result<GeneratedCert> {
    log::debug!(
        "Generating {} certificate for {:?} (ca: {})",
        params.key_algorithm,
        params.hosts,
        params.is_ca
    );

    let key = KeyPair::generate(&params.key_algorithm)?;
    let serial_number = random_serial()?;

    let template = CertificateTemplate::new(params, serial_number)?;
    log::debug!(
        "Certificate template valid {} .. {} with SANs [{}]",
        template.not_before,
        template.not_after,
        template
            .subject_alt_names
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let certificate_der = template.self_sign(&key)?;
    log::debug!("Self-signed certificate is {} bytes", certificate_der.len());

    Ok(GeneratedCert {
        key,
        certificate_der,
    })
}

/// Encode both halves of a generated pair as PEM.
///
/// The certificate is always a `CERTIFICATE` block; the key is an
/// `RSA PRIVATE KEY` (PKCS#1) or `EC PRIVATE KEY` (SEC1) block.
pub fn encode_pem(generated: &GeneratedCert) -> Result<PemPair> {
    let key_der = generated.private_key_der()?;
    let key_block = Pem::new(generated.key_label(), key_der.to_vec());
    let cert_block = Pem::new(CERTIFICATE_LABEL, generated.certificate_der.clone());

    Ok(PemPair {
        cert: encode_block(&cert_block),
        key: encode_block(&key_block),
    })
}

fn encode_block(block: &Pem) -> String {
    pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

impl TryFrom<&GeneratedCert> for PemPair {
    type Error = CertgenError;

    fn try_from(generated: &GeneratedCert) -> Result<Self> {
        encode_pem(generated)
    }
}
