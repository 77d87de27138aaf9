//! Certificate template construction and self-signing
//!
//! A [`CertificateTemplate`] is built fresh for each generation call from the
//! caller's [`CertParams`] and a random serial number, signed once with the
//! freshly generated key, and dropped.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::der::asn1::{
    BitString, GeneralizedTime, Ia5String, ObjectIdentifier, OctetString, UtcTime,
};
use x509_cert::der::oid::AssociatedOid;
use x509_cert::der::{DateTime as DerDateTime, Encode};
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName,
    SubjectKeyIdentifier,
};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};

use crate::error::{CertgenError, Result};
use crate::key::KeyPair;
use crate::params::{CertParams, DEFAULT_ORGANIZATION};

/// Serial numbers are drawn uniformly from [0, 2^128).
pub const SERIAL_NUMBER_BYTES: usize = 16;

/// id-kp-serverAuth (RFC 5280, 4.2.1.12)
const ID_KP_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");

/// Length of the SHA-256 based subject key identifier (RFC 7093, method 1).
const KEY_IDENTIFIER_LEN: usize = 20;

/// One Subject Alternative Name entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanEntry {
    Dns(String),
    Ip(IpAddr),
}

impl fmt::Display for SanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns(name) => write!(f, "DNS:{name}"),
            Self::Ip(ip) => write!(f, "IP:{ip}"),
        }
    }
}

impl SanEntry {
    fn to_general_name(&self) -> Result<GeneralName> {
        match self {
            Self::Dns(name) => Ia5String::new(name)
                .map(GeneralName::DnsName)
                .map_err(|e| {
                    CertgenError::Serialization(format!("invalid DNS name '{name}' in SAN: {e}"))
                }),
            Self::Ip(ip) => {
                let octets = match ip {
                    IpAddr::V4(v4) => v4.octets().to_vec(),
                    IpAddr::V6(v6) => v6.octets().to_vec(),
                };
                OctetString::new(octets)
                    .map(GeneralName::IpAddress)
                    .map_err(|e| der_failure("IP address SAN", e))
            }
        }
    }
}

/// Classify each host as an IP SAN when it parses as an IP literal, a DNS SAN otherwise.
///
/// Input order is kept; nothing is deduplicated or validated.
pub fn classify_hosts(hosts: &[String]) -> Vec<SanEntry> {
    hosts
        .iter()
        .map(|host| match host.parse::<IpAddr>() {
            Ok(ip) => SanEntry::Ip(ip.to_canonical()),
            Err(_) => SanEntry::Dns(host.clone()),
        })
        .collect()
}

/// Draw a serial number uniformly from [0, 2^128) using the OS CSPRNG.
pub fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        CertgenError::KeyGeneration(format!("failed to generate serial number: {e}"))
    })?;
    serial_from_be_bytes(&bytes)
}

/// Encode an unsigned big-endian value as a minimal, non-negative INTEGER.
fn serial_from_be_bytes(bytes: &[u8]) -> Result<SerialNumber> {
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    let significant = bytes.get(first..).unwrap_or_default();

    let mut encoded = Vec::with_capacity(significant.len() + 1);
    if significant.first().is_none_or(|b| b & 0x80 != 0) {
        encoded.push(0);
    }
    encoded.extend_from_slice(significant);

    SerialNumber::new(&encoded).map_err(|e| der_failure("serial number", e))
}

/// Fields of one self-signed certificate, before signing.
#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    pub serial_number: SerialNumber,
    /// Also used as issuer.
    pub subject: Name,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub subject_alt_names: Vec<SanEntry>,
    pub is_ca: bool,
}

impl CertificateTemplate {
    pub fn new(params: &CertParams, serial_number: SerialNumber) -> Result<Self> {
        let subject = Name::from_str(&format!("O={DEFAULT_ORGANIZATION}"))
            .map_err(|e| der_failure("subject name", e))?;

        Ok(Self {
            serial_number,
            subject,
            not_before: params.valid_from,
            not_after: params.not_after()?,
            subject_alt_names: classify_hosts(&params.hosts),
            is_ca: params.is_ca,
        })
    }

    pub fn dns_names(&self) -> impl Iterator<Item = &str> {
        self.subject_alt_names.iter().filter_map(|san| match san {
            SanEntry::Dns(name) => Some(name.as_str()),
            SanEntry::Ip(_) => None,
        })
    }

    pub fn ip_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.subject_alt_names.iter().filter_map(|san| match san {
            SanEntry::Ip(ip) => Some(*ip),
            SanEntry::Dns(_) => None,
        })
    }

    /// Key encipherment and digital signature, plus certificate signing for a CA.
    pub fn key_usage(&self) -> KeyUsage {
        let mut usage = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);
        if self.is_ca {
            usage.0 |= KeyUsages::KeyCertSign;
        }
        usage
    }

    fn extensions(&self, public_key: &SubjectPublicKeyInfoOwned) -> Result<Vec<Extension>> {
        let mut extensions = vec![
            extension(&self.key_usage(), true)?,
            extension(&ExtendedKeyUsage(vec![ID_KP_SERVER_AUTH]), false)?,
            extension(
                &BasicConstraints {
                    ca: self.is_ca,
                    path_len_constraint: None,
                },
                true,
            )?,
        ];

        if self.is_ca {
            let digest = Sha256::digest(public_key.subject_public_key.raw_bytes());
            let identifier = OctetString::new(&digest[..KEY_IDENTIFIER_LEN])
                .map_err(|e| der_failure("subject key identifier", e))?;
            extensions.push(extension(&SubjectKeyIdentifier(identifier), false)?);
        }

        if !self.subject_alt_names.is_empty() {
            let names = self
                .subject_alt_names
                .iter()
                .map(SanEntry::to_general_name)
                .collect::<Result<Vec<_>>>()?;
            extensions.push(extension(&SubjectAltName(names), false)?);
        }

        Ok(extensions)
    }

    /// Sign the template with `key`, using the template as both subject and issuer.
    ///
    /// Returns the DER encoding of the resulting certificate.
    pub fn self_sign(&self, key: &KeyPair) -> Result<Vec<u8>> {
        let public_key = key.public_key_info()?;
        let signature_algorithm = key.signature_algorithm()?;
        let extensions = self.extensions(&public_key)?;

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: self.serial_number.clone(),
            signature: signature_algorithm.clone(),
            issuer: self.subject.clone(),
            validity: Validity {
                not_before: x509_time(self.not_before)?,
                not_after: x509_time(self.not_after)?,
            },
            subject: self.subject.clone(),
            subject_public_key_info: public_key,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        };

        let tbs_der = tbs_certificate
            .to_der()
            .map_err(|e| der_failure("TBS certificate", e))?;
        let signature = key.sign(&tbs_der)?;

        let certificate = Certificate {
            tbs_certificate,
            signature_algorithm,
            signature: BitString::from_bytes(&signature)
                .map_err(|e| der_failure("signature", e))?,
        };
        certificate
            .to_der()
            .map_err(|e| der_failure("certificate", e))
    }
}

fn extension<T: AssociatedOid + Encode>(value: &T, critical: bool) -> Result<Extension> {
    let der = value
        .to_der()
        .map_err(|e| der_failure(&format!("extension {}", T::OID), e))?;
    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(der).map_err(|e| der_failure("extension value", e))?,
    })
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280, 4.1.2.5).
fn x509_time(at: DateTime<Utc>) -> Result<Time> {
    let seconds = u64::try_from(at.timestamp()).map_err(|_| {
        CertgenError::Serialization(format!("validity bound {at} is before the Unix epoch"))
    })?;
    let date_time = DerDateTime::from_unix_duration(StdDuration::from_secs(seconds))
        .map_err(|e| der_failure("validity bound", e))?;

    if date_time.year() < 2050 {
        UtcTime::from_date_time(date_time)
            .map(Time::UtcTime)
            .map_err(|e| der_failure("validity bound", e))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

fn der_failure(what: &str, e: x509_cert::der::Error) -> CertgenError {
    CertgenError::Serialization(format!("Failed to encode {what}: {e}"))
}
