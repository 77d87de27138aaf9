//! Self-signed X.509 certificate generation for TLS
//!
//! `certgen` turns a [`CertParams`] value into a freshly generated private key
//! (RSA or ECDSA on P-224/P-256/P-384/P-521) and a certificate signed by that
//! same key, then PEM-encodes both so any standard TLS key pair loader can
//! use them.
//!
//! ```no_run
//! use certgen::{CertParams, EcdsaCurve, KeyAlgorithm};
//!
//! let params = CertParams::with_defaults()
//!     .hosts("example.com,10.0.0.1,::1")
//!     .key_algorithm(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
//!
//! let pair = certgen::generate_to_memory(&params)?;
//! assert!(pair.cert.starts_with("-----BEGIN CERTIFICATE-----"));
//! # Ok::<(), certgen::CertgenError>(())
//! ```
//!
//! Every call is independent: nothing is cached, and a failed call emits
//! nothing, so callers may simply retry.

pub mod error;
pub mod factory;
pub mod key;
pub mod output;
pub mod params;
pub mod server;
pub mod template;

// Public exports
pub use error::{CertgenError, Result};
pub use factory::{CERTIFICATE_LABEL, GeneratedCert, PemPair, encode_pem, generate};
pub use key::KeyPair;
pub use output::{generate_to_file, generate_to_memory, generate_to_writer};
pub use params::{
    CertParams, DEFAULT_ORGANIZATION, DEFAULT_RSA_BITS, EcdsaCurve, KeyAlgorithm,
    parse_start_date, split_hosts,
};
pub use server::{serve_tls, serve_tls_with_handle, tls_server_config};
