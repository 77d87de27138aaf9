//! Error type shared by every certificate generation phase

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Errors produced while generating, encoding or delivering a certificate pair.
///
/// The variant names the phase that failed. Nothing is emitted partially:
/// a failed call leaves no certificate behind, so retrying (with fresh
/// randomness) is always safe.
#[derive(Debug, thiserror::Error)]
pub enum CertgenError {
    /// Entropy source failure or invalid key parameters (key pair or serial number).
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    /// Template encoding, self-signing or PEM encoding failed.
    #[error("Certificate serialization failed: {0}")]
    Serialization(String),
    /// Writing a PEM block to a file or writer failed.
    #[error("Failed to write {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },
    /// Unparseable user input (start date, duration, curve name, config file).
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The HTTPS server could not bind or stopped with an error.
    #[error("HTTPS server on {addr} failed: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The generated pair could not be installed into a TLS server configuration.
    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),
}

impl CertgenError {
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            target: path.into().display().to_string(),
            source,
        }
    }

    pub(crate) fn io_on(target: &str, source: io::Error) -> Self {
        Self::Io {
            target: target.to_string(),
            source,
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T, E = CertgenError> = std::result::Result<T, E>;
