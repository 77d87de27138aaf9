//! HTTPS bootstrap with an ephemeral self-signed certificate
//!
//! The generated PEM pair goes through the standard rustls PEM loaders and
//! into an aws-lc-rs backed [`ServerConfig`]; [`serve_tls`] then serves an axum
//! router with it. One pair is generated per call and never written to disk.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use rustls::ServerConfig;
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{CertgenError, Result};
use crate::factory::PemPair;
use crate::output::generate_to_memory;
use crate::params::CertParams;

/// Load a PEM pair into a rustls server configuration (ALPN h2 and http/1.1).
///
/// Fails with [`CertgenError::Tls`] when the key does not match the
/// certificate or uses a curve the provider cannot sign with (P-224).
pub fn tls_server_config(pair: &PemPair) -> Result<ServerConfig> {
    let cert_chain = CertificateDer::pem_slice_iter(pair.cert.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CertgenError::Serialization(format!("Failed to load certificate PEM: {e}")))?;
    let key = PrivateKeyDer::from_pem_slice(pair.key.as_bytes())
        .map_err(|e| CertgenError::Serialization(format!("Failed to load private key PEM: {e}")))?;

    let provider = Arc::new(aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

/// Serve `app` over HTTPS on `addr` with a freshly generated self-signed certificate.
///
/// `None` uses [`CertParams::with_defaults`] (RSA-2048 for `localhost`,
/// valid from now for one year). Clients have to skip verification or trust
/// the ephemeral certificate explicitly.
pub async fn serve_tls(addr: SocketAddr, app: Router, params: Option<CertParams>) -> Result<()> {
    serve_tls_with_handle(addr, app, params, Handle::new()).await
}

/// Like [`serve_tls`], controlled through `handle` (graceful shutdown, bound address).
pub async fn serve_tls_with_handle(
    addr: SocketAddr,
    app: Router,
    params: Option<CertParams>,
    handle: Handle,
) -> Result<()> {
    let params = params.unwrap_or_else(CertParams::with_defaults);
    let algorithm = params.key_algorithm;

    // RSA key generation can take seconds; keep it off the async workers
    let pair = tokio::task::spawn_blocking(move || generate_to_memory(&params))
        .await
        .map_err(|e| {
            CertgenError::KeyGeneration(format!("certificate generation task failed: {e}"))
        })??;

    let config = RustlsConfig::from_config(Arc::new(tls_server_config(&pair)?));
    log::info!("Serving HTTPS on {addr} with an ephemeral {algorithm} self-signed certificate");

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|source| CertgenError::Serve { addr, source })
}

/// Router answering `GET /` with `Hello`.
pub fn hello_router() -> Router {
    Router::new().route("/", get(|| async { "Hello" }))
}
