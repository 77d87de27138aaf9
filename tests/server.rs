use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum_server::Handle;
use certgen::server::hello_router;
use certgen::{
    CertParams, CertgenError, EcdsaCurve, KeyAlgorithm, PemPair, generate_to_memory,
    serve_tls_with_handle, tls_server_config,
};
use chrono::{Duration, Utc};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

fn pair_for(algorithm: KeyAlgorithm) -> PemPair {
    generate_to_memory(&CertParams::with_defaults().key_algorithm(algorithm)).unwrap()
}

#[test]
fn generated_pairs_load_into_rustls() {
    for algorithm in [
        KeyAlgorithm::Rsa { bits: 2048 },
        KeyAlgorithm::Ecdsa(EcdsaCurve::P256),
        KeyAlgorithm::Ecdsa(EcdsaCurve::P384),
        KeyAlgorithm::Ecdsa(EcdsaCurve::P521),
    ] {
        let config = tls_server_config(&pair_for(algorithm))
            .unwrap_or_else(|e| panic!("{algorithm}: {e}"));
        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }
}

#[test]
fn p224_is_rejected_by_the_tls_provider() {
    let err = tls_server_config(&pair_for(KeyAlgorithm::Ecdsa(EcdsaCurve::P224))).unwrap_err();
    assert!(matches!(err, CertgenError::Tls(_)), "got {err:?}");
}

#[tokio::test]
async fn bind_failure_names_the_listen_address() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();
    let params = CertParams::with_defaults().key_algorithm(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));

    let err = serve_tls_with_handle(addr, hello_router(), Some(params), Handle::new())
        .await
        .unwrap_err();

    match &err {
        CertgenError::Serve { addr: failed, .. } => assert_eq!(*failed, addr),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().starts_with(&format!("HTTPS server on {addr} failed")));
}

#[test]
fn mismatched_key_is_rejected() {
    let first = pair_for(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
    let second = pair_for(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));
    let mixed = PemPair {
        cert: first.cert,
        key: second.key,
    };
    assert!(matches!(tls_server_config(&mixed), Err(CertgenError::Tls(_))));
}

fn client_trusting(cert_pem: &str) -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(cert_pem.as_bytes()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_root_certificates(roots)
    .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

#[tokio::test(flavor = "multi_thread")]
async fn https_bootstrap_serves_hello() {
    // The server generates its own pair; learn it, then trust only that certificate
    let params = CertParams::with_defaults()
        .hosts("localhost,127.0.0.1")
        .valid_from(Utc::now() - Duration::hours(1))
        .key_algorithm(KeyAlgorithm::Ecdsa(EcdsaCurve::P256));

    let handle = Handle::new();
    let server = tokio::spawn(serve_tls_with_handle(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        hello_router(),
        Some(params),
        handle.clone(),
    ));
    let addr = handle.listening().await.expect("server is listening");

    let presented = fetch_presented_certificate(addr).await;
    let connector = client_trusting(&presented);

    let stream = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let mut tls = connector.connect(server_name, stream).await.unwrap();

    tls.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = Vec::new();
    let mut buf = [0u8; 1024];
    while !String::from_utf8_lossy(&response).contains("Hello") {
        match tls.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
        }
    }
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("Hello"), "{response}");

    handle.graceful_shutdown(Some(StdDuration::from_secs(1)));
    server.await.unwrap().unwrap();
}

/// Handshake once without verification to learn the ephemeral certificate.
async fn fetch_presented_certificate(addr: SocketAddr) -> String {
    use rustls::DigitallySignedStruct;
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::UnixTime;

    #[derive(Debug)]
    struct AcceptAny(Arc<rustls::crypto::CryptoProvider>);

    impl ServerCertVerifier for AcceptAny {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .unwrap()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAny(provider)))
        .with_no_client_auth();

    let stream = TcpStream::connect(addr).await.unwrap();
    let tls = TlsConnector::from(Arc::new(config))
        .connect(ServerName::try_from("localhost").unwrap(), stream)
        .await
        .unwrap();

    let (_, connection) = tls.get_ref();
    let leaf = connection
        .peer_certificates()
        .and_then(|chain| chain.first())
        .expect("server presented a certificate");
    pem::encode(&pem::Pem::new("CERTIFICATE", leaf.to_vec()))
}
