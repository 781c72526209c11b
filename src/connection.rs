//! TCP + TLS connection setup
//!
//! POP3S negotiates TLS immediately after the TCP connect (no STLS
//! upgrade), so the stream handed to the session is already encrypted.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

/// Build a TLS connector.
///
/// Verifies the server against the Mozilla root store unless
/// `insecure` is set, in which case any certificate is accepted.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the ring provider rejects the
/// default protocol versions.
pub fn tls_connector(insecure: bool) -> Result<TlsConnector> {
    let builder = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Connection(format!("TLS setup failed: {e}")))?;

    let config = if insecure {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth()
    } else {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Connect to `host:port` and complete the TLS handshake.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the host is unreachable, the name
/// is not a valid TLS server name, or the handshake fails.
pub async fn connect_tls(host: &str, port: u16, insecure: bool) -> Result<TlsStream<TcpStream>> {
    let addr = format!("{host}:{port}");
    debug!("Connecting to POP3 server at {}", addr);

    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| Error::Connection(format!("Cannot reach {addr}: {e}")))?;

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Connection(format!("Invalid server name {host}: {e}")))?;

    tls_connector(insecure)?
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Connection(format!("TLS handshake with {addr} failed: {e}")))
}

/// Certificate verifier that accepts all certificates
/// (for `--insecure` and self-signed test servers).
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
