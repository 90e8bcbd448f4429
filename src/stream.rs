use crate::h2::consts::ALPN_H2;
use crate::types::ProtocolError;
use crate::utils::timeout_result;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::ring::default_provider;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};
use tracing::{debug, info};

#[derive(Debug)]
pub struct NoCertificateVerification;

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

pub type H2TlsStream = TlsStream<TcpStream>;

fn build_tls_connector(insecure: bool) -> TlsConnector {
    let mut config = if insecure {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
            .with_no_client_auth()
    } else {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };

    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    TlsConnector::from(Arc::new(config))
}

/// Opens a TLS connection to `host:port` that has negotiated `h2` via ALPN.
pub async fn create_h2_tls_stream(
    host: &str,
    port: u16,
    insecure: bool,
    timeout: Option<Duration>,
) -> Result<H2TlsStream, ProtocolError> {
    // Ensure a crypto provider is installed (required for rustls >=0.23).
    let _ = default_provider().install_default();

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ProtocolError::Connect(format!("Invalid server name {}: {}", host, e)))?;
    let connector = build_tls_connector(insecure);

    let tls_stream = timeout_result(timeout, "connect", async {
        let tcp_stream = TcpStream::connect((host, port)).await.map_err(|e| {
            ProtocolError::Connect(format!("TCP connect to {}:{}: {}", host, port, e))
        })?;
        tcp_stream.set_nodelay(true)?;
        debug!(host, port, "tcp connected");

        connector
            .connect(server_name, tcp_stream)
            .await
            .map_err(|e| ProtocolError::Connect(format!("TLS handshake failed: {}", e)))
    })
    .await?;

    let (tcp, session) = tls_stream.get_ref();
    match session.alpn_protocol() {
        Some(protocol) if protocol == ALPN_H2 => {}
        other => {
            return Err(ProtocolError::Connect(format!(
                "server did not negotiate h2 via ALPN (got {:?})",
                other.map(String::from_utf8_lossy)
            )));
        }
    }

    match tcp.peer_addr() {
        Ok(addr) => info!(%addr, "connected"),
        Err(_) => info!(host, port, "connected"),
    }

    Ok(tls_stream)
}
