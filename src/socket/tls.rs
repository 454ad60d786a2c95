use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::endpoint::Endpoint;
use crate::socket::stream::{NonBlockingTcp, Readiness, StreamSocket};
use boring::ssl::{
    ErrorCode, HandshakeError, MidHandshakeSslStream, SslConnector, SslMethod, SslStream,
    SslVerifyMode, SslVersion,
};
use boring::x509::{X509VerifyResult, X509};
use tokio::net::TcpStream;

/// Client TLS policy.
///
/// Peer verification is always on and there is no insecure fallback. Trust
/// anchors are the platform defaults; [`add_root_certificate`] can only add
/// to them.
///
/// [`add_root_certificate`]: TlsConfig::add_root_certificate
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: SslVersion,
    pub max_version: Option<SslVersion>,
    extra_roots: Vec<X509>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: SslVersion::TLS1_2,
            max_version: None,
            extra_roots: Vec::new(),
        }
    }
}

impl TlsConfig {
    /// Trust `cert` in addition to the platform store.
    pub fn add_root_certificate(mut self, cert: X509) -> Self {
        self.extra_roots.push(cert);
        self
    }

    /// Trust a PEM-encoded certificate in addition to the platform store.
    pub fn add_root_certificate_pem(self, pem: &[u8]) -> Result<Self, NetError> {
        let cert = X509::from_pem(pem).map_err(|_| NetError::SslProtocolError)?;
        Ok(self.add_root_certificate(cert))
    }

    /// Cap the negotiated protocol version.
    pub fn max_version(mut self, version: SslVersion) -> Self {
        self.max_version = Some(version);
        self
    }

    /// Build a BoringSSL connector with this policy applied.
    pub fn connector(&self) -> Result<SslConnector, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;

        builder
            .set_default_verify_paths()
            .map_err(|_| NetError::SslProtocolError)?;
        builder
            .set_min_proto_version(Some(self.min_version))
            .map_err(|_| NetError::SslProtocolError)?;
        if let Some(max) = self.max_version {
            builder
                .set_max_proto_version(Some(max))
                .map_err(|_| NetError::SslProtocolError)?;
        }

        for cert in &self.extra_roots {
            builder
                .cert_store_mut()
                .add_cert(cert.clone())
                .map_err(|_| NetError::SslProtocolError)?;
        }

        builder.set_verify(SslVerifyMode::PEER);

        Ok(builder.build())
    }

    /// Check if SNI should be set for this host.
    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.parse::<std::net::IpAddr>().is_err()
    }

    /// Run the TLS handshake over an established TCP stream.
    ///
    /// The handshake is driven with the same would-block protocol as every
    /// other socket operation and has finished when this returns. The
    /// certificate chain and hostname are checked by BoringSSL.
    pub async fn connect(
        &self,
        endpoint: &Endpoint,
        tcp: TcpStream,
    ) -> Result<SslStream<NonBlockingTcp>, NetError> {
        let host = endpoint.host();
        let connector = self.connector()?;
        let mut config = connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        config.set_use_server_name_indication(Self::should_set_sni(host));

        let mut attempt = config.connect(host, NonBlockingTcp(tcp));
        loop {
            match attempt {
                Ok(stream) => {
                    tracing::debug!(
                        "TLS established with {} ({})",
                        host,
                        stream.ssl().version_str()
                    );
                    return Ok(stream);
                }
                Err(HandshakeError::WouldBlock(mid)) => {
                    let readiness = match mid.error().code() {
                        ErrorCode::WANT_WRITE => Readiness::Writable,
                        _ => Readiness::Readable,
                    };
                    let tcp = mid.get_ref().get_ref();
                    std::future::poll_fn(|cx| StreamSocket::poll_ready(tcp, cx, readiness))
                        .await
                        .or_connect_failed(endpoint)?;
                    attempt = mid.handshake();
                }
                Err(HandshakeError::Failure(mid)) => {
                    let reason = failure_reason(&mid);
                    tracing::debug!("SSL Handshake failed: {}", reason);
                    return Err(NetError::SslHandshakeFailed {
                        host: host.to_string(),
                        reason,
                    });
                }
                Err(HandshakeError::SetupFailure(e)) => {
                    return Err(NetError::SslHandshakeFailed {
                        host: host.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Prefer the certificate verification result over the generic SSL error.
fn failure_reason(mid: &MidHandshakeSslStream<NonBlockingTcp>) -> String {
    let verify = mid.ssl().verify_result();
    if verify != X509VerifyResult::OK {
        format!("certificate verify failed: {}", verify.error_string())
    } else {
        mid.error().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = TlsConfig::default();
        assert_eq!(config.min_version, SslVersion::TLS1_2);
        assert!(config.max_version.is_none());
        assert!(config.connector().is_ok());
    }

    #[test]
    fn test_max_version() {
        let config = TlsConfig::default().max_version(SslVersion::TLS1_3);
        assert_eq!(config.max_version, Some(SslVersion::TLS1_3));
        assert!(config.connector().is_ok());
    }

    #[test]
    fn test_should_set_sni() {
        assert!(TlsConfig::should_set_sni("example.com"));
        assert!(!TlsConfig::should_set_sni("127.0.0.1"));
        assert!(!TlsConfig::should_set_sni("::1"));
    }

    #[test]
    fn test_bad_pem_rejected() {
        let result = TlsConfig::default().add_root_certificate_pem(b"not a certificate");
        assert!(matches!(result, Err(NetError::SslProtocolError)));
    }
}
