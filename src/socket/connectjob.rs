use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::client::SocketType;
use crate::socket::endpoint::Endpoint;
use crate::socket::tls::TlsConfig;
use tokio::net::TcpStream;

/// Manages the connection process: DNS -> TCP -> SSL.
/// Roughly equivalent to net::ConnectJob.
pub struct ConnectJob;

impl ConnectJob {
    /// Open a transport to `endpoint`.
    ///
    /// Plain endpoints never touch TLS. Secure endpoints return only after a
    /// verified TLS handshake; any TLS failure is reported as a connect error
    /// and the TCP socket is dropped.
    pub async fn connect(endpoint: &Endpoint, tls: &TlsConfig) -> Result<SocketType, NetError> {
        // 1. DNS Resolution
        let addrs = tokio::net::lookup_host(endpoint.authority())
            .await
            .or_unresolved(endpoint)?;

        // 2. TCP Connect, first address that accepts wins
        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    tracing::debug!("TCP connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                let err = last_err.unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
                });
                return Err(err).or_connect_failed(endpoint);
            }
        };
        // Frames are small and latency-bound
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("TCP_NODELAY not set: {}", e);
        }

        // 3. SSL Handshake (if wss)
        if endpoint.is_secure() {
            let tls_stream = tls.connect(endpoint, stream).await?;
            Ok(SocketType::Ssl(tls_stream))
        } else {
            Ok(SocketType::Tcp(stream))
        }
    }
}
