//! Connection target.

use crate::base::neterror::NetError;
use url::Url;

/// Where to connect and whether the transport must be TLS.
///
/// Immutable once built; [`ConnectJob`](super::connectjob::ConnectJob)
/// picks the plain or TLS path from [`is_secure`](Self::is_secure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    secure: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    /// Derive the endpoint from a `ws://` or `wss://` URL.
    ///
    /// Missing ports default to 80 and 443.
    pub fn from_url(url: &Url) -> Result<Self, NetError> {
        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            _ => return Err(NetError::DisallowedUrlScheme),
        };
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        // IPv6 literals come back bracketed from host_str()
        let host = host.trim_start_matches('[').trim_end_matches(']');

        Ok(Self::new(host, port, secure))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    fn default_port(&self) -> u16 {
        if self.secure {
            443
        } else {
            80
        }
    }

    /// Value for the `Host` request header.
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.port == self.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// `host:port` string for DNS resolution.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
