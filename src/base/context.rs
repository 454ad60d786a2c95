//! Endpoint context for transport errors.
//!
//! Raw `io::Error`s from resolution and connect carry no target; these
//! helpers attach the [`Endpoint`] being opened so the resulting
//! [`NetError`] says where the failure happened.

use crate::base::neterror::NetError;
use crate::socket::endpoint::Endpoint;
use std::io;

/// Attach an [`Endpoint`] to a failed transport step.
pub trait IoResultExt<T> {
    /// TCP connect (or a readiness wait during TLS setup) failed.
    fn or_connect_failed(self, endpoint: &Endpoint) -> Result<T, NetError>;

    /// Name resolution for the endpoint's host failed.
    fn or_unresolved(self, endpoint: &Endpoint) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn or_connect_failed(self, endpoint: &Endpoint) -> Result<T, NetError> {
        self.map_err(|source| NetError::ConnectionFailedTo {
            host: endpoint.host().to_string(),
            port: endpoint.port(),
            source,
        })
    }

    fn or_unresolved(self, endpoint: &Endpoint) -> Result<T, NetError> {
        self.map_err(|source| NetError::NameNotResolvedFor {
            domain: endpoint.host().to_string(),
            source,
        })
    }
}
