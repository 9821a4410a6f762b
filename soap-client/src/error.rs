//! Error types for the SOAP client

use thiserror::Error;

/// Errors that can occur during SOAP communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// Connection refused, timeout, or a non-success HTTP status
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The device answered with something that is not a SOAP envelope
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// SOAP fault returned by the device, with its UPnP error code
    #[error("SOAP fault: error code {0}")]
    Fault(u16),
}

impl SoapError {
    /// Whether the request never produced a SOAP response at all
    pub fn is_network(&self) -> bool {
        matches!(self, SoapError::Network(_))
    }
}
