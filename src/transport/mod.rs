//! Delivery of signed SOAP envelopes to the tax authority.
//!
//! [`Transport`] is the seam the service talks to; [`HttpTransport`] is the
//! production implementation and tests substitute their own.

mod client;
mod retry;

pub use client::HttpTransport;
pub use retry::RetryPolicy;

use std::future::Future;
use std::time::Duration;

use crate::core::{FiscalConfig, TransportError};

/// Sends one SOAP envelope and returns the raw response body.
///
/// Any HTTP status with a readable body is `Ok`: SOAP faults and
/// `RacunOdgovor` errors arrive with non-2xx codes and are interpreted by
/// the response parser, never here.
pub trait Transport: Send + Sync {
    fn send(&self, envelope: &str) -> impl Future<Output = Result<String, TransportError>> + Send;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, envelope: &str) -> impl Future<Output = Result<String, TransportError>> + Send {
        (**self).send(envelope)
    }
}

/// Everything [`HttpTransport`] needs to reach one endpoint.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: String,
    /// PEM bundle that replaces the system roots. `None` keeps the
    /// built-in roots.
    pub pinned_ca_pem: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl TransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            pinned_ca_pem: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &FiscalConfig) -> Self {
        Self {
            endpoint: config.endpoint().to_string(),
            pinned_ca_pem: config.pinned_ca_pem.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pinned_ca(mut self, pem: impl Into<String>) -> Self {
        self.pinned_ca_pem = Some(pem.into());
        self
    }
}
