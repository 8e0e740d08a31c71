use reqwest::header::{CONTENT_TYPE, HeaderValue};

use super::retry::{RetryPolicy, retry_send};
use super::{Transport, TransportConfig};
use crate::core::TransportError;

/// HTTPS transport built on `reqwest` with rustls.
///
/// With a pinned CA bundle the system roots are disabled entirely, so only
/// chains ending in one of the bundle's certificates are accepted.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout);

        if let Some(pem) = &config.pinned_ca_pem {
            let roots = reqwest::Certificate::from_pem_bundle(pem.as_bytes())
                .map_err(|e| TransportError::Setup(format!("invalid CA bundle: {e}")))?;
            if roots.is_empty() {
                return Err(TransportError::Setup(
                    "CA bundle contains no certificates".into(),
                ));
            }
            builder = builder.tls_built_in_root_certs(false);
            for root in roots {
                builder = builder.add_root_certificate(root);
            }
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        reqwest::Url::parse(&config.endpoint)
            .map_err(|e| TransportError::Setup(format!("invalid endpoint URL: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            retry: config.retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_once(&self, envelope: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/xml; charset=utf-8"))
            .header("SOAPAction", HeaderValue::from_static(""))
            .body(envelope.to_owned())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Ambiguous(format!("reading response body: {e}")))?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "fiscalization response received");
        Ok(body)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, envelope: &str) -> Result<String, TransportError> {
        tracing::info!(endpoint = %self.endpoint, "sending fiscalization request");
        retry_send(self.retry, || self.post_once(envelope)).await
    }
}

/// Split `reqwest` failures into "never sent" and "outcome unknown".
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_builder() {
        TransportError::Setup(e.to_string())
    } else {
        TransportError::Ambiguous(e.to_string())
    }
}
