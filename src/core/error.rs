use thiserror::Error;

use super::types::ServerErrorKind;

/// Top-level error for a fiscalization attempt.
///
/// The variants follow the order in which they can occur: a certificate
/// problem is fatal at startup, validation fails before any network call,
/// and only `Transport` failures are ever retried (inside the transport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FiscalError {
    /// The key container could not be loaded.
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// ZKI or XML-DSIG signing failed.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// One or more request fields are malformed. Nothing was sent.
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// Connection-level failure that persisted through all retries.
    /// The request never reached the server.
    #[error(transparent)]
    Transport(TransportError),

    /// The request may have reached the server but no response was read.
    /// The server-side outcome is unknown and must be reconciled manually;
    /// resubmitting under the same invoice identity risks double fiscalization.
    #[error("ambiguous submission outcome, manual reconciliation required: {detail}")]
    Ambiguous { detail: String },

    /// The authority rejected the request with a structured error.
    #[error("rejected by tax authority [{code}] {message}")]
    ServerRejection {
        kind: ServerErrorKind,
        code: String,
        message: String,
        raw_response: String,
    },

    /// The response body could not be interpreted.
    #[error("unrecognized response from tax authority")]
    UnknownResponse { raw_response: String },

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// XML generation error.
    #[error("XML error: {0}")]
    Xml(String),

    /// A storno was driven out of order.
    #[error("invalid storno transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

impl FiscalError {
    /// Error code suitable for the billing collaborator's `{errorCode, errorMessage}` pair.
    pub fn code(&self) -> &str {
        match self {
            Self::Certificate(_) => "CERTIFICATE",
            Self::Signing(_) => "SIGNING",
            Self::Validation(_) => "VALIDATION",
            Self::Transport(_) => "TRANSPORT",
            Self::Ambiguous { .. } => "AMBIGUOUS",
            Self::ServerRejection { code, .. } => code,
            Self::UnknownResponse { .. } => "UNKNOWN",
            Self::Config(_) => "CONFIG",
            Self::Xml(_) => "XML",
            Self::InvalidTransition { .. } => "STATE",
        }
    }

    /// Raw response body, when the server answered.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::ServerRejection { raw_response, .. } | Self::UnknownResponse { raw_response } => {
                Some(raw_response)
            }
            _ => None,
        }
    }

    /// Whether the same invoice identity may be submitted again.
    ///
    /// Only failures that provably never reached the authority qualify.
    pub fn may_resubmit(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Validation(_))
    }
}

impl From<TransportError> for FiscalError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Ambiguous(detail) => Self::Ambiguous { detail },
            other => Self::Transport(other),
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure to load the fiscal certificate container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("invalid certificate passphrase")]
    InvalidPassphrase,

    #[error("malformed certificate container: {0}")]
    MalformedContainer(String),

    #[error("certificate expired on {0}")]
    Expired(String),

    #[error("certificate container holds no {0}")]
    MissingKey(&'static str),
}

/// Failure while producing a ZKI or an XML signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SigningError {
    #[error("signing key unusable: {0}")]
    KeyUnusable(String),

    #[error("certificate not valid at {0}")]
    CertificateNotValid(String),

    #[error("element with Id '{0}' not found")]
    MissingSignTarget(String),

    #[error("element with Id '{0}' occurs more than once")]
    DuplicateSignTarget(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("malformed XML: {0}")]
    MalformedXml(String),
}

/// Failure to exchange a message with the tax authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Connection refused, TLS handshake failure or connect timeout.
    /// Nothing was delivered; safe to retry.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request may have been delivered but the response was lost.
    #[error("response not received: {0}")]
    Ambiguous(String),

    /// The HTTP client could not be configured (bad CA bundle, bad URL).
    #[error("transport setup failed: {0}")]
    Setup(String),
}

impl TransportError {
    /// Whether the failure happened before the request left the process.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Path to the invalid field (e.g. "vat_breakdown[0].rate").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
