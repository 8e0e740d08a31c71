//! The fiscalization façade.
//!
//! ```ignore
//! let config = FiscalConfig::from_env()?;
//! let service = FiscalizationService::from_config(&config)?;
//! let request = FiscalInvoiceBuilder::from_config(&config, FiscalInstant::now())
//!     .invoice_number("634")
//!     .total(dec!(7))
//!     .build()?;
//! let receipt = service.submit_invoice(&request).await?;
//! println!("{} {}", receipt.jir, receipt.receipt_url);
//! ```

use std::sync::Arc;

use crate::core::*;
use crate::crypto::{FiscalCertificate, SigningKey, compute_zki};
use crate::storno::{StornoEngine, StornoRequest};
use crate::transport::{HttpTransport, Transport, TransportConfig};
use crate::xml::{
    SignedFiscalRequest, UNKNOWN_ERROR_CODE, parse_response_for, sign_request, soap_envelope,
};

/// Submits invoices and stornos to the tax authority.
///
/// Holds no per-invoice state: a single service can be shared between
/// tasks and every call runs the full pipeline from scratch.
pub struct FiscalizationService<T = HttpTransport> {
    key: Arc<dyn SigningKey>,
    transport: T,
}

impl FiscalizationService<HttpTransport> {
    /// Load the certificate and build the HTTPS transport from configuration.
    pub fn from_config(config: &FiscalConfig) -> Result<Self, FiscalError> {
        config.validate()?;
        let certificate = FiscalCertificate::from_base64_blob(
            &config.certificate_blob,
            &config.certificate_password,
        )?;
        let transport = HttpTransport::new(&TransportConfig::from_config(config))?;
        tracing::info!(
            environment = ?config.environment,
            endpoint = %config.endpoint(),
            certificate = %certificate.subject_cn(),
            "fiscalization service ready"
        );
        Ok(Self::new(Arc::new(certificate), transport))
    }
}

impl<T: Transport> FiscalizationService<T> {
    pub fn new(key: Arc<dyn SigningKey>, transport: T) -> Self {
        Self { key, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fiscalize one invoice.
    ///
    /// Validation happens before anything is signed or sent. On
    /// [`FiscalError::Ambiguous`] the invoice must be reconciled by hand
    /// and not resubmitted under the same number.
    pub async fn submit_invoice(
        &self,
        request: &FiscalInvoiceRequest,
    ) -> Result<FiscalReceipt, FiscalError> {
        let errors = validate_request(request);
        if !errors.is_empty() {
            return Err(FiscalError::Validation(errors));
        }

        let zki = compute_zki(self.key.as_ref(), request)?;
        let signed = sign_request(request, &zki, self.key.as_ref())?;
        exchange(&self.transport, request, &zki, &signed).await
    }

    /// Fiscalize a storno prepared with
    /// [`create_full_storno`](crate::storno::create_full_storno) or
    /// [`create_partial_storno`](crate::storno::create_partial_storno).
    pub async fn submit_storno(&self, storno: StornoRequest) -> Result<FiscalReceipt, FiscalError> {
        let mut engine = StornoEngine::new(storno);
        engine.run(self.key.as_ref(), &self.transport).await
    }
}

/// Send a signed request and turn the answer into a receipt.
pub(crate) async fn exchange<T: Transport>(
    transport: &T,
    request: &FiscalInvoiceRequest,
    zki: &ZkiCode,
    signed: &SignedFiscalRequest,
) -> Result<FiscalReceipt, FiscalError> {
    let envelope = soap_envelope(&signed.xml)?;
    tracing::info!(
        invoice = %request.invoice_number,
        business_space = %request.business_space_code,
        cash_register = %request.cash_register_code,
        message_id = %signed.message_id,
        storno = request.is_storno,
        "submitting invoice"
    );
    tracing::debug!(bytes = envelope.len(), "SOAP envelope built");

    let raw = match transport.send(&envelope).await {
        Ok(raw) => raw,
        Err(TransportError::Ambiguous(detail)) => {
            tracing::warn!(
                invoice = %request.invoice_number,
                message_id = %signed.message_id,
                "submission outcome unknown, manual reconciliation required: {detail}"
            );
            return Err(FiscalError::Ambiguous { detail });
        }
        Err(e) => return Err(e.into()),
    };

    match parse_response_for(&raw, request) {
        FiscalResponse::Success { jir, qr_code_data } => {
            tracing::info!(invoice = %request.invoice_number, jir = %jir, "invoice accepted");
            Ok(FiscalReceipt {
                receipt_url: qr_code_data
                    .unwrap_or_else(|| receipt_url(&jir, request.issued_at, request.total_amount)),
                jir,
                zki: zki.clone(),
                timestamp: request.issued_at,
            })
        }
        FiscalResponse::Failure { error_code, raw_response, .. }
            if error_code == UNKNOWN_ERROR_CODE =>
        {
            tracing::warn!(invoice = %request.invoice_number, "unrecognized response");
            Err(FiscalError::UnknownResponse { raw_response })
        }
        FiscalResponse::Failure {
            error_code,
            error_message,
            raw_response,
        } => {
            let kind = ServerErrorKind::classify(&error_code, &error_message);
            tracing::warn!(
                invoice = %request.invoice_number,
                code = %error_code,
                ?kind,
                "invoice rejected: {error_message}"
            );
            Err(FiscalError::ServerRejection {
                kind,
                code: error_code,
                message: error_message,
                raw_response,
            })
        }
    }
}
