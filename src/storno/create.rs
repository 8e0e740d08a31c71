use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::*;

/// An invoice the authority has already issued a JIR for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalisedInvoice {
    pub request: FiscalInvoiceRequest,
    pub jir: String,
}

impl FiscalisedInvoice {
    pub fn new(request: FiscalInvoiceRequest, jir: impl Into<String>) -> Self {
        Self {
            request,
            jir: jir.into(),
        }
    }
}

/// Whether the whole original is reversed or only part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StornoType {
    Full,
    Partial,
}

/// A reversal invoice ready to be fiscalized.
///
/// `request` is a complete storno request: negative amounts, `is_storno`
/// set and `original_jir` pointing at the reversed invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StornoRequest {
    pub request: FiscalInvoiceRequest,
    pub storno_type: StornoType,
    /// Reversed amount as a positive magnitude; set iff `Partial`.
    pub partial_amount: Option<Decimal>,
    pub reason: String,
}

/// Reverse an invoice in full: total and every VAT line negated.
pub fn create_full_storno(
    original: &FiscalisedInvoice,
    storno_number: impl Into<String>,
    issued_at: FiscalInstant,
    reason: impl Into<String>,
) -> Result<StornoRequest, FiscalError> {
    let reason = reason.into();
    check_original(original, &reason)?;

    let src = &original.request;
    let vat_breakdown = src
        .vat_breakdown
        .iter()
        .map(|v| VatRate::new(v.rate, -v.base.abs(), -v.amount.abs()))
        .collect();

    let request = storno_of(
        original,
        storno_number.into(),
        issued_at,
        -src.total_amount.abs(),
        vat_breakdown,
        &reason,
    );
    finish(request, StornoType::Full, None, reason)
}

/// Reverse part of an invoice.
///
/// Each VAT line is scaled by `partial / |original total|` and rounded half
/// away from zero to two digits, so a 150.00 invoice carrying 30.00 VAT
/// reversed by 50.00 yields a -10.00 VAT line.
pub fn create_partial_storno(
    original: &FiscalisedInvoice,
    storno_number: impl Into<String>,
    issued_at: FiscalInstant,
    partial_amount: Decimal,
    reason: impl Into<String>,
) -> Result<StornoRequest, FiscalError> {
    let reason = reason.into();
    check_original(original, &reason)?;

    let src = &original.request;
    let original_total = src.total_amount.abs();
    let partial = round_amount(partial_amount.abs());

    if partial.is_zero() {
        return Err(invalid("partial_amount", "must not be zero"));
    }
    if original_total.is_zero() {
        return Err(invalid("total_amount", "a zero invoice cannot be partially reversed"));
    }
    if partial > original_total {
        return Err(invalid(
            "partial_amount",
            format!(
                "{} exceeds the original total {}",
                format_amount(partial),
                format_amount(original_total)
            ),
        ));
    }

    let scale = |x: Decimal| -round_amount(partial * x.abs() / original_total);
    let vat_breakdown = src
        .vat_breakdown
        .iter()
        .map(|v| VatRate::new(v.rate, scale(v.base), scale(v.amount)))
        .collect();

    let request = storno_of(
        original,
        storno_number.into(),
        issued_at,
        -partial,
        vat_breakdown,
        &reason,
    );
    finish(request, StornoType::Partial, Some(partial), reason)
}

fn check_original(original: &FiscalisedInvoice, reason: &str) -> Result<(), FiscalError> {
    let mut errors = Vec::new();
    if !is_jir(&original.jir) {
        errors.push(ValidationError::new(
            "original_jir",
            "the original invoice has no valid JIR",
        ));
    }
    if original.request.is_storno {
        errors.push(ValidationError::new(
            "is_storno",
            "a storno cannot itself be reversed",
        ));
    }
    if reason.trim().is_empty() {
        errors.push(ValidationError::new("storno_reason", "is required"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FiscalError::Validation(errors))
    }
}

fn storno_of(
    original: &FiscalisedInvoice,
    storno_number: String,
    issued_at: FiscalInstant,
    total_amount: Decimal,
    vat_breakdown: Vec<VatRate>,
    reason: &str,
) -> FiscalInvoiceRequest {
    FiscalInvoiceRequest {
        issued_at,
        invoice_number: storno_number,
        total_amount,
        vat_breakdown,
        subsequent_delivery: false,
        is_storno: true,
        original_jir: Some(original.jir.clone()),
        storno_reason: Some(reason.to_string()),
        ..original.request.clone()
    }
}

fn finish(
    request: FiscalInvoiceRequest,
    storno_type: StornoType,
    partial_amount: Option<Decimal>,
    reason: String,
) -> Result<StornoRequest, FiscalError> {
    let errors = validate_request(&request);
    if !errors.is_empty() {
        return Err(FiscalError::Validation(errors));
    }
    Ok(StornoRequest {
        request,
        storno_type,
        partial_amount,
        reason,
    })
}

fn invalid(field: &str, message: impl Into<String>) -> FiscalError {
    FiscalError::Validation(vec![ValidationError::new(field, message)])
}
