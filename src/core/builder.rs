use rust_decimal::Decimal;

use super::config::FiscalConfig;
use super::error::FiscalError;
use super::types::*;
use super::validation;

/// Builder for fiscalization requests.
///
/// ```
/// use fiskal::core::*;
/// use rust_decimal_macros::dec;
///
/// let request = FiscalInvoiceBuilder::new("87246357068", FiscalInstant::now())
///     .invoice_number("634")
///     .business_space("POSL1")
///     .cash_register("2")
///     .vat(dec!(25), dec!(5.60), dec!(1.40))
///     .total(dec!(7))
///     .payment_method(PaymentMethod::Card)
///     .build()
///     .unwrap();
/// assert_eq!(request.operator_oib, "87246357068");
/// ```
pub struct FiscalInvoiceBuilder {
    oib: String,
    issued_at: FiscalInstant,
    vat_registered: bool,
    sequence_mark: SequenceMark,
    invoice_number: String,
    business_space_code: String,
    cash_register_code: String,
    total_amount: Decimal,
    vat_breakdown: Vec<VatRate>,
    payment_method: PaymentMethod,
    operator_oib: Option<String>,
    subsequent_delivery: bool,
}

impl FiscalInvoiceBuilder {
    pub fn new(oib: impl Into<String>, issued_at: FiscalInstant) -> Self {
        Self {
            oib: oib.into(),
            issued_at,
            vat_registered: true,
            sequence_mark: SequenceMark::BusinessSpace,
            invoice_number: String::new(),
            business_space_code: String::new(),
            cash_register_code: String::new(),
            total_amount: Decimal::ZERO,
            vat_breakdown: Vec::new(),
            payment_method: PaymentMethod::Cash,
            operator_oib: None,
            subsequent_delivery: false,
        }
    }

    /// Seed issuer identity, premises and register from the configuration.
    pub fn from_config(config: &FiscalConfig, issued_at: FiscalInstant) -> Self {
        let mut builder = Self::new(config.oib.clone(), issued_at)
            .business_space(config.business_space_code.clone())
            .cash_register(config.cash_register_code.clone())
            .vat_registered(config.vat_registered)
            .sequence_mark(config.sequence_mark);
        if let Some(op) = &config.operator_oib {
            builder = builder.operator_oib(op.clone());
        }
        builder
    }

    pub fn invoice_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = number.into();
        self
    }

    pub fn business_space(mut self, code: impl Into<String>) -> Self {
        self.business_space_code = code.into();
        self
    }

    pub fn cash_register(mut self, code: impl Into<String>) -> Self {
        self.cash_register_code = code.into();
        self
    }

    pub fn vat_registered(mut self, registered: bool) -> Self {
        self.vat_registered = registered;
        self
    }

    pub fn sequence_mark(mut self, mark: SequenceMark) -> Self {
        self.sequence_mark = mark;
        self
    }

    pub fn total(mut self, amount: Decimal) -> Self {
        self.total_amount = amount;
        self
    }

    pub fn vat(mut self, rate: Decimal, base: Decimal, amount: Decimal) -> Self {
        self.vat_breakdown.push(VatRate::new(rate, base, amount));
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    /// Operator OIB; defaults to the issuer OIB.
    pub fn operator_oib(mut self, oib: impl Into<String>) -> Self {
        self.operator_oib = Some(oib.into());
        self
    }

    pub fn subsequent_delivery(mut self, late: bool) -> Self {
        self.subsequent_delivery = late;
        self
    }

    /// Build the request and run validation.
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<FiscalInvoiceRequest, FiscalError> {
        let operator_oib = self.operator_oib.unwrap_or_else(|| self.oib.clone());
        let request = FiscalInvoiceRequest {
            oib: self.oib,
            vat_registered: self.vat_registered,
            issued_at: self.issued_at,
            sequence_mark: self.sequence_mark,
            invoice_number: self.invoice_number,
            business_space_code: self.business_space_code,
            cash_register_code: self.cash_register_code,
            total_amount: self.total_amount,
            vat_breakdown: self.vat_breakdown,
            payment_method: self.payment_method,
            operator_oib,
            subsequent_delivery: self.subsequent_delivery,
            is_storno: false,
            original_jir: None,
            storno_reason: None,
        };

        let errors = validation::validate_request(&request);
        if errors.is_empty() {
            Ok(request)
        } else {
            Err(FiscalError::Validation(errors))
        }
    }
}
