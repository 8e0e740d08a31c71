//! Service configuration: issuer identity, environment and key material.

use serde::{Deserialize, Deserializer};
use std::fmt;
use zeroize::Zeroizing;

use super::error::{FiscalError, ValidationError};
use super::types::SequenceMark;
use super::validation::is_valid_oib;

/// Target CIS environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl Environment {
    /// Fixed fiscalization endpoint for this environment.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Test => "https://cistest.apis-it.hr:8449/FiskalizacijaServiceTest",
            Self::Production => "https://cis.porezna-uprava.hr:8449/FiskalizacijaService",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Some(Self::Test),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Everything needed to start a fiscalization service.
///
/// Secrets are held in zeroizing buffers and redacted from `Debug`.
#[derive(Clone, Deserialize)]
pub struct FiscalConfig {
    /// Issuer OIB.
    pub oib: String,
    pub business_space_code: String,
    pub cash_register_code: String,
    #[serde(default)]
    pub environment: Environment,
    /// Base64-encoded PKCS#12 container.
    #[serde(deserialize_with = "secret")]
    pub certificate_blob: Zeroizing<String>,
    #[serde(deserialize_with = "secret")]
    pub certificate_password: Zeroizing<String>,
    /// Operator OIB; defaults to the issuer OIB.
    #[serde(default)]
    pub operator_oib: Option<String>,
    #[serde(default = "default_true")]
    pub vat_registered: bool,
    #[serde(default)]
    pub sequence_mark: SequenceMark,
    /// PEM bundle of the authority's CA chain. When set, only this chain is
    /// trusted. Required for the TEST environment, whose PKI is private.
    #[serde(default)]
    pub pinned_ca_pem: Option<String>,
    /// Overrides the environment endpoint.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn secret<'de, D: Deserializer<'de>>(d: D) -> Result<Zeroizing<String>, D::Error> {
    String::deserialize(d).map(Zeroizing::new)
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl fmt::Debug for FiscalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiscalConfig")
            .field("oib", &self.oib)
            .field("business_space_code", &self.business_space_code)
            .field("cash_register_code", &self.cash_register_code)
            .field("environment", &self.environment)
            .field("certificate_blob", &"<redacted>")
            .field("certificate_password", &"<redacted>")
            .field("operator_oib", &self.operator_oib)
            .field("vat_registered", &self.vat_registered)
            .field("sequence_mark", &self.sequence_mark)
            .field("pinned_ca_pem", &self.pinned_ca_pem.as_ref().map(|_| "<pem>"))
            .field("endpoint_url", &self.endpoint_url)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl FiscalConfig {
    /// Parse a JSON configuration document and validate it.
    pub fn from_json(json: &str) -> Result<Self, FiscalError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| FiscalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `FISKAL_*` environment variables.
    ///
    /// `FISKAL_CA_BUNDLE` names a PEM file whose content becomes
    /// [`pinned_ca_pem`](Self::pinned_ca_pem).
    pub fn from_env() -> Result<Self, FiscalError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FiscalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| FiscalError::Config(format!("{key} is not set")))
        };

        let environment = match lookup("FISKAL_ENVIRONMENT") {
            Some(v) => Environment::parse(&v).ok_or_else(|| {
                FiscalError::Config(format!("FISKAL_ENVIRONMENT '{v}' is not test|production"))
            })?,
            None => Environment::Test,
        };

        let sequence_mark = match lookup("FISKAL_SEQUENCE_MARK").as_deref() {
            None | Some("P") => SequenceMark::BusinessSpace,
            Some("N") => SequenceMark::CashRegister,
            Some(other) => {
                return Err(FiscalError::Config(format!(
                    "FISKAL_SEQUENCE_MARK '{other}' is not P|N"
                )));
            }
        };

        let pinned_ca_pem = match lookup("FISKAL_CA_BUNDLE") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                FiscalError::Config(format!("cannot read CA bundle {path}: {e}"))
            })?),
            None => None,
        };

        let parse_secs = |key: &str, default: u64| -> Result<u64, FiscalError> {
            match lookup(key) {
                Some(v) => v
                    .parse()
                    .map_err(|_| FiscalError::Config(format!("{key} '{v}' is not a number"))),
                None => Ok(default),
            }
        };

        let config = Self {
            oib: required("FISKAL_OIB")?,
            business_space_code: required("FISKAL_BUSINESS_SPACE")?,
            cash_register_code: required("FISKAL_CASH_REGISTER")?,
            environment,
            certificate_blob: Zeroizing::new(required("FISKAL_CERTIFICATE")?),
            certificate_password: Zeroizing::new(required("FISKAL_CERTIFICATE_PASSWORD")?),
            operator_oib: lookup("FISKAL_OPERATOR_OIB"),
            vat_registered: lookup("FISKAL_VAT_REGISTERED")
                .is_none_or(|v| !matches!(v.as_str(), "false" | "0" | "no")),
            sequence_mark,
            pinned_ca_pem,
            endpoint_url: lookup("FISKAL_ENDPOINT"),
            connect_timeout_secs: parse_secs("FISKAL_CONNECT_TIMEOUT_SECS", default_connect_timeout())?,
            request_timeout_secs: parse_secs("FISKAL_REQUEST_TIMEOUT_SECS", default_request_timeout())?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Endpoint the transport will POST to.
    pub fn endpoint(&self) -> &str {
        self.endpoint_url
            .as_deref()
            .unwrap_or_else(|| self.environment.endpoint())
    }

    /// Check identity fields and environment consistency.
    pub fn validate(&self) -> Result<(), FiscalError> {
        let mut errors = Vec::new();

        if !is_valid_oib(&self.oib) {
            errors.push(ValidationError::new("oib", "not a valid OIB"));
        }
        if let Some(op) = &self.operator_oib {
            if !is_valid_oib(op) {
                errors.push(ValidationError::new("operator_oib", "not a valid OIB"));
            }
        }
        if self.business_space_code.is_empty()
            || !self
                .business_space_code
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            errors.push(ValidationError::new(
                "business_space_code",
                "must be alphanumeric",
            ));
        }
        if self.cash_register_code.is_empty()
            || !self.cash_register_code.bytes().all(|b| b.is_ascii_digit())
        {
            errors.push(ValidationError::new("cash_register_code", "must be numeric"));
        }
        if self.certificate_blob.trim().is_empty() {
            errors.push(ValidationError::new("certificate_blob", "must not be empty"));
        }
        if self.environment == Environment::Test
            && self.endpoint_url.is_none()
            && self.pinned_ca_pem.is_none()
        {
            errors.push(ValidationError::new(
                "pinned_ca_pem",
                "the TEST environment uses a private PKI; its CA chain must be pinned",
            ));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            errors.push(ValidationError::new("timeouts", "must be greater than zero"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FiscalError::Validation(errors))
        }
    }
}
