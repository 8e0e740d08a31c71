use std::fmt;

use super::create::StornoRequest;
use crate::core::*;
use crate::crypto::{SigningKey, compute_zki};
use crate::service::exchange;
use crate::transport::Transport;
use crate::xml::{SignedFiscalRequest, sign_request};

/// Where a storno stands in the fiscalization pipeline.
///
/// ```text
/// Draft ─► ZkiComputed ─► Signed ─► Submitted ─┬─► Accepted
///                            ▲                 ├─► Rejected
///                            └── not delivered ┴─► Ambiguous
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StornoState {
    Draft,
    ZkiComputed,
    Signed,
    Submitted,
    Accepted { jir: String },
    Rejected { code: String, message: String },
    /// The request may have been delivered; reconcile by hand.
    Ambiguous,
}

impl StornoState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::ZkiComputed => "ZkiComputed",
            Self::Signed => "Signed",
            Self::Submitted => "Submitted",
            Self::Accepted { .. } => "Accepted",
            Self::Rejected { .. } => "Rejected",
            Self::Ambiguous => "Ambiguous",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Accepted { .. } | Self::Rejected { .. } | Self::Ambiguous
        )
    }

    fn allows(&self, next: &StornoState) -> bool {
        use StornoState::*;
        matches!(
            (self, next),
            (Draft, ZkiComputed)
                | (ZkiComputed, Signed)
                | (Signed, Submitted)
                // nothing reached the authority
                | (Submitted, Signed)
                | (Submitted, Accepted { .. })
                | (Submitted, Rejected { .. })
                | (Submitted, Ambiguous)
        )
    }
}

impl fmt::Display for StornoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Drives one storno through ZKI, signing and submission.
///
/// Each step is only legal from the state the previous step leaves behind;
/// calling them out of order returns [`FiscalError::InvalidTransition`]
/// without touching the engine.
#[derive(Debug)]
pub struct StornoEngine {
    storno: StornoRequest,
    state: StornoState,
    zki: Option<ZkiCode>,
    signed: Option<SignedFiscalRequest>,
}

impl StornoEngine {
    pub fn new(storno: StornoRequest) -> Self {
        Self {
            storno,
            state: StornoState::Draft,
            zki: None,
            signed: None,
        }
    }

    pub fn state(&self) -> &StornoState {
        &self.state
    }

    pub fn storno(&self) -> &StornoRequest {
        &self.storno
    }

    pub fn zki(&self) -> Option<&ZkiCode> {
        self.zki.as_ref()
    }

    pub fn signed(&self) -> Option<&SignedFiscalRequest> {
        self.signed.as_ref()
    }

    /// `Draft → ZkiComputed`.
    pub fn compute_zki<K: SigningKey + ?Sized>(&mut self, key: &K) -> Result<&ZkiCode, FiscalError> {
        self.check(&StornoState::ZkiComputed)?;
        let zki = compute_zki(key, &self.storno.request)?;
        self.state = StornoState::ZkiComputed;
        Ok(self.zki.insert(zki))
    }

    /// `ZkiComputed → Signed`.
    pub fn sign<K: SigningKey + ?Sized>(
        &mut self,
        key: &K,
    ) -> Result<&SignedFiscalRequest, FiscalError> {
        self.check(&StornoState::Signed)?;
        let zki = self.zki.as_ref().ok_or(FiscalError::InvalidTransition {
            from: self.state.name(),
            to: "Signed",
        })?;
        let signed = sign_request(&self.storno.request, zki, key)?;
        self.state = StornoState::Signed;
        Ok(self.signed.insert(signed))
    }

    /// `Signed → Submitted → Accepted | Rejected | Ambiguous`.
    ///
    /// A connection failure that never reached the authority returns the
    /// engine to `Signed`, so the same signed document can be sent again.
    /// Dropping the returned future before it completes leaves the engine
    /// `Ambiguous`.
    pub async fn submit<T: Transport>(&mut self, transport: &T) -> Result<FiscalReceipt, FiscalError> {
        self.check(&StornoState::Submitted)?;
        let (Some(zki), Some(signed)) = (self.zki.as_ref(), self.signed.as_ref()) else {
            return Err(FiscalError::InvalidTransition {
                from: self.state.name(),
                to: "Submitted",
            });
        };
        let in_flight = InFlight::start(&mut self.state);

        let result = exchange(transport, &self.storno.request, zki, signed).await;
        in_flight.settle(match &result {
            Ok(receipt) => StornoState::Accepted {
                jir: receipt.jir.clone(),
            },
            Err(FiscalError::Ambiguous { .. }) => StornoState::Ambiguous,
            Err(FiscalError::Transport(_)) => StornoState::Signed,
            Err(e) => StornoState::Rejected {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        });
        tracing::debug!(
            invoice = %self.storno.request.invoice_number,
            state = %self.state,
            "storno submission finished"
        );
        result
    }

    /// Run every remaining step from `Draft`.
    pub async fn run<K, T>(&mut self, key: &K, transport: &T) -> Result<FiscalReceipt, FiscalError>
    where
        K: SigningKey + ?Sized,
        T: Transport,
    {
        tracing::info!(
            invoice = %self.storno.request.invoice_number,
            original_jir = ?self.storno.request.original_jir,
            storno_type = ?self.storno.storno_type,
            "starting storno"
        );
        self.compute_zki(key)?;
        self.sign(key)?;
        self.submit(transport).await
    }

    fn check(&self, next: &StornoState) -> Result<(), FiscalError> {
        if self.state.allows(next) {
            Ok(())
        } else {
            Err(FiscalError::InvalidTransition {
                from: self.state.name(),
                to: next.name(),
            })
        }
    }
}

/// Holds the engine in `Submitted` while a request is on the wire.
struct InFlight<'a> {
    state: &'a mut StornoState,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn start(state: &'a mut StornoState) -> Self {
        *state = StornoState::Submitted;
        Self {
            state,
            settled: false,
        }
    }

    fn settle(mut self, next: StornoState) {
        *self.state = next;
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            // cancelled mid-flight: the envelope may have been delivered
            tracing::warn!("storno submission cancelled, outcome unknown");
            *self.state = StornoState::Ambiguous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use StornoState::*;
        assert!(Draft.allows(&ZkiComputed));
        assert!(ZkiComputed.allows(&Signed));
        assert!(Signed.allows(&Submitted));
        assert!(Submitted.allows(&Accepted { jir: "x".into() }));
        assert!(Submitted.allows(&Ambiguous));
    }

    #[test]
    fn skipping_or_leaving_terminal_states_is_rejected() {
        use StornoState::*;
        assert!(!Draft.allows(&Signed));
        assert!(!Draft.allows(&Submitted));
        assert!(!ZkiComputed.allows(&Submitted));
        assert!(!Accepted { jir: "x".into() }.allows(&Submitted));
        assert!(!Ambiguous.allows(&Signed));
        assert!(!Ambiguous.allows(&Submitted));
        assert!(
            !Rejected {
                code: "s001".into(),
                message: String::new()
            }
            .allows(&ZkiComputed)
        );
    }

    #[test]
    fn unsettled_flight_ends_ambiguous() {
        let mut state = StornoState::Signed;
        drop(InFlight::start(&mut state));
        assert_eq!(state, StornoState::Ambiguous);

        let mut state = StornoState::Signed;
        let flight = InFlight::start(&mut state);
        assert_eq!(*flight.state, StornoState::Submitted);
        flight.settle(StornoState::Signed);
        assert_eq!(state, StornoState::Signed);
    }

    #[test]
    fn terminal_states() {
        assert!(StornoState::Ambiguous.is_terminal());
        assert!(!StornoState::Signed.is_terminal());
        assert_eq!(StornoState::ZkiComputed.to_string(), "ZkiComputed");
    }
}
