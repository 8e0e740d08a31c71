//! Storno (reversal) invoices.
//!
//! A fiscalized invoice is never changed; it is reversed by a new invoice
//! with negative amounts that references the original JIR. The storno then
//! goes through the same ZKI → XML → signature → transport pipeline as any
//! other invoice, tracked by [`StornoEngine`].

mod create;
mod engine;

pub use create::{
    FiscalisedInvoice, StornoRequest, StornoType, create_full_storno, create_partial_storno,
};
pub use engine::{StornoEngine, StornoState};
