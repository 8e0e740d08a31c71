//! Core fiscalization types, formatting, validation, and configuration.
//!
//! Nothing in this module touches key material or the network; it is the
//! shared vocabulary of the signing, XML and transport layers.

mod builder;
mod config;
mod error;
mod format;
mod types;
mod validation;

pub use builder::*;
pub use config::*;
pub use error::*;
pub use format::*;
pub use types::*;
pub use validation::*;
