//! The utility billing calculator: rate resolution, usage deltas, amounts,
//! the one-shot deposit rule and bill assembly.

pub mod amounts;
pub mod assembler;
pub mod deposit;
mod error;
pub mod rates;
pub mod transitions;
pub mod usage;

pub use error::{BillingError, BillingResult};
