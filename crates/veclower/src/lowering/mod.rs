//! Rewrites that lower `contract` and `outerproduct`.
//!
//! Every entry point has the same contract: `Ok(Some(v))` means the op was
//! rewritten and `v` replaces its result, `Ok(None)` means the rewrite does
//! not apply, and `Err` means the op is malformed. The driver in
//! [`crate::patterns`] rolls back anything created by a rewrite that did not
//! return `Ok(Some(_))`.

pub(crate) mod arith;
pub(crate) mod dot;
pub(crate) mod elementwise;
pub(crate) mod outer;
pub(crate) mod outer_product;
pub mod peel;
mod reshape;
mod signature;

pub use peel::{PeelPlan, PeelState, PeelStep};
