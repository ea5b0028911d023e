//! Error kinds surfaced by the core.
//!
//! `nkftl` is a `std` library, so it uses `thiserror`'s derive for `enum` +
//! `Display` rather than hand-rolling both, the way a `no_std` crate would
//! have to.

use std::fmt;

/// A stale precondition (a merge racing a concurrent invalidation) is
/// deliberately not a variant here: it is internal-only and handled by the
/// merge silently returning `Ok(())` without mutating state, never surfaced
/// to the caller.
#[derive(Debug, thiserror::Error)]
pub enum FtlError<E>
where
    E: std::error::Error + 'static,
{
    /// No free block remains when one is required after a full GC pass.
    #[error("out of free flash blocks")]
    OutOfSpace,

    /// One of invariants I1-I7 was found violated at a self-check boundary.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Propagated unchanged from the external flash device.
    #[error("flash device error: {0}")]
    Flash(#[from] E),
}

impl<E: std::error::Error + 'static> FtlError<E> {
    pub fn invariant(msg: impl fmt::Display) -> Self {
        FtlError::InvariantViolation(msg.to_string())
    }
}

pub type FtlResult<T, E> = Result<T, FtlError<E>>;
