//! Flash device collaborator — out of scope to implement here; this is the
//! consumed interface only.
//!
//! Page read/write/erase accounting is synchronous (the device just records
//! the access and its simulated timing); `rw_ppns`/`erase_pbn_extent` are
//! the two suspension points a cooperative task yields at, so they are
//! `async fn`s that the host's discrete-event executor polls to completion.
//! The external simulator is responsible for channel-level serialization of
//! I/O and timing, so these take `&self` rather than `&mut self` — the
//! implementor owns whatever interior mutability it needs, wrapping its
//! mutable state behind a lock rather than asking callers to hold `&mut`.
//!
//! The returned futures are not `Send`: the executor driving them is a
//! single cooperative task runner, not a work-stealing thread pool, and the
//! rest of the crate shares state through `Rc<RefCell<_>>` on that
//! assumption, so a `FlashDevice` is free to do the same.
use crate::tag::{RwOp, Tag};
use crate::types::{Pbn, Ppn};

pub trait FlashDevice {
    /// Page payload type; `Option` at the call site models "don't care"
    /// (speed-mode) writes.
    type Data: Clone;
    type Error: std::error::Error + 'static;

    /// Synchronous accounting read. Returns `None` if the page was never
    /// written (callers are expected to already know the page is valid).
    fn page_read(&self, ppn: Ppn, tag: Tag) -> Option<Self::Data>;

    /// Synchronous accounting write. NAND constraint: within a block,
    /// pages must be programmed in strictly ascending offset order —
    /// enforced by callers (the garbage collector), not by this trait.
    fn page_write(&self, ppn: Ppn, tag: Tag, data: Option<Self::Data>);

    /// Synchronous accounting erase of a single block.
    fn block_erase(&self, pbn: Pbn, tag: Tag);

    /// Suspending, batched read/write of `ppns`, in the given direction.
    fn rw_ppns(&self, ppns: &[Ppn], op: RwOp, tag: Tag) -> impl std::future::Future<Output = Result<(), Self::Error>>;

    /// Suspending erase of `n` consecutive blocks starting at `pbn`.
    fn erase_pbn_extent(&self, pbn: Pbn, n: u32, tag: Tag) -> impl std::future::Future<Output = Result<(), Self::Error>>;
}
