//! In-memory `FlashDevice` test double, shared across the integration test
//! binaries via `mod support;` in each.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use nkftl::flash::FlashDevice;
use nkftl::tag::{RwOp, Tag};
use nkftl::types::{Pbn, Ppn};

pub struct MemFlash {
    pages: RefCell<Vec<Option<Vec<u8>>>>,
    pub reads: RefCell<u64>,
    pub writes: RefCell<u64>,
    pub erases: RefCell<u64>,
}

impl MemFlash {
    pub fn new(n_pages: u64) -> Self {
        MemFlash {
            pages: RefCell::new(vec![None; n_pages as usize]),
            reads: RefCell::new(0),
            writes: RefCell::new(0),
            erases: RefCell::new(0),
        }
    }
}

impl FlashDevice for MemFlash {
    type Data = Vec<u8>;
    type Error = Infallible;

    fn page_read(&self, ppn: Ppn, _tag: Tag) -> Option<Vec<u8>> {
        *self.reads.borrow_mut() += 1;
        self.pages.borrow()[ppn as usize].clone()
    }

    fn page_write(&self, ppn: Ppn, _tag: Tag, data: Option<Vec<u8>>) {
        *self.writes.borrow_mut() += 1;
        self.pages.borrow_mut()[ppn as usize] = data;
    }

    fn block_erase(&self, _pbn: Pbn, _tag: Tag) {
        *self.erases.borrow_mut() += 1;
    }

    async fn rw_ppns(&self, _ppns: &[Ppn], _op: RwOp, _tag: Tag) -> Result<(), Infallible> {
        Ok(())
    }

    async fn erase_pbn_extent(&self, pbn: Pbn, n: u32, tag: Tag) -> Result<(), Infallible> {
        for off in 0..n as u64 {
            self.block_erase(pbn + off, tag);
        }
        Ok(())
    }
}

/// `Ftl::new` takes ownership of the recorder it's given, so a test that
/// wants to inspect counts afterward keeps a [`EventLog`] handle cloned out
/// of this *before* handing the `CountingRecorder` over.
pub type EventLog = Rc<RefCell<Vec<(String, String)>>>;

pub struct CountingRecorder {
    events: EventLog,
}

impl CountingRecorder {
    pub fn new() -> (Self, EventLog) {
        let events: EventLog = Rc::new(RefCell::new(Vec::new()));
        (CountingRecorder { events: events.clone() }, events)
    }
}

pub fn count_of(log: &EventLog, category: &str, event: &str) -> usize {
    log.borrow().iter().filter(|(c, e)| c == category && e == event).count()
}

impl nkftl::Recorder for CountingRecorder {
    fn count_me(&self, category: &str, event: &str) {
        self.events.borrow_mut().push((category.to_string(), event.to_string()));
    }

    fn verbose(&self) -> bool {
        true
    }
}
