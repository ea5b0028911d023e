//! Telemetry category tag passed to the flash device and recorder.
//!
//! The category set is closed, so a typed enum is used here instead of
//! stringly-typed constants.

/// Which flash/recorder operation triggered an I/O, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Foreground,
    SwitchMerge,
    PartialMerge,
    FullMerge,
    /// GC triggered because the write path ran out of log pages mid-write.
    WriteDrivenErase,
    /// GC triggered by crossing the high watermark.
    ThresholdGc,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Foreground => "FOREGROUND",
            Tag::SwitchMerge => "SWITCH.MERGE",
            Tag::PartialMerge => "PARTIAL.MERGE",
            Tag::FullMerge => "FULL.MERGE",
            Tag::WriteDrivenErase => "WRITE.DRIVEN.DIRECT.ERASE",
            Tag::ThresholdGc => "THRESHOLD.GC.DIRECT.ERASE",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a batched, suspending flash I/O (`FlashDevice::rw_ppns`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RwOp {
    Read,
    Write,
}
