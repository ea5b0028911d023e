//! Recorder collaborator: a telemetry sink the core counts events into.
//! Implemented and owned by the host; the core only ever calls it.

/// Categories a host should expect at minimum:
/// `garbage_collection ∈ {switch_merge, partial_merge, full_merge}`;
/// `GC ∈ {StopIteration}`.
pub trait Recorder {
    fn count_me(&self, category: &str, event: &str);

    /// Verbosity filter. Defaults to quiet.
    fn verbose(&self) -> bool {
        false
    }
}

/// A recorder that discards everything, for hosts/tests that don't care.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn count_me(&self, _category: &str, _event: &str) {}
}
