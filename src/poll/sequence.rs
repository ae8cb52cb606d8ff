//! Issue-order sequencing for poll responses.

/// Tags requests with increasing sequence numbers and admits a response only
/// if it was issued after the most recently applied one.
///
/// # Examples
///
/// ```
/// use analysis_tasks::poll::SequenceGate;
///
/// let mut gate = SequenceGate::new();
/// let first = gate.issue();
/// let second = gate.issue();
///
/// assert!(gate.accept(second));
/// assert!(!gate.accept(first)); // arrived late, discarded
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequenceGate {
    next: u64,
    last_applied: u64,
}

impl SequenceGate {
    /// Creates a gate with nothing issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the sequence number for a new request. Numbers start at 1.
    pub fn issue(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    /// Records `seq` as applied if it is newer than the last applied
    /// response. Returns whether the response may be applied.
    pub fn accept(&mut self, seq: u64) -> bool {
        if seq > self.last_applied {
            self.last_applied = seq;
            true
        } else {
            false
        }
    }

    /// Returns `true` if a newer response has already been applied.
    pub fn is_superseded(&self, seq: u64) -> bool {
        seq <= self.last_applied
    }

    /// Sequence number of the last applied response, `0` if none.
    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }
}
