use serde::{Deserialize, Serialize};
use uva_protocol::AddressWindow;

/// Start of the range historically accepted for fault servicing.
pub const DEFAULT_ACCEPTED_BEGIN: usize = 0x1500_0000;
/// End (exclusive) of the range historically accepted for fault servicing.
pub const DEFAULT_ACCEPTED_END: usize = 0x3800_0000;

/// Address ranges inside which a fault is legitimate.
///
/// A fault anywhere else is a real memory-safety bug and must never be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedBounds {
    ranges: Vec<AddressWindow>,
}

impl Default for AcceptedBounds {
    fn default() -> Self {
        Self {
            ranges: vec![AddressWindow::new(DEFAULT_ACCEPTED_BEGIN, DEFAULT_ACCEPTED_END)
                .unwrap_or_else(|_| unreachable!("default bounds are ordered"))],
        }
    }
}

impl AcceptedBounds {
    /// No ranges at all; every fault is out of bounds.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Exactly the given window.
    pub fn covering(window: AddressWindow) -> Self {
        Self::empty().with_range(window)
    }

    /// Adds `range` unless an existing range already contains it.
    pub fn with_range(mut self, range: AddressWindow) -> Self {
        let already_covered = self
            .ranges
            .iter()
            .any(|r| r.covers(range.begin(), range.len()));
        if !already_covered {
            self.ranges.push(range);
        }
        self
    }

    /// True when `addr` lies in any accepted range.
    pub fn contains(&self, addr: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(addr))
    }

    /// True when the whole of `window` lies in one accepted range.
    pub fn covers_window(&self, window: &AddressWindow) -> bool {
        self.ranges
            .iter()
            .any(|r| r.covers(window.begin(), window.len()))
    }

    /// The accepted ranges, in insertion order.
    pub fn ranges(&self) -> &[AddressWindow] {
        &self.ranges
    }
}

/// A faulting address and the page it falls within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEvent {
    /// Address the faulting instruction touched.
    pub addr: usize,
    /// Start of the page containing `addr`.
    pub page: usize,
}

impl FaultEvent {
    /// `page_size` must be a power of two.
    pub fn new(addr: usize, page_size: usize) -> Self {
        Self {
            addr,
            page: addr & !(page_size - 1),
        }
    }
}
