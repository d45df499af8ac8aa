//! Access-violation interception, isolated behind two traits.
//!
//! [`PageMapper`] installs one read/write page at a fixed address.
//! [`FaultInterceptor`] is what the OS handler calls with the faulting address.
//! The POSIX implementation of both lives in [`posix`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::UvaResult;

#[cfg(unix)]
pub mod posix;

/// Page size assumed when the OS cannot be asked.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Installs page mappings at fixed addresses.
pub trait PageMapper: Send + Sync {
    /// Granularity of [`map_page`](Self::map_page). A power of two.
    fn page_size(&self) -> usize;

    /// Maps `[page, page + page_size)` read/write, replacing whatever was there.
    fn map_page(&self, page: usize) -> UvaResult<()>;
}

/// Receives access violations synchronously on the faulting thread.
pub trait FaultInterceptor: Send + Sync {
    /// Services a fault at `addr`. On `Ok` the faulting instruction is retried.
    fn on_fault(&self, addr: usize) -> UvaResult<FaultOutcome>;
}

/// What servicing a fault did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The page was already tracked; nothing was mapped or fetched.
    AlreadyMapped,
    /// One page was mapped. No protocol traffic.
    Mapped,
    /// The window's pages were mapped and its content fetched from the server.
    Fetched,
}

/// Counters for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Pages mapped so far.
    pub mapped_pages: usize,
    /// Window fetches performed. Never more than one.
    pub fetches: usize,
}

/// Mapped-page set in front of a [`PageMapper`].
pub(crate) struct PageTable {
    mapper: Arc<dyn PageMapper>,
    page_size: usize,
    mapped: Mutex<HashSet<usize>>,
    fetches: AtomicUsize,
}

impl PageTable {
    pub(crate) fn new(mapper: Arc<dyn PageMapper>) -> Self {
        let page_size = mapper.page_size();
        Self {
            mapper,
            page_size,
            mapped: Mutex::new(HashSet::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }

    /// Maps `page` unless it is already tracked. Returns whether a mapping was installed.
    pub(crate) fn ensure_mapped(&self, page: usize) -> UvaResult<bool> {
        let mut mapped = self.mapped.lock();
        if mapped.contains(&page) {
            return Ok(false);
        }
        self.mapper.map_page(page)?;
        mapped.insert(page);
        debug!(page = format_args!("{page:#x}"), "mapped page");
        Ok(true)
    }

    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> FaultStats {
        FaultStats {
            mapped_pages: self.mapped.lock().len(),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records pages instead of touching the address space.
    #[derive(Default)]
    pub(crate) struct RecordingMapper {
        pub(crate) pages: Mutex<Vec<usize>>,
    }

    impl PageMapper for RecordingMapper {
        fn page_size(&self) -> usize {
            DEFAULT_PAGE_SIZE
        }

        fn map_page(&self, page: usize) -> UvaResult<()> {
            self.pages.lock().push(page);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMapper;
    use super::*;

    #[test]
    fn tracked_pages_are_mapped_once() {
        let mapper = Arc::new(RecordingMapper::default());
        let table = PageTable::new(mapper.clone());
        assert!(table.ensure_mapped(0x1500_0000).unwrap());
        assert!(!table.ensure_mapped(0x1500_0000).unwrap());
        assert!(table.ensure_mapped(0x1500_1000).unwrap());
        assert_eq!(*mapper.pages.lock(), vec![0x1500_0000, 0x1500_1000]);
        assert_eq!(table.stats().mapped_pages, 2);
    }
}
