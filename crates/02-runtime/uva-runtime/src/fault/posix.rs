//! POSIX fault facility: `SIGSEGV` with `SA_SIGINFO` plus fixed anonymous mappings.

use std::io;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwapOption;
use nix::sys::mman::{mmap_anonymous, MapFlags, ProtFlags};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{sysconf, SysconfVar};
use tracing::error;

use super::{FaultInterceptor, PageMapper, DEFAULT_PAGE_SIZE};
use crate::error::{UvaError, UvaResult};

/// Maps pages with `mmap(MAP_FIXED | MAP_PRIVATE | MAP_ANONYMOUS)`.
#[derive(Debug, Clone, Copy)]
pub struct PosixPageMapper {
    page_size: usize,
}

impl Default for PosixPageMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PosixPageMapper {
    /// Queries the page size once from `sysconf`.
    pub fn new() -> Self {
        let page_size = sysconf(SysconfVar::PAGE_SIZE)
            .ok()
            .flatten()
            .and_then(|size| usize::try_from(size).ok())
            .filter(|size| size.is_power_of_two())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page_size }
    }
}

impl PageMapper for PosixPageMapper {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn map_page(&self, page: usize) -> UvaResult<()> {
        let invalid = || UvaError::MapFailed {
            page,
            source: io::Error::new(io::ErrorKind::InvalidInput, "page address must be non-zero"),
        };
        let addr = NonZeroUsize::new(page).ok_or_else(invalid)?;
        let len = NonZeroUsize::new(self.page_size).ok_or_else(invalid)?;
        // SAFETY: callers only pass pages inside the accepted bounds, which the
        // runtime owns; MAP_FIXED replaces nothing the rest of the program uses.
        unsafe {
            mmap_anonymous(
                Some(addr),
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_FIXED | MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
            )
        }
        .map_err(|e| UvaError::MapFailed {
            page,
            source: io::Error::from_raw_os_error(e as i32),
        })?;
        Ok(())
    }
}

struct Installed {
    interceptor: Arc<dyn FaultInterceptor>,
}

/// The process-wide interceptor. A running handler holds its own `Arc`, so
/// clearing the slot never frees an interceptor still in use.
static ACTIVE: OnceLock<ArcSwapOption<Installed>> = OnceLock::new();

fn active() -> &'static ArcSwapOption<Installed> {
    ACTIVE.get_or_init(ArcSwapOption::empty)
}

fn current() -> Option<Arc<Installed>> {
    ACTIVE.get().and_then(|slot| slot.load_full())
}

/// Keeps the process-wide `SIGSEGV` handler installed. Dropping it restores the previous handler.
pub struct InterceptorGuard {
    previous: SigAction,
}

/// Routes every `SIGSEGV` in the process to `interceptor`.
///
/// A failed fault is unrecoverable: the handler logs the error and aborts.
pub fn install_interceptor(interceptor: Arc<dyn FaultInterceptor>) -> UvaResult<InterceptorGuard> {
    let installed = Arc::new(Installed { interceptor });
    let displaced = active().compare_and_swap(&None::<Arc<Installed>>, Some(installed));
    if displaced.is_some() {
        return Err(UvaError::InterceptorBusy);
    }
    drop(displaced);

    let action = SigAction::new(
        SigHandler::SigAction(on_segv),
        SaFlags::SA_SIGINFO | SaFlags::SA_NODEFER,
        SigSet::empty(),
    );
    // SAFETY: `on_segv` only touches state published through `ACTIVE`.
    match unsafe { sigaction(Signal::SIGSEGV, &action) } {
        Ok(previous) => Ok(InterceptorGuard { previous }),
        Err(e) => {
            active().store(None);
            Err(UvaError::Interceptor(io::Error::from_raw_os_error(e as i32)))
        }
    }
}

impl Drop for InterceptorGuard {
    fn drop(&mut self) {
        // SAFETY: restoring the handler that was active before installation.
        if let Err(e) = unsafe { sigaction(Signal::SIGSEGV, &self.previous) } {
            error!(errno = %e, "failed to restore previous SIGSEGV handler");
        }
        active().store(None);
    }
}

extern "C" fn on_segv(_signal: libc::c_int, info: *mut libc::siginfo_t, _context: *mut libc::c_void) {
    // SAFETY: with SA_SIGINFO the kernel passes a valid siginfo_t.
    let addr = unsafe { (*info).si_addr() } as usize;
    let Some(installed) = current() else {
        error!(addr = format_args!("{addr:#x}"), "access violation with no interceptor installed");
        std::process::abort();
    };
    if let Err(err) = installed.interceptor.on_fault(addr) {
        error!(addr = format_args!("{addr:#x}"), %err, "unrecoverable access violation");
        std::process::abort();
    }
}
