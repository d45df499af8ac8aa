//! A real access violation in an unmapped window, serviced by the installed handler.

use std::num::NonZeroUsize;
use std::ptr::{self, NonNull};

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use uva_runtime::fault::posix::PosixPageMapper;
use uva_runtime::{AddressWindow, NodeRole, PageMapper, UvaCoordinator};

use crate::support::{runtime_config, server_config, start};

const IMAGE: &[u8] = b"demand paged globals";

/// Inaccessible pages at a kernel-chosen address; touching them raises SIGSEGV.
fn reserve(len: usize) -> usize {
    // SAFETY: a fresh PROT_NONE mapping that nothing else refers to.
    let ptr = unsafe {
        mmap_anonymous(
            None,
            NonZeroUsize::new(len).unwrap(),
            ProtFlags::PROT_NONE,
            MapFlags::MAP_PRIVATE,
        )
    }
    .unwrap();
    ptr.as_ptr() as usize
}

#[test]
fn first_touch_fetches_the_window() {
    let page = PosixPageMapper::new().page_size();
    let base = reserve(2 * page);
    let window = AddressWindow::from_len(base, 2 * page).unwrap();

    let server = start(
        server_config(window)
            .with_initializers(0)
            .with_gate(false)
            .with_image(IMAGE.to_vec()),
    );
    let config = runtime_config(&server, window, NodeRole::Participant);

    // SAFETY: the reservation above belongs to this test and nothing else maps it.
    let mut coordinator = unsafe { UvaCoordinator::initialize(&config) }.unwrap();
    coordinator.startup_gate(NodeRole::Participant).unwrap();
    assert_eq!(coordinator.stats().fetches, 0);

    let head: Vec<u8> = (0..IMAGE.len())
        // SAFETY: window addresses are serviced by the interceptor.
        .map(|i| unsafe { ptr::read_volatile((base + i) as *const u8) })
        .collect();
    assert_eq!(head, IMAGE);

    // SAFETY: the window is mapped read/write now.
    let tail = unsafe { ptr::read_volatile((base + 2 * page - 1) as *const u8) };
    assert_eq!(tail, 0);

    let stats = coordinator.stats();
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.mapped_pages, 2);

    coordinator.finalize().unwrap();
    server.shutdown();
    // SAFETY: the window pages were remapped in place; the range is still ours.
    unsafe { munmap(NonNull::new(base as *mut libc::c_void).unwrap(), 2 * page) }.unwrap();
}
