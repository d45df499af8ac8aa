//! Canonical bytes for the window and the heap.
//!
//! Each served range is an anonymous mapping. Requests carry the virtual
//! addresses the nodes use; translation to mapping offsets happens only here.

use memmap2::{MmapMut, MmapOptions};
use uva_protocol::AddressWindow;

use crate::error::{ServerError, ServerResult};

/// Alignment of every heap allocation.
pub const HEAP_ALIGN: usize = 16;

struct Segment {
    range: AddressWindow,
    map: MmapMut,
}

impl Segment {
    fn new(range: AddressWindow) -> ServerResult<Self> {
        if range.is_empty() {
            return Err(ServerError::Config(format!(
                "served range at {:#x} is empty",
                range.begin()
            )));
        }
        let map = MmapOptions::new().len(range.len()).map_anon()?;
        Ok(Self { range, map })
    }

    fn offset(&self, addr: usize, len: usize) -> Option<usize> {
        self.range
            .covers(addr, len)
            .then(|| addr - self.range.begin())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Which {
    Window,
    Heap,
}

pub struct WindowStore {
    window: Segment,
    heap: Option<Segment>,
    heap_next: usize,
}

impl WindowStore {
    pub fn new(window: AddressWindow, heap: Option<AddressWindow>) -> ServerResult<Self> {
        if let Some(heap) = heap {
            let overlaps = heap.begin() < window.end() && window.begin() < heap.end();
            if overlaps {
                return Err(ServerError::Config("heap overlaps the window".to_owned()));
            }
        }
        Ok(Self {
            window: Segment::new(window)?,
            heap_next: heap.map_or(0, |h| h.begin()),
            heap: heap.map(Segment::new).transpose()?,
        })
    }

    pub fn window(&self) -> AddressWindow {
        self.window.range
    }

    /// Copies `image` to the start of the window.
    pub fn seed(&mut self, image: &[u8]) -> ServerResult<()> {
        let window = self.window.range.len();
        if image.len() > window {
            return Err(ServerError::ImageTooLarge {
                len: image.len(),
                window,
            });
        }
        self.window.map[..image.len()].copy_from_slice(image);
        Ok(())
    }

    fn locate(&self, addr: usize, len: usize) -> ServerResult<(Which, usize)> {
        if let Some(offset) = self.window.offset(addr, len) {
            return Ok((Which::Window, offset));
        }
        self.heap
            .as_ref()
            .and_then(|heap| heap.offset(addr, len))
            .map(|offset| (Which::Heap, offset))
            .ok_or(ServerError::OutOfRange { addr, len })
    }

    fn segment_mut(&mut self, which: Which) -> &mut MmapMut {
        match (which, self.heap.as_mut()) {
            (Which::Heap, Some(heap)) => &mut heap.map,
            _ => &mut self.window.map,
        }
    }

    fn segment(&self, which: Which) -> &MmapMut {
        match (which, self.heap.as_ref()) {
            (Which::Heap, Some(heap)) => &heap.map,
            _ => &self.window.map,
        }
    }

    pub fn read(&self, addr: usize, len: usize) -> ServerResult<&[u8]> {
        let (which, offset) = self.locate(addr, len)?;
        Ok(&self.segment(which)[offset..offset + len])
    }

    pub fn write(&mut self, addr: usize, bytes: &[u8]) -> ServerResult<()> {
        let (which, offset) = self.locate(addr, bytes.len())?;
        self.segment_mut(which)[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill(&mut self, addr: usize, value: u8, len: usize) -> ServerResult<()> {
        let (which, offset) = self.locate(addr, len)?;
        self.segment_mut(which)[offset..offset + len].fill(value);
        Ok(())
    }

    /// Moves `len` bytes from `src` to `dest` as one operation; overlap is fine.
    pub fn copy(&mut self, dest: usize, src: usize, len: usize) -> ServerResult<()> {
        let (src_seg, src_off) = self.locate(src, len)?;
        let (dest_seg, dest_off) = self.locate(dest, len)?;
        if src_seg == dest_seg {
            self.segment_mut(src_seg)
                .copy_within(src_off..src_off + len, dest_off);
        } else {
            let bytes = self.segment(src_seg)[src_off..src_off + len].to_vec();
            self.segment_mut(dest_seg)[dest_off..dest_off + len].copy_from_slice(&bytes);
        }
        Ok(())
    }

    /// Bump-allocates `size` bytes aligned to [`HEAP_ALIGN`]. Returns 0 when exhausted or heapless.
    pub fn alloc(&mut self, size: usize) -> usize {
        let Some(heap) = self.heap.as_ref() else {
            return 0;
        };
        let start = match self.heap_next.checked_add(HEAP_ALIGN - 1) {
            Some(end) => end & !(HEAP_ALIGN - 1),
            None => return 0,
        };
        match start.checked_add(size) {
            Some(end) if end <= heap.range.end() => {
                self.heap_next = end;
                start
            }
            _ => 0,
        }
    }
}
