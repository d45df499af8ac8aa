use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Contiguous virtual-address range `[begin, end)`.
///
/// Every process agrees on the bounds. Each keeps its own backing copy, so
/// content only moves through explicit protocol exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressWindow {
    begin: usize,
    end: usize,
}

impl AddressWindow {
    pub fn new(begin: usize, end: usize) -> ProtocolResult<Self> {
        if begin > end {
            return Err(ProtocolError::InvalidWindow { begin, end });
        }
        Ok(Self { begin, end })
    }

    pub fn from_len(begin: usize, len: usize) -> ProtocolResult<Self> {
        let end = begin
            .checked_add(len)
            .ok_or(ProtocolError::InvalidWindow {
                begin,
                end: usize::MAX,
            })?;
        Self::new(begin, end)
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn contains(&self, addr: usize) -> bool {
        (self.begin..self.end).contains(&addr)
    }

    /// True when all of `[addr, addr + len)` lies inside the window.
    pub fn covers(&self, addr: usize, len: usize) -> bool {
        addr >= self.begin
            && addr
                .checked_add(len)
                .is_some_and(|end| end <= self.end)
    }

    /// Byte offset of `addr` from the window start.
    pub fn offset_of(&self, addr: usize) -> Option<usize> {
        self.contains(addr).then(|| addr - self.begin)
    }

    /// Start addresses of the `page_size`-aligned pages overlapping the window.
    pub fn pages(&self, page_size: usize) -> impl Iterator<Item = usize> {
        debug_assert!(page_size.is_power_of_two());
        let first = self.begin & !(page_size - 1);
        let end = self.end;
        let count = if self.is_empty() {
            0
        } else {
            (end - first).div_ceil(page_size)
        };
        (0..count).map(move |i| first + i * page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert!(AddressWindow::new(0x2000, 0x1000).is_err());
        assert!(AddressWindow::from_len(usize::MAX, 2).is_err());
        assert!(AddressWindow::new(0x1000, 0x1000).unwrap().is_empty());
    }

    #[test]
    fn containment_is_half_open() {
        let window = AddressWindow::from_len(0x1500_0000, 0x100).unwrap();
        assert!(window.contains(0x1500_0000));
        assert!(window.contains(0x1500_00ff));
        assert!(!window.contains(0x1500_0100));
        assert!(window.covers(0x1500_0080, 0x80));
        assert!(!window.covers(0x1500_0080, 0x81));
        assert_eq!(window.offset_of(0x1500_0010), Some(0x10));
        assert_eq!(window.offset_of(0x14ff_ffff), None);
    }

    #[test]
    fn pages_cover_unaligned_bounds() {
        let window = AddressWindow::new(0x1ff0, 0x3010).unwrap();
        let pages: Vec<_> = window.pages(0x1000).collect();
        assert_eq!(pages, vec![0x1000, 0x2000, 0x3000]);

        let empty = AddressWindow::new(0x2000, 0x2000).unwrap();
        assert_eq!(empty.pages(0x1000).count(), 0);
    }
}
