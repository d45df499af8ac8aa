//! Request/ack code table.
//!
//! The first word of every unit names its kind. Every request kind has exactly
//! one matching ack kind; codes are frozen because both ends of a connection
//! must agree on them.

use crate::queue::Word;

/// Startup permission token granting a participant entry.
pub const START_PERMITTED: Word = 1;
/// Startup permission token refusing a participant.
pub const START_DENIED: Word = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum MsgKind {
    HeapAllocReq = 0,
    HeapAllocAck = 1,
    LoadReq = 2,
    LoadAck = 3,
    StoreReq = 4,
    StoreAck = 5,
    MmapReq = 6,
    MmapAck = 7,
    MemsetReq = 8,
    MemsetAck = 9,
    MemcpyReq = 10,
    MemcpyAck = 11,
    MemmoveReq = 12,
    MemmoveAck = 13,
    GlobalSegfaultReq = 30,
    GlobalSegfaultAck = 31,
    GlobalInitCompleteSig = 32,
    GlobalInitCompleteAck = 33,
}

impl MsgKind {
    /// Every request kind, in code order.
    pub const REQUESTS: [MsgKind; 9] = [
        MsgKind::HeapAllocReq,
        MsgKind::LoadReq,
        MsgKind::StoreReq,
        MsgKind::MmapReq,
        MsgKind::MemsetReq,
        MsgKind::MemcpyReq,
        MsgKind::MemmoveReq,
        MsgKind::GlobalSegfaultReq,
        MsgKind::GlobalInitCompleteSig,
    ];

    pub const fn code(self) -> Word {
        self as Word
    }

    pub fn from_word(word: Word) -> Option<Self> {
        let kind = match word {
            0 => MsgKind::HeapAllocReq,
            1 => MsgKind::HeapAllocAck,
            2 => MsgKind::LoadReq,
            3 => MsgKind::LoadAck,
            4 => MsgKind::StoreReq,
            5 => MsgKind::StoreAck,
            6 => MsgKind::MmapReq,
            7 => MsgKind::MmapAck,
            8 => MsgKind::MemsetReq,
            9 => MsgKind::MemsetAck,
            10 => MsgKind::MemcpyReq,
            11 => MsgKind::MemcpyAck,
            12 => MsgKind::MemmoveReq,
            13 => MsgKind::MemmoveAck,
            30 => MsgKind::GlobalSegfaultReq,
            31 => MsgKind::GlobalSegfaultAck,
            32 => MsgKind::GlobalInitCompleteSig,
            33 => MsgKind::GlobalInitCompleteAck,
            _ => return None,
        };
        Some(kind)
    }

    /// Requests carry even codes, their acks the next odd code.
    pub const fn is_request(self) -> bool {
        self.code() % 2 == 0
    }

    /// The ack answering this request, or `None` for ack kinds.
    pub fn ack(self) -> Option<MsgKind> {
        if self.is_request() {
            MsgKind::from_word(self.code() + 1)
        } else {
            None
        }
    }

    /// The request this ack answers, or `None` for request kinds.
    pub fn request(self) -> Option<MsgKind> {
        if self.is_request() {
            None
        } else {
            MsgKind::from_word(self.code() - 1)
        }
    }
}
