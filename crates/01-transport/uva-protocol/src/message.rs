//! Operand layouts of every request kind and its ack.
//!
//! | Request | Operands | Ack operands |
//! |---|---|---|
//! | `HeapAlloc` | size | address |
//! | `Load` | addr, len | range(len) |
//! | `Store` | addr, len, range(len) | none |
//! | `Mmap` | addr, len | address |
//! | `Memset` | addr, value, len | none |
//! | `Memcpy` / `Memmove` | dest, src, len | none |
//! | `GlobalSegfault` | begin, end | range(end - begin) |
//! | `GlobalInitComplete` | none | none |

use transport::{MsgKind, Word};

use crate::codec::{WordSink, WordSource};
use crate::error::{ProtocolError, ProtocolResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    HeapAlloc { size: usize },
    Load { addr: usize, len: usize },
    Store { addr: usize, bytes: Vec<u8> },
    Mmap { addr: usize, len: usize },
    Memset { addr: usize, value: u8, len: usize },
    Memcpy { dest: usize, src: usize, len: usize },
    Memmove { dest: usize, src: usize, len: usize },
    GlobalSegfault { begin: usize, end: usize },
    GlobalInitComplete,
}

impl Request {
    pub fn kind(&self) -> MsgKind {
        match self {
            Request::HeapAlloc { .. } => MsgKind::HeapAllocReq,
            Request::Load { .. } => MsgKind::LoadReq,
            Request::Store { .. } => MsgKind::StoreReq,
            Request::Mmap { .. } => MsgKind::MmapReq,
            Request::Memset { .. } => MsgKind::MemsetReq,
            Request::Memcpy { .. } => MsgKind::MemcpyReq,
            Request::Memmove { .. } => MsgKind::MemmoveReq,
            Request::GlobalSegfault { .. } => MsgKind::GlobalSegfaultReq,
            Request::GlobalInitComplete => MsgKind::GlobalInitCompleteSig,
        }
    }

    /// The ack kind the peer must answer with.
    pub fn ack_kind(&self) -> MsgKind {
        match self.kind().ack() {
            Some(kind) => kind,
            None => unreachable!("request kinds always pair with an ack"),
        }
    }

    pub fn encode(&self, sink: &mut impl WordSink) {
        sink.push_word(self.kind().code());
        match self {
            Request::HeapAlloc { size } => sink.push_word(*size as Word),
            Request::Load { addr, len } | Request::Mmap { addr, len } => {
                sink.push_word(*addr as Word);
                sink.push_word(*len as Word);
            }
            Request::Store { addr, bytes } => {
                sink.push_word(*addr as Word);
                sink.push_word(bytes.len() as Word);
                sink.push_range(bytes);
            }
            Request::Memset { addr, value, len } => {
                sink.push_word(*addr as Word);
                sink.push_word(Word::from(*value));
                sink.push_word(*len as Word);
            }
            Request::Memcpy { dest, src, len } | Request::Memmove { dest, src, len } => {
                sink.push_word(*dest as Word);
                sink.push_word(*src as Word);
                sink.push_word(*len as Word);
            }
            Request::GlobalSegfault { begin, end } => {
                sink.push_word(*begin as Word);
                sink.push_word(*end as Word);
            }
            Request::GlobalInitComplete => {}
        }
    }

    /// Reads one whole request; the unit must hold nothing else.
    pub fn decode(source: &mut impl WordSource) -> ProtocolResult<Self> {
        let code = source.take_word()?;
        let kind = MsgKind::from_word(code).ok_or(ProtocolError::UnknownKind(code))?;
        let request = match kind {
            MsgKind::HeapAllocReq => Request::HeapAlloc {
                size: source.take_usize()?,
            },
            MsgKind::LoadReq => Request::Load {
                addr: source.take_usize()?,
                len: source.take_usize()?,
            },
            MsgKind::StoreReq => {
                let addr = source.take_usize()?;
                let len = source.take_usize()?;
                let bytes = source.take_range(len)?.to_vec();
                Request::Store { addr, bytes }
            }
            MsgKind::MmapReq => Request::Mmap {
                addr: source.take_usize()?,
                len: source.take_usize()?,
            },
            MsgKind::MemsetReq => Request::Memset {
                addr: source.take_usize()?,
                // The wire carries an int; only the low byte is stored.
                value: source.take_word()? as u8,
                len: source.take_usize()?,
            },
            MsgKind::MemcpyReq => Request::Memcpy {
                dest: source.take_usize()?,
                src: source.take_usize()?,
                len: source.take_usize()?,
            },
            MsgKind::MemmoveReq => Request::Memmove {
                dest: source.take_usize()?,
                src: source.take_usize()?,
                len: source.take_usize()?,
            },
            MsgKind::GlobalSegfaultReq => Request::GlobalSegfault {
                begin: source.take_usize()?,
                end: source.take_usize()?,
            },
            MsgKind::GlobalInitCompleteSig => Request::GlobalInitComplete,
            ack => return Err(ProtocolError::NotARequest(ack)),
        };
        ensure_consumed(source, kind)?;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    HeapAlloc { addr: usize },
    Load { bytes: Vec<u8> },
    Store,
    Mmap { addr: usize },
    Memset,
    Memcpy,
    Memmove,
    GlobalSegfault { bytes: Vec<u8> },
    GlobalInitComplete,
}

impl Ack {
    pub fn kind(&self) -> MsgKind {
        match self {
            Ack::HeapAlloc { .. } => MsgKind::HeapAllocAck,
            Ack::Load { .. } => MsgKind::LoadAck,
            Ack::Store => MsgKind::StoreAck,
            Ack::Mmap { .. } => MsgKind::MmapAck,
            Ack::Memset => MsgKind::MemsetAck,
            Ack::Memcpy => MsgKind::MemcpyAck,
            Ack::Memmove => MsgKind::MemmoveAck,
            Ack::GlobalSegfault { .. } => MsgKind::GlobalSegfaultAck,
            Ack::GlobalInitComplete => MsgKind::GlobalInitCompleteAck,
        }
    }

    pub fn encode(&self, sink: &mut impl WordSink) {
        sink.push_word(self.kind().code());
        match self {
            Ack::HeapAlloc { addr } | Ack::Mmap { addr } => sink.push_word(*addr as Word),
            Ack::Load { bytes } | Ack::GlobalSegfault { bytes } => sink.push_range(bytes),
            Ack::Store | Ack::Memset | Ack::Memcpy | Ack::Memmove | Ack::GlobalInitComplete => {}
        }
    }

    /// Reads the ack answering `request`. Range lengths come from the request,
    /// since ranges travel without a length prefix.
    pub fn decode_for(request: &Request, source: &mut impl WordSource) -> ProtocolResult<Self> {
        let expected = request.ack_kind();
        let got = source.take_word()?;
        if got != expected.code() {
            return Err(ProtocolError::WrongAck { expected, got });
        }
        let ack = match request {
            Request::HeapAlloc { .. } => Ack::HeapAlloc {
                addr: source.take_usize()?,
            },
            Request::Load { len, .. } => Ack::Load {
                bytes: source.take_range(*len)?.to_vec(),
            },
            Request::Store { .. } => Ack::Store,
            Request::Mmap { .. } => Ack::Mmap {
                addr: source.take_usize()?,
            },
            Request::Memset { .. } => Ack::Memset,
            Request::Memcpy { .. } => Ack::Memcpy,
            Request::Memmove { .. } => Ack::Memmove,
            Request::GlobalSegfault { begin, end } => Ack::GlobalSegfault {
                bytes: source.take_range(end.saturating_sub(*begin))?.to_vec(),
            },
            Request::GlobalInitComplete => Ack::GlobalInitComplete,
        };
        ensure_consumed(source, expected)?;
        Ok(ack)
    }
}

fn ensure_consumed(source: &impl WordSource, kind: MsgKind) -> ProtocolResult<()> {
    match source.remaining() {
        0 => Ok(()),
        remaining => Err(ProtocolError::TrailingBytes { kind, remaining }),
    }
}
