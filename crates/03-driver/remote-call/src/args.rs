//! Signature-driven argument encoding and decoding.
//!
//! Encoder and decoder walk the same [`FunctionRecord`] with the same
//! [`ArgLayout`], so both ends agree on every offset by construction. Scalars
//! travel in host byte order; every node runs the same binary.

use smallvec::SmallVec;

use crate::error::{DispatchError, DispatchResult};
use crate::signature::{FunctionRecord, ParamSlot};

/// Width of a pointer argument word in bytes, independent of the host's
/// address width. Producer and dispatcher must agree on it exactly.
pub const POINTER_ARG_WIDTH: usize = 4;

/// Per-deployment layout parameters of an argument buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgLayout {
    pointer_width: usize,
}

impl Default for ArgLayout {
    fn default() -> Self {
        Self {
            pointer_width: POINTER_ARG_WIDTH,
        }
    }
}

impl ArgLayout {
    /// Pointer words are 4 or 8 bytes.
    pub fn new(pointer_width: usize) -> DispatchResult<Self> {
        match pointer_width {
            4 | 8 => Ok(Self { pointer_width }),
            other => Err(DispatchError::InvalidLayout(other)),
        }
    }

    pub fn pointer_width(self) -> usize {
        self.pointer_width
    }

    fn encode_pointer(self, addr: usize, out: &mut Vec<u8>) {
        match self.pointer_width {
            4 => out.extend_from_slice(&(addr as u32).to_ne_bytes()),
            _ => out.extend_from_slice(&(addr as u64).to_ne_bytes()),
        }
    }

    /// Zero-extends the pointer word to a host address.
    fn decode_pointer(self, raw: &[u8]) -> usize {
        match self.pointer_width {
            4 => u32::from_ne_bytes(fixed(raw)) as usize,
            _ => u64::from_ne_bytes(fixed(raw)) as usize,
        }
    }
}

fn fixed<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}

/// A by-value argument of 1, 2, 4 or 8 bytes, kept as its host-order bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scalar {
    raw: [u8; 8],
    size: u8,
}

impl std::fmt::Debug for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scalar{}({:02x?})", self.size * 8, self.as_bytes())
    }
}

macro_rules! scalar_conversions {
    ($($ty:ty => $as_fn:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::from_ne_bytes(&value.to_ne_bytes())
                }
            }

            impl Scalar {
                /// `None` unless the scalar has exactly this type's width.
                pub fn $as_fn(&self) -> Option<$ty> {
                    (usize::from(self.size) == std::mem::size_of::<$ty>())
                        .then(|| <$ty>::from_ne_bytes(fixed(&self.raw)))
                }
            }

            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    ArgValue::Scalar(Scalar::from(value))
                }
            }

            impl From<$ty> for ReturnValue {
                fn from(value: $ty) -> Self {
                    ReturnValue::Bytes(SmallVec::from_slice(&value.to_ne_bytes()))
                }
            }
        )*
    };
}

scalar_conversions! {
    u8 => as_u8,
    i8 => as_i8,
    u16 => as_u16,
    i16 => as_i16,
    u32 => as_u32,
    i32 => as_i32,
    u64 => as_u64,
    i64 => as_i64,
    f32 => as_f32,
    f64 => as_f64,
}

impl Scalar {
    /// `bytes` must be 1 to 8 bytes long.
    fn from_ne_bytes(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw[..bytes.len()].copy_from_slice(bytes);
        Self {
            raw,
            size: bytes.len() as u8,
        }
    }

    pub fn size(&self) -> usize {
        usize::from(self.size)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw[..self.size()]
    }
}

/// A decoded argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgValue {
    Scalar(Scalar),
    /// Zero-extended address. Dereferencing it may fault into the shared window.
    Pointer(usize),
}

impl ArgValue {
    pub fn scalar(&self) -> Option<&Scalar> {
        match self {
            ArgValue::Scalar(scalar) => Some(scalar),
            ArgValue::Pointer(_) => None,
        }
    }

    pub fn as_ptr(&self) -> Option<usize> {
        match self {
            ArgValue::Pointer(addr) => Some(*addr),
            ArgValue::Scalar(_) => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.scalar().and_then(Scalar::as_i32)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.scalar().and_then(Scalar::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.scalar().and_then(Scalar::as_f64)
    }
}

/// What a handler hands back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnValue {
    Void,
    /// Host-order bytes of the value.
    Bytes(SmallVec<[u8; 16]>),
}

impl ReturnValue {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ReturnValue::Void => &[],
            ReturnValue::Bytes(bytes) => bytes,
        }
    }
}

impl From<()> for ReturnValue {
    fn from(_: ()) -> Self {
        ReturnValue::Void
    }
}

/// Walks `record`'s parameters over `buf`, tracking a running offset.
pub fn decode_args(
    record: &FunctionRecord,
    buf: &[u8],
    layout: ArgLayout,
) -> DispatchResult<SmallVec<[ArgValue; 6]>> {
    record.validate()?;
    let needed = record.buffer_len(layout);
    if buf.len() < needed {
        return Err(DispatchError::ArgumentUnderrun {
            function: record.id,
            needed,
            available: buf.len(),
        });
    }

    let mut offset = 0;
    let mut args = SmallVec::with_capacity(record.params.len());
    for slot in &record.params {
        let width = slot.width(layout);
        let raw = &buf[offset..offset + width];
        args.push(match slot {
            ParamSlot::Scalar { .. } => ArgValue::Scalar(Scalar::from_ne_bytes(raw)),
            ParamSlot::Pointer => ArgValue::Pointer(layout.decode_pointer(raw)),
        });
        offset += width;
    }
    Ok(args)
}

/// Producer-side encoder driven by the same signature as [`decode_args`].
pub struct ArgPacker<'a> {
    record: &'a FunctionRecord,
    layout: ArgLayout,
    buf: Vec<u8>,
    next: usize,
}

impl<'a> ArgPacker<'a> {
    /// Fails on signatures [`decode_args`] would reject.
    pub fn new(record: &'a FunctionRecord, layout: ArgLayout) -> DispatchResult<Self> {
        record.validate()?;
        Ok(Self {
            record,
            layout,
            buf: Vec::with_capacity(record.buffer_len(layout)),
            next: 0,
        })
    }

    /// Appends the next argument, checking it against its slot.
    pub fn push(mut self, value: impl Into<ArgValue>) -> DispatchResult<Self> {
        let function = self.record.id;
        let index = self.next;
        let mismatch = move |reason| DispatchError::ArgumentMismatch {
            function,
            index,
            reason,
        };
        let slot = *self
            .record
            .params
            .get(index)
            .ok_or_else(|| mismatch("more arguments than parameters"))?;
        match (slot, value.into()) {
            (ParamSlot::Scalar { size }, ArgValue::Scalar(scalar)) => {
                if scalar.size() != usize::from(size) {
                    return Err(mismatch("scalar width differs from the slot"));
                }
                self.buf.extend_from_slice(scalar.as_bytes());
            }
            (ParamSlot::Pointer, ArgValue::Pointer(addr)) => {
                self.layout.encode_pointer(addr, &mut self.buf);
            }
            (ParamSlot::Scalar { .. }, ArgValue::Pointer(_)) => {
                return Err(mismatch("pointer passed for a scalar slot"));
            }
            (ParamSlot::Pointer, ArgValue::Scalar(_)) => {
                return Err(mismatch("scalar passed for a pointer slot"));
            }
        }
        self.next += 1;
        Ok(self)
    }

    /// Appends a pointer argument.
    pub fn pointer(self, addr: usize) -> DispatchResult<Self> {
        self.push(ArgValue::Pointer(addr))
    }

    /// The finished buffer. Every parameter must have been supplied.
    pub fn finish(self) -> DispatchResult<Vec<u8>> {
        if self.next != self.record.params.len() {
            return Err(DispatchError::ArgumentMismatch {
                function: self.record.id,
                index: self.next,
                reason: "fewer arguments than parameters",
            });
        }
        Ok(self.buf)
    }
}
