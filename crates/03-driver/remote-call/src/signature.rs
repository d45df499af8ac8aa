use smallvec::SmallVec;

use crate::args::ArgLayout;
use crate::error::{DispatchError, DispatchResult};

/// Dense identifier assigned to each remotely callable function at build time.
pub type FunctionId = u32;
/// Identifier of one call's argument buffer and result.
pub type JobId = u32;

/// One parameter of a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamSlot {
    /// Loaded by value; `size` is 1, 2, 4 or 8 bytes.
    Scalar { size: u8 },
    /// An address word of [`ArgLayout::pointer_width`] bytes. The pointee is
    /// not inlined; it resolves through the shared window when dereferenced.
    Pointer,
}

impl ParamSlot {
    pub const I8: ParamSlot = ParamSlot::Scalar { size: 1 };
    pub const I16: ParamSlot = ParamSlot::Scalar { size: 2 };
    pub const I32: ParamSlot = ParamSlot::Scalar { size: 4 };
    pub const I64: ParamSlot = ParamSlot::Scalar { size: 8 };
    pub const F32: ParamSlot = ParamSlot::Scalar { size: 4 };
    pub const F64: ParamSlot = ParamSlot::Scalar { size: 8 };

    /// Bytes the slot occupies in an argument buffer.
    pub fn width(self, layout: ArgLayout) -> usize {
        match self {
            ParamSlot::Scalar { size } => usize::from(size),
            ParamSlot::Pointer => layout.pointer_width(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnDesc {
    Void,
    Value { size: u8 },
}

impl ReturnDesc {
    pub fn size(self) -> usize {
        match self {
            ReturnDesc::Void => 0,
            ReturnDesc::Value { size } => usize::from(size),
        }
    }
}

/// Signature of one remotely callable function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionRecord {
    pub id: FunctionId,
    pub params: SmallVec<[ParamSlot; 6]>,
    pub ret: ReturnDesc,
}

impl FunctionRecord {
    pub fn new(id: FunctionId, params: impl IntoIterator<Item = ParamSlot>, ret: ReturnDesc) -> Self {
        Self {
            id,
            params: params.into_iter().collect(),
            ret,
        }
    }

    /// Rejects scalar widths the decoder cannot load.
    pub fn validate(&self) -> DispatchResult<()> {
        for (index, slot) in self.params.iter().enumerate() {
            if let ParamSlot::Scalar { size } = slot {
                if !matches!(*size, 1 | 2 | 4 | 8) {
                    return Err(DispatchError::InvalidSignature {
                        id: self.id,
                        reason: format!("parameter {index} has unsupported width {size}"),
                    });
                }
            }
        }
        if let ReturnDesc::Value { size: 0 } = self.ret {
            return Err(DispatchError::InvalidSignature {
                id: self.id,
                reason: "non-void return of zero bytes".to_owned(),
            });
        }
        Ok(())
    }

    /// Bytes an argument buffer for this signature occupies. No padding between slots.
    pub fn buffer_len(&self, layout: ArgLayout) -> usize {
        self.params.iter().map(|slot| slot.width(layout)).sum()
    }
}
