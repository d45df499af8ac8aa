use std::sync::Arc;

use tracing::debug;

use crate::args::{ArgValue, ReturnValue};
use crate::error::{DispatchError, DispatchResult};
use crate::signature::{FunctionId, FunctionRecord};

/// Largest function id a table accepts. IDs index a dense vector.
pub const MAX_FUNCTION_ID: FunctionId = u16::MAX as FunctionId;

/// A locally invocable entry point.
pub trait RemoteFn: Send + Sync {
    fn invoke(&self, args: &[ArgValue]) -> ReturnValue;
}

impl<F> RemoteFn for F
where
    F: Fn(&[ArgValue]) -> ReturnValue + Send + Sync,
{
    fn invoke(&self, args: &[ArgValue]) -> ReturnValue {
        self(args)
    }
}

struct Entry {
    record: FunctionRecord,
    handler: Arc<dyn RemoteFn>,
}

/// Function id to handler, O(1) by index. Built once, read-only afterwards.
pub struct DispatchTable {
    entries: Vec<Option<Entry>>,
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::new()
    }

    pub fn get(&self, id: FunctionId) -> Option<(&FunctionRecord, &dyn RemoteFn)> {
        let entry = self.entries.get(id as usize)?.as_ref()?;
        Some((&entry.record, entry.handler.as_ref()))
    }

    pub fn record(&self, id: FunctionId) -> Option<&FunctionRecord> {
        self.get(id).map(|(record, _)| record)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects `(record, handler)` pairs for a [`DispatchTable`].
#[derive(Default)]
pub struct DispatchTableBuilder {
    entries: Vec<Option<Entry>>,
}

impl DispatchTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `record.id` after validating the signature.
    pub fn register(
        mut self,
        record: FunctionRecord,
        handler: impl RemoteFn + 'static,
    ) -> DispatchResult<Self> {
        record.validate()?;
        let id = record.id;
        if id > MAX_FUNCTION_ID {
            return Err(DispatchError::FunctionIdTooLarge(id));
        }
        let index = id as usize;
        if self.entries.len() <= index {
            self.entries.resize_with(index + 1, || None);
        }
        if self.entries[index].is_some() {
            return Err(DispatchError::DuplicateFunction(id));
        }
        debug!(id, params = record.params.len(), "registered remote function");
        self.entries[index] = Some(Entry {
            record,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{ParamSlot, ReturnDesc};

    fn noop(_: &[ArgValue]) -> ReturnValue {
        ReturnValue::Void
    }

    #[test]
    fn sparse_ids_resolve_by_index() {
        let table = DispatchTable::builder()
            .register(FunctionRecord::new(0, [], ReturnDesc::Void), noop)
            .and_then(|b| b.register(FunctionRecord::new(5, [ParamSlot::I32], ReturnDesc::Void), noop))
            .unwrap()
            .build();
        assert_eq!(table.len(), 2);
        assert!(table.get(0).is_some());
        assert!(table.get(3).is_none());
        assert_eq!(table.record(5).unwrap().params.len(), 1);
        assert!(table.get(99).is_none());
    }

    #[test]
    fn duplicate_and_oversized_ids_are_rejected() {
        let builder = DispatchTable::builder()
            .register(FunctionRecord::new(1, [], ReturnDesc::Void), noop)
            .unwrap();
        assert!(matches!(
            builder.register(FunctionRecord::new(1, [], ReturnDesc::Void), noop),
            Err(DispatchError::DuplicateFunction(1))
        ));
        assert!(matches!(
            DispatchTable::builder().register(
                FunctionRecord::new(MAX_FUNCTION_ID + 1, [], ReturnDesc::Void),
                noop
            ),
            Err(DispatchError::FunctionIdTooLarge(_))
        ));
    }
}
