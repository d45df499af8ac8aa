use crossbeam_channel::Receiver;
use tracing::{debug, error, info};

use crate::args::{decode_args, ArgLayout, ReturnValue};
use crate::error::{DispatchError, DispatchResult};
use crate::jobs::JobChannel;
use crate::signature::{FunctionId, JobId, ReturnDesc};
use crate::table::DispatchTable;

/// One request to run `function` on the arguments submitted as `job`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub function: FunctionId,
    pub job: JobId,
}

pub struct Dispatcher<J> {
    table: DispatchTable,
    jobs: J,
    layout: ArgLayout,
}

impl<J: JobChannel> Dispatcher<J> {
    pub fn new(table: DispatchTable, jobs: J) -> Self {
        Self {
            table,
            jobs,
            layout: ArgLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: ArgLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn jobs(&self) -> &J {
        &self.jobs
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Decodes `job`'s arguments for `function`, invokes it and reports the result.
    pub fn dispatch(&self, function: FunctionId, job: JobId) -> DispatchResult<()> {
        let (record, handler) = self
            .table
            .get(function)
            .ok_or(DispatchError::UnknownFunction(function))?;
        let buffer = self.jobs.consume(job)?;
        let args = decode_args(record, &buffer, self.layout)?;
        debug!(function, job, argc = args.len(), "dispatching");

        let value = handler.invoke(&args);
        match (record.ret, &value) {
            (ReturnDesc::Void, ReturnValue::Void) => self.jobs.produce(job, &[]),
            (ReturnDesc::Value { size }, ReturnValue::Bytes(bytes))
                if bytes.len() == usize::from(size) =>
            {
                self.jobs.produce(job, bytes)
            }
            (ret, value) => Err(DispatchError::ReturnMismatch {
                function,
                expected: ret.size(),
                got: value.as_bytes().len(),
            }),
        }
    }

    /// Serves invocations until every sender is dropped. Returns how many were dispatched.
    ///
    /// The first failure stops the loop; there is no way to tell the caller of
    /// a half-dispatched job that it will never complete.
    pub fn serve(&self, invocations: &Receiver<Invocation>) -> DispatchResult<usize> {
        let mut served = 0;
        for Invocation { function, job } in invocations.iter() {
            if let Err(err) = self.dispatch(function, job) {
                error!(function, job, %err, "dispatch failed");
                return Err(err);
            }
            served += 1;
        }
        info!(served, "invocation channel closed");
        Ok(served)
    }
}
