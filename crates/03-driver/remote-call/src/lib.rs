//! Remote call dispatch: function IDs to local entry points.
//!
//! A [`DispatchTable`] is built once at startup from the externally supplied
//! [`FunctionRecord`]s. The [`Dispatcher`] takes `(function, job)` pairs, pulls
//! the job's argument buffer from a [`JobChannel`], decodes it slot by slot
//! with [`ArgLayout`], invokes the handler and hands the result back.

#![allow(missing_docs)]

mod args;
mod dispatcher;
mod error;
mod jobs;
mod signature;
mod table;

pub use args::{decode_args, ArgLayout, ArgPacker, ArgValue, ReturnValue, Scalar, POINTER_ARG_WIDTH};
pub use dispatcher::{Dispatcher, Invocation};
pub use error::{DispatchError, DispatchResult};
pub use jobs::{JobChannel, JobQueue};
pub use signature::{FunctionId, FunctionRecord, JobId, ParamSlot, ReturnDesc};
pub use table::{DispatchTable, DispatchTableBuilder, RemoteFn, MAX_FUNCTION_ID};
