//! Dispatched functions whose pointer arguments name window addresses.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use remote_call::{
    ArgLayout, ArgPacker, ArgValue, DispatchTable, Dispatcher, FunctionId, FunctionRecord,
    Invocation, JobQueue, ParamSlot, ReturnDesc, ReturnValue,
};
use uva_runtime::{NodeRole, UvaCoordinator};

use crate::support::{connect_node, server_config, start, Backing};

const STORE_I32: FunctionId = 3;
const LOAD_I32: FunctionId = 4;

fn table(node: Arc<UvaCoordinator>) -> DispatchTable {
    let loader = Arc::clone(&node);
    DispatchTable::builder()
        .register(
            FunctionRecord::new(STORE_I32, [ParamSlot::Pointer, ParamSlot::I32], ReturnDesc::Void),
            move |args: &[ArgValue]| {
                let addr = args[0].as_ptr().unwrap();
                let value = args[1].as_i32().unwrap();
                node.store(addr, &value.to_ne_bytes()).unwrap();
                ReturnValue::Void
            },
        )
        .and_then(|b| {
            b.register(
                FunctionRecord::new(LOAD_I32, [ParamSlot::Pointer], ReturnDesc::Value { size: 4 }),
                move |args: &[ArgValue]| {
                    let bytes = loader.load(args[0].as_ptr().unwrap(), 4).unwrap();
                    ReturnValue::from(i32::from_ne_bytes(bytes.try_into().unwrap()))
                },
            )
        })
        .unwrap()
        .build()
}

#[test]
fn dispatched_calls_share_the_window() {
    let backing = Backing::new(1);
    let window = backing.window;
    let server = start(server_config(window).with_initializers(0).with_gate(false));
    // SAFETY: nothing here faults; handlers only use remote operations.
    let node = Arc::new(unsafe { connect_node(&server, window, NodeRole::Participant) });
    node.startup_gate(NodeRole::Participant).unwrap();

    // Heap addresses do not fit the default 32-bit pointer slot on 64-bit hosts.
    let layout = ArgLayout::new(std::mem::size_of::<usize>()).unwrap();
    let jobs = Arc::new(JobQueue::new());
    let dispatcher = Dispatcher::new(table(Arc::clone(&node)), Arc::clone(&jobs)).with_layout(layout);
    let (tx, rx) = unbounded();
    let serving = thread::spawn(move || dispatcher.serve(&rx));

    let slot = window.begin() + 0x20;
    let store = FunctionRecord::new(STORE_I32, [ParamSlot::Pointer, ParamSlot::I32], ReturnDesc::Void);
    let args = ArgPacker::new(&store, layout)
        .and_then(|p| p.pointer(slot))
        .and_then(|p| p.push(-1234i32))
        .and_then(ArgPacker::finish)
        .unwrap();
    jobs.submit(1, args);
    tx.send(Invocation { function: STORE_I32, job: 1 }).unwrap();
    assert!(jobs.wait_result(1).is_empty());
    assert_eq!(server.snapshot(slot, 4).unwrap(), (-1234i32).to_ne_bytes());

    let load = FunctionRecord::new(LOAD_I32, [ParamSlot::Pointer], ReturnDesc::Value { size: 4 });
    let args = ArgPacker::new(&load, layout)
        .and_then(|p| p.pointer(slot))
        .and_then(ArgPacker::finish)
        .unwrap();
    jobs.submit(2, args);
    tx.send(Invocation { function: LOAD_I32, job: 2 }).unwrap();
    assert_eq!(jobs.wait_result(2), (-1234i32).to_ne_bytes());

    drop(tx);
    assert_eq!(serving.join().unwrap().unwrap(), 2);
    assert_eq!(jobs.pending(), 0);
    server.shutdown();
}
