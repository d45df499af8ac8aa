//! Every request kind completes against its own ack and fails against any other.
#![cfg(unix)]

use std::os::unix::net::UnixStream;
use std::thread;
use std::time::Duration;

use transport::{MsgKind, QueueSocket, TransportConfig};
use uva_protocol::{Ack, Channel, ProtocolError, Request};

fn request_of(kind: MsgKind) -> Request {
    match kind {
        MsgKind::HeapAllocReq => Request::HeapAlloc { size: 16 },
        MsgKind::LoadReq => Request::Load { addr: 0x1500_0000, len: 4 },
        MsgKind::StoreReq => Request::Store {
            addr: 0x1500_0000,
            bytes: vec![9; 4],
        },
        MsgKind::MmapReq => Request::Mmap { addr: 0x1500_1000, len: 64 },
        MsgKind::MemsetReq => Request::Memset {
            addr: 0x1500_0000,
            value: 0,
            len: 4,
        },
        MsgKind::MemcpyReq => Request::Memcpy {
            dest: 0x1500_0010,
            src: 0x1500_0000,
            len: 4,
        },
        MsgKind::MemmoveReq => Request::Memmove {
            dest: 0x1500_0002,
            src: 0x1500_0000,
            len: 4,
        },
        MsgKind::GlobalSegfaultReq => Request::GlobalSegfault {
            begin: 0x1500_0000,
            end: 0x1500_0008,
        },
        MsgKind::GlobalInitCompleteSig => Request::GlobalInitComplete,
        ack => panic!("{ack:?} is not a request"),
    }
}

/// Pushes the operands a correct ack of `kind` would carry for `request`.
fn push_ack_body(peer: &mut QueueSocket<UnixStream>, request: &Request) {
    match request {
        Request::HeapAlloc { .. } | Request::Mmap { .. } => peer.push_word(0x1500_1000),
        Request::Load { len, .. } => peer.push_range(&vec![0; *len]),
        Request::GlobalSegfault { begin, end } => peer.push_range(&vec![0; end - begin]),
        _ => {}
    }
}

fn run_scripted(request: Request, answer: MsgKind) -> Result<Ack, ProtocolError> {
    let config = TransportConfig::default().with_io_timeout(Some(Duration::from_secs(5)));
    let (client, mut peer) = QueueSocket::pair(config).unwrap();
    let channel = Channel::new(client);

    let expected = request.clone();
    let fake_peer = thread::spawn(move || {
        peer.receive_queue().unwrap();
        let seen = Request::decode(&mut peer).unwrap();
        assert_eq!(seen, expected);
        peer.push_word(answer.code());
        if answer == seen.ack_kind() {
            push_ack_body(&mut peer, &seen);
        }
        peer.send_queue().unwrap();
    });

    let result = channel.exchange(&request);
    fake_peer.join().unwrap();
    result
}

#[test]
fn matching_ack_completes_every_request() {
    for kind in MsgKind::REQUESTS {
        let request = request_of(kind);
        let ack = run_scripted(request.clone(), request.ack_kind())
            .unwrap_or_else(|err| panic!("{kind:?} failed: {err}"));
        assert_eq!(ack.kind(), request.ack_kind());
    }
}

#[test]
fn any_other_ack_is_a_protocol_violation() {
    let all_acks: Vec<MsgKind> = MsgKind::REQUESTS
        .iter()
        .filter_map(|kind| kind.ack())
        .collect();

    for kind in MsgKind::REQUESTS {
        let request = request_of(kind);
        for &wrong in all_acks.iter().filter(|ack| **ack != request.ack_kind()) {
            let err = run_scripted(request.clone(), wrong).unwrap_err();
            assert!(err.is_violation(), "{kind:?} answered by {wrong:?}: {err}");
            assert!(matches!(err, ProtocolError::WrongAck { expected, .. } if expected == request.ack_kind()));
        }
    }
}
