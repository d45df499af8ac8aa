//! Startup gate and init-complete barrier.
//!
//! Each is a one-shot flag layered on a [`Channel`]: once passed it stays
//! passed, and a second call returns without touching the wire.

use parking_lot::Mutex;
use tracing::info;
use transport::{Endpoint, START_PERMITTED};
use uva_protocol::{Ack, Channel, Request};

use crate::config::NodeRole;
use crate::error::{UvaError, UvaResult};

/// Result of a gate or barrier call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// This call passed it.
    Passed,
    /// An earlier call already did; nothing was sent or received.
    AlreadyPassed,
}

/// Blocks participants until the window server grants entry.
#[derive(Debug, Default)]
pub struct StartupGate {
    passed: Mutex<bool>,
}

impl StartupGate {
    /// A gate nobody has passed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the gate has been passed.
    pub fn is_passed(&self) -> bool {
        *self.passed.lock()
    }

    /// The authority passes at once. A participant blocks for one token word;
    /// anything but [`START_PERMITTED`] is [`UvaError::PermissionDenied`].
    pub fn pass<S: Endpoint>(&self, role: NodeRole, channel: &Channel<S>) -> UvaResult<GateOutcome> {
        let mut passed = self.passed.lock();
        if *passed {
            return Ok(GateOutcome::AlreadyPassed);
        }
        if role == NodeRole::Participant {
            let token = channel.receive_word()?;
            if token != START_PERMITTED {
                return Err(UvaError::PermissionDenied { token });
            }
            info!("startup permission granted");
        }
        *passed = true;
        Ok(GateOutcome::Passed)
    }
}

/// Orders global initialization: no node reads another's globals before the
/// initializer has finished constructing them.
#[derive(Debug, Default)]
pub struct InitBarrier {
    passed: Mutex<bool>,
}

impl InitBarrier {
    /// A barrier nobody has passed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the barrier has been passed.
    pub fn is_passed(&self) -> bool {
        *self.passed.lock()
    }

    /// Sends the init-complete signal and blocks for its ack.
    pub fn complete<S: Endpoint>(&self, channel: &Channel<S>) -> UvaResult<GateOutcome> {
        let mut passed = self.passed.lock();
        if *passed {
            return Ok(GateOutcome::AlreadyPassed);
        }
        match channel.exchange(&Request::GlobalInitComplete)? {
            Ack::GlobalInitComplete => {}
            other => unreachable!("decode_for pairs the ack with its request, got {other:?}"),
        }
        *passed = true;
        info!("global init complete");
        Ok(GateOutcome::Passed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::thread;
    use std::time::Duration;

    use transport::{QueueSocket, TransportConfig, START_DENIED};

    use super::*;

    fn channel_pair() -> (
        Channel<std::os::unix::net::UnixStream>,
        QueueSocket<std::os::unix::net::UnixStream>,
    ) {
        let config = TransportConfig::default().with_io_timeout(Some(Duration::from_secs(2)));
        let (client, peer) = QueueSocket::pair(config).unwrap();
        (Channel::new(client), peer)
    }

    #[test]
    fn authority_passes_without_traffic() {
        let (channel, _peer) = channel_pair();
        let gate = StartupGate::new();
        assert_eq!(gate.pass(NodeRole::Authority, &channel).unwrap(), GateOutcome::Passed);
        assert!(gate.is_passed());
    }

    #[test]
    fn denied_token_is_fatal() {
        let (channel, mut peer) = channel_pair();
        peer.push_word(START_DENIED);
        peer.send_queue().unwrap();
        let gate = StartupGate::new();
        assert!(matches!(
            gate.pass(NodeRole::Participant, &channel),
            Err(UvaError::PermissionDenied { token: 0 })
        ));
        assert!(!gate.is_passed());
    }

    #[test]
    fn barrier_passes_once() {
        let (channel, mut peer) = channel_pair();
        let fake = thread::spawn(move || {
            peer.receive_queue().unwrap();
            assert_eq!(Request::decode(&mut peer).unwrap(), Request::GlobalInitComplete);
            Ack::GlobalInitComplete.encode(&mut peer);
            peer.send_queue().unwrap();
        });
        let barrier = InitBarrier::new();
        assert_eq!(barrier.complete(&channel).unwrap(), GateOutcome::Passed);
        fake.join().unwrap();
        // The peer is gone; a second call must not reach the wire.
        assert_eq!(barrier.complete(&channel).unwrap(), GateOutcome::AlreadyPassed);
    }
}
