//! Heartbeat liveness protocol
//!
//! The coordinator probes each monitored peer on a fixed interval and counts
//! probes against responses; a peer is healthy while the counters track each
//! other (one in-flight probe is tolerated) and its last response is recent.
//! Peripherals answer probes addressed to them with a monotone response
//! counter.

use heapless::{LinearMap, Vec};

use crate::core::{ContentType, InvalidValue, NodeId};
use crate::frame::{Data, Frame};
use crate::port::FramePort;
use crate::registry;
use crate::time::{Duration, Instant};

/// A probe unanswered for this long marks the peer bad.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Monitored peer slots on the coordinator.
pub const MAX_PEERS: usize = 5;

/// Probe payload: byte 0 names the node expected to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeartbeatRequest {
    pub node: NodeId,
}

impl HeartbeatRequest {
    pub fn encode(&self) -> Data {
        let mut data = Data::new_zeros(8);
        data[0] = self.node.into_u8();
        data
    }
}

impl TryFrom<&Data> for HeartbeatRequest {
    type Error = InvalidValue;

    fn try_from(data: &Data) -> Result<Self, InvalidValue> {
        let code = *data.first().ok_or(InvalidValue)?;
        Ok(Self {
            node: NodeId::try_from(code)?,
        })
    }
}

/// Response payload: the answering node's counter as u64 LE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeartbeatResponse {
    pub counter: u64,
}

impl HeartbeatResponse {
    pub fn encode(&self) -> Data {
        Data::from_u64(self.counter)
    }
}

impl TryFrom<&Data> for HeartbeatResponse {
    type Error = InvalidValue;

    fn try_from(data: &Data) -> Result<Self, InvalidValue> {
        if data.len() < 8 {
            return Err(InvalidValue);
        }
        Ok(Self {
            counter: data.as_u64(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PeerStatus {
    expected: u64,
    actual: u64,
    last_request: Instant,
    last_response: Instant,
}

/// Probe/response state machine for one node
pub struct HeartbeatManager {
    me: NodeId,
    interval: Duration,
    last_dispatch: Instant,
    peers: Vec<NodeId, MAX_PEERS>,
    statuses: LinearMap<NodeId, PeerStatus, MAX_PEERS>,
    response_counter: u64,
}

impl HeartbeatManager {
    pub fn new(me: NodeId) -> Self {
        Self {
            me,
            interval: Duration::from_millis(0),
            last_dispatch: Instant::from_millis(0),
            peers: Vec::new(),
            statuses: LinearMap::new(),
            response_counter: 0,
        }
    }

    /// Starts probing `peers` every `interval`. Coordinator only.
    ///
    /// Sends the first round of probes immediately.
    pub fn initialize(
        &mut self,
        port: &mut dyn FramePort,
        now: Instant,
        interval: Duration,
        peers: &[NodeId],
    ) {
        if self.me != NodeId::Coordinator {
            error!("cannot monitor heartbeats, not the coordinator");
            return;
        }

        self.interval = interval;
        self.last_dispatch = now;
        self.peers.clear();
        for &peer in peers {
            if self.peers.push(peer).is_err() {
                error!("heartbeat peer table full, dropping {:?}", peer);
                continue;
            }
            self.send_request(port, now, peer);
        }
    }

    /// Advances probing and judges liveness.
    ///
    /// Returns true iff every monitored peer is healthy. Always true on
    /// non-coordinator nodes.
    pub fn tick(&mut self, port: &mut dyn FramePort, now: Instant) -> bool {
        if self.me != NodeId::Coordinator {
            return true;
        }

        if now.duration_since(self.last_dispatch) >= self.interval && !self.peers.is_empty() {
            let peers = self.peers.clone();
            for peer in peers {
                self.send_request(port, now, peer);
            }
            self.last_dispatch = now;
        }

        let mut all_healthy = true;
        let mut silent: Vec<NodeId, MAX_PEERS> = Vec::new();

        for (&peer, status) in &self.statuses {
            if now.duration_since(status.last_response) > RESPONSE_TIMEOUT {
                error!("no heartbeat response from {:?}, re-probing", peer);
                // raw re-probe: the peer already owes us a response, so
                // `expected` is not advanced
                let _ = silent.push(peer);
                all_healthy = false;
                continue;
            }

            if status.expected == status.actual || status.expected == status.actual + 1 {
                continue;
            }

            error!(
                "heartbeat mismatch on {:?}: expected {}, got {}",
                peer, status.expected, status.actual
            );
            all_healthy = false;
        }

        for peer in silent {
            self.send_probe_frame(port, peer);
        }

        all_healthy
    }

    /// Probe/response counters for `peer` as `(expected, actual)`.
    pub fn counters(&self, peer: NodeId) -> Option<(u64, u64)> {
        self.statuses
            .get(&peer)
            .map(|status| (status.expected, status.actual))
    }

    /// Records a response from `peer`.
    pub fn on_response(&mut self, peer: NodeId, now: Instant) {
        if !self.statuses.contains_key(&peer)
            && self.statuses.insert(peer, PeerStatus::default()).is_err()
        {
            error!("heartbeat status table full, dropping {:?}", peer);
            return;
        }
        let status = unwrap!(self.statuses.get_mut(&peer));
        status.actual += 1;
        status.last_response = now;
    }

    /// Answers a probe with the next counter value. Peripherals and palm only.
    pub fn send_response(&mut self, port: &mut dyn FramePort) {
        if self.me == NodeId::Coordinator {
            error!("cannot send a heartbeat response, am the coordinator");
            return;
        }

        let Some(id) = registry::encode(self.me, ContentType::Heartbeat) else {
            error!("cannot send a heartbeat response, no id registered");
            return;
        };

        self.response_counter += 1;
        let payload = HeartbeatResponse {
            counter: self.response_counter,
        };
        port.send(&Frame::new(id, payload.encode()));
    }

    fn send_request(&mut self, port: &mut dyn FramePort, now: Instant, peer: NodeId) {
        if self.me != NodeId::Coordinator {
            error!("cannot send a heartbeat request, not the coordinator");
            return;
        }

        if !self.send_probe_frame(port, peer) {
            return;
        }

        if !self.statuses.contains_key(&peer) {
            let fresh = PeerStatus {
                // grace: a peer first probed at `now` is not yet silent
                last_response: now,
                ..PeerStatus::default()
            };
            if self.statuses.insert(peer, fresh).is_err() {
                error!("heartbeat status table full, dropping {:?}", peer);
                return;
            }
        }
        let status = unwrap!(self.statuses.get_mut(&peer));
        status.expected += 1;
        status.last_request = now;
    }

    fn send_probe_frame(&mut self, port: &mut dyn FramePort, peer: NodeId) -> bool {
        let Some(id) = registry::encode(self.me, ContentType::Heartbeat) else {
            error!("cannot send a heartbeat request, no id registered");
            return false;
        };

        let payload = HeartbeatRequest { node: peer };
        port.send(&Frame::new(id, payload.encode()));
        true
    }
}
