//! Matches broker acknowledgments to waiting publishers
//!
//! A publish is registered before it is handed to the client. The event loop
//! reports outgoing PUBLISH packets in request order, which is when a packet
//! id gets attached to the oldest registered entry. The matching PUBACK,
//! PUBCOMP or failing PUBREC resolves it.
//!
//! A waiter that gives up is abandoned: dropped from the in-flight map, or
//! left as a placeholder while its PUBLISH is still queued in the client so
//! later packet ids keep lining up with their own waiters.

use super::connection::{MqttError, PublishResultCode};
use crate::config::DeliveryQos;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub type AckResult = Result<PublishResultCode, MqttError>;

struct PendingPublish {
    id: u64,
    topic: String,
    qos: DeliveryQos,
    responder: oneshot::Sender<AckResult>,
    abandoned: bool,
}

impl PendingPublish {
    fn is_abandoned(&self) -> bool {
        self.abandoned || self.responder.is_closed()
    }

    fn resolve(self, result: AckResult) {
        // The waiter may have timed out already
        if self.responder.send(result).is_err() {
            debug!(topic = %self.topic, "Acknowledgment arrived after waiter left");
        }
    }
}

#[derive(Default)]
pub struct AckTracker {
    next_id: u64,
    awaiting_dispatch: VecDeque<PendingPublish>,
    in_flight: HashMap<u16, PendingPublish>,
}

impl AckTracker {
    /// Register a publish about to be queued
    pub fn register(
        &mut self,
        topic: &str,
        qos: DeliveryQos,
    ) -> (u64, oneshot::Receiver<AckResult>) {
        let (responder, receiver) = oneshot::channel();
        let id = self.next_id;
        self.next_id += 1;

        self.awaiting_dispatch.push_back(PendingPublish {
            id,
            topic: topic.to_string(),
            qos,
            responder,
            abandoned: false,
        });
        (id, receiver)
    }

    /// Drop a registration whose publish never reached the client queue
    pub fn cancel(&mut self, id: u64) -> bool {
        match self.awaiting_dispatch.iter().position(|p| p.id == id) {
            Some(index) => self.awaiting_dispatch.remove(index).is_some(),
            None => false,
        }
    }

    /// Give up on a publish already handed to the client. Its PUBLISH may
    /// still go out; whatever the broker answers is ignored.
    pub fn abandon(&mut self, id: u64) {
        if let Some(pending) = self.awaiting_dispatch.iter_mut().find(|p| p.id == id) {
            pending.abandoned = true;
            return;
        }
        self.in_flight.retain(|_, pending| pending.id != id);
    }

    pub fn on_publish_sent(&mut self, pkid: u16) {
        let Some(pending) = self.awaiting_dispatch.pop_front() else {
            debug!(pkid, "Outgoing publish without a registered waiter");
            return;
        };

        if pending.is_abandoned() {
            debug!(pkid, topic = %pending.topic, "Abandoned publish went out");
            return;
        }

        if pending.qos == DeliveryQos::AtMostOnce {
            pending.resolve(Ok(PublishResultCode::Success));
            return;
        }

        if let Some(stale) = self.in_flight.insert(pkid, pending) {
            warn!(pkid, topic = %stale.topic, "Packet id reused before acknowledgment");
            stale.resolve(Err(MqttError::ConnectionLost(format!(
                "packet id {pkid} reused before acknowledgment"
            ))));
        }
    }

    pub fn on_acknowledged(&mut self, pkid: u16, code: PublishResultCode) {
        match self.in_flight.remove(&pkid) {
            Some(pending) => pending.resolve(Ok(code)),
            None => debug!(pkid, "Acknowledgment for unknown packet id"),
        }
    }

    /// PUBREC: a success keeps the QoS 2 exchange going, a failure ends it
    pub fn on_received(&mut self, pkid: u16, code: PublishResultCode) {
        if code.is_success() {
            return;
        }
        self.on_acknowledged(pkid, code);
    }

    /// A refusal without a packet id can only be attributed when exactly one
    /// publish is in flight
    pub fn on_refused(&mut self, code: PublishResultCode) {
        self.in_flight.retain(|_, pending| !pending.is_abandoned());
        if self.in_flight.len() != 1 {
            warn!(
                in_flight = self.in_flight.len(),
                "Cannot attribute refusal {} to a publish", code
            );
            return;
        }
        if let Some(pkid) = self.in_flight.keys().next().copied() {
            self.on_acknowledged(pkid, code);
        }
    }

    /// Resolve every waiter with `ConnectionLost`
    pub fn fail_all(&mut self, reason: &str) {
        let failed = self.pending();
        for pending in self
            .awaiting_dispatch
            .drain(..)
            .chain(self.in_flight.drain().map(|(_, p)| p))
        {
            pending.resolve(Err(MqttError::ConnectionLost(reason.to_string())));
        }
        if failed > 0 {
            warn!(failed, "Failed pending publishes: {}", reason);
        }
    }

    pub fn pending(&self) -> usize {
        self.awaiting_dispatch.len() + self.in_flight.len()
    }
}
