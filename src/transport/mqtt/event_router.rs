//! Pure routing of `rumqttc` events for both protocol versions
//!
//! Each poll result is reduced to a [`LinkEvent`], the only thing the
//! session loop and the acknowledgment tracker need to see.

use super::connection::PublishResultCode;
use rumqttc::Outgoing;

/// What one event loop poll means for the publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// CONNACK accepted
    Connected,
    /// A PUBLISH left the client with this packet id (0 for QoS 0)
    PublishSent { pkid: u16 },
    /// Final acknowledgment: PUBACK for QoS 1, PUBCOMP for QoS 2
    PublishAcknowledged { pkid: u16, code: PublishResultCode },
    /// PUBREC for QoS 2; only a failing code ends the exchange here
    PublishReceived { pkid: u16, code: PublishResultCode },
    /// A failing v5 acknowledgment. `rumqttc` reports these as poll errors
    /// without the packet id and reopens the connection on the next poll.
    PublishRefused { code: PublishResultCode },
    /// Our DISCONNECT was written
    DisconnectSent,
    /// The broker sent DISCONNECT
    BrokerDisconnected,
    /// Pings, subscriptions and anything else
    Other,
}

pub struct EventRouter;

impl EventRouter {
    /// Route an MQTT v5 event
    pub fn route_v5(event: &rumqttc::v5::Event) -> LinkEvent {
        use rumqttc::v5::mqttbytes::v5::{
            ConnectReturnCode, Packet, PubAckReason, PubCompReason, PubRecReason,
        };
        use rumqttc::v5::Event;

        match event {
            Event::Incoming(packet) => match packet {
                Packet::ConnAck(connack) => match connack.code {
                    ConnectReturnCode::Success => LinkEvent::Connected,
                    // rumqttc turns refusals into poll errors before this point
                    _ => LinkEvent::Other,
                },
                Packet::PubAck(ack) => LinkEvent::PublishAcknowledged {
                    pkid: ack.pkid,
                    code: match &ack.reason {
                        PubAckReason::Success => PublishResultCode::Success,
                        PubAckReason::NoMatchingSubscribers => {
                            PublishResultCode::NoMatchingSubscribers
                        }
                        other => PublishResultCode::Rejected(format!("{other:?}")),
                    },
                },
                Packet::PubRec(rec) => LinkEvent::PublishReceived {
                    pkid: rec.pkid,
                    code: match &rec.reason {
                        PubRecReason::Success => PublishResultCode::Success,
                        PubRecReason::NoMatchingSubscribers => {
                            PublishResultCode::NoMatchingSubscribers
                        }
                        other => PublishResultCode::Rejected(format!("{other:?}")),
                    },
                },
                Packet::PubComp(comp) => LinkEvent::PublishAcknowledged {
                    pkid: comp.pkid,
                    code: match &comp.reason {
                        PubCompReason::Success => PublishResultCode::Success,
                        other => PublishResultCode::Rejected(format!("{other:?}")),
                    },
                },
                Packet::Disconnect(_) => LinkEvent::BrokerDisconnected,
                _ => LinkEvent::Other,
            },
            Event::Outgoing(outgoing) => Self::route_outgoing(outgoing),
        }
    }

    /// Recognize the poll errors that are broker refusals of a publish
    /// rather than link failures
    pub fn route_v5_error(error: &rumqttc::v5::ConnectionError) -> Option<LinkEvent> {
        use rumqttc::v5::{ConnectionError, StateError};

        let reason = match error {
            ConnectionError::MqttState(StateError::PubAckFail { reason }) => format!("{reason:?}"),
            ConnectionError::MqttState(StateError::PubRecFail { reason }) => format!("{reason:?}"),
            ConnectionError::MqttState(StateError::PubCompFail { reason }) => format!("{reason:?}"),
            _ => return None,
        };
        Some(LinkEvent::PublishRefused {
            code: PublishResultCode::Rejected(reason),
        })
    }

    /// Route an MQTT v3.1.1 event. v3.1.1 acknowledgments carry no reason
    /// code, so every ack is a success.
    pub fn route_v311(event: &rumqttc::Event) -> LinkEvent {
        use rumqttc::{ConnectReturnCode, Event, Packet};

        match event {
            Event::Incoming(packet) => match packet {
                Packet::ConnAck(connack) if connack.code == ConnectReturnCode::Success => {
                    LinkEvent::Connected
                }
                Packet::PubAck(ack) => LinkEvent::PublishAcknowledged {
                    pkid: ack.pkid,
                    code: PublishResultCode::Success,
                },
                Packet::PubRec(rec) => LinkEvent::PublishReceived {
                    pkid: rec.pkid,
                    code: PublishResultCode::Success,
                },
                Packet::PubComp(comp) => LinkEvent::PublishAcknowledged {
                    pkid: comp.pkid,
                    code: PublishResultCode::Success,
                },
                Packet::Disconnect => LinkEvent::BrokerDisconnected,
                _ => LinkEvent::Other,
            },
            Event::Outgoing(outgoing) => Self::route_outgoing(outgoing),
        }
    }

    fn route_outgoing(outgoing: &Outgoing) -> LinkEvent {
        match outgoing {
            Outgoing::Publish(pkid) => LinkEvent::PublishSent { pkid: *pkid },
            Outgoing::Disconnect => LinkEvent::DisconnectSent,
            _ => LinkEvent::Other,
        }
    }
}
