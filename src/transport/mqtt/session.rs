//! One `rumqttc` client/event-loop pair, either protocol version

use super::connection::{
    build_client_id, configure_v311_options, configure_v5_options, v311_qos, v5_qos, MqttError,
};
use super::event_router::{EventRouter, LinkEvent};
use crate::config::{DeliveryQos, MqttSection, ProtocolVersion};

/// Capacity of the request queue between client handle and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

pub enum SessionClient {
    V5(rumqttc::v5::AsyncClient),
    V311(rumqttc::AsyncClient),
}

pub enum SessionEventLoop {
    V5(rumqttc::v5::EventLoop),
    V311(rumqttc::EventLoop),
}

/// Build the client handle and its event loop. Nothing goes on the wire
/// until the event loop is polled.
pub fn open_session(config: &MqttSection) -> Result<(SessionClient, SessionEventLoop), MqttError> {
    let client_id = build_client_id(&config.client_id_prefix);

    match config.protocol {
        ProtocolVersion::V5 => {
            let options = configure_v5_options(config, &client_id)?;
            let (client, event_loop) =
                rumqttc::v5::AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
            Ok((SessionClient::V5(client), SessionEventLoop::V5(event_loop)))
        }
        ProtocolVersion::V311 => {
            let options = configure_v311_options(config, &client_id)?;
            let (client, event_loop) = rumqttc::AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
            Ok((SessionClient::V311(client), SessionEventLoop::V311(event_loop)))
        }
    }
}

impl SessionClient {
    /// Queue a non-retained publish
    pub async fn publish(
        &self,
        topic: &str,
        qos: DeliveryQos,
        payload: String,
    ) -> Result<(), MqttError> {
        match self {
            SessionClient::V5(client) => client
                .publish(topic, v5_qos(qos), false, payload)
                .await
                .map_err(|e| MqttError::PublishFailed(Box::new(e))),
            SessionClient::V311(client) => client
                .publish(topic, v311_qos(qos), false, payload)
                .await
                .map_err(|e| MqttError::PublishFailed(Box::new(e))),
        }
    }

    /// Queue a DISCONNECT
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        match self {
            SessionClient::V5(client) => client
                .disconnect()
                .await
                .map_err(|e| MqttError::DisconnectFailed(Box::new(e))),
            SessionClient::V311(client) => client
                .disconnect()
                .await
                .map_err(|e| MqttError::DisconnectFailed(Box::new(e))),
        }
    }
}

impl SessionEventLoop {
    /// Drive the connection one step. Link errors are rendered to text since
    /// the two versions have distinct error types.
    pub async fn poll(&mut self) -> Result<LinkEvent, String> {
        match self {
            SessionEventLoop::V5(event_loop) => match event_loop.poll().await {
                Ok(event) => Ok(EventRouter::route_v5(&event)),
                Err(e) => EventRouter::route_v5_error(&e).ok_or_else(|| e.to_string()),
            },
            SessionEventLoop::V311(event_loop) => event_loop
                .poll()
                .await
                .map(|event| EventRouter::route_v311(&event))
                .map_err(|e| e.to_string()),
        }
    }
}
