//! Impure I/O for the publisher session
//!
//! [`MessageService`] owns one broker session: a background task polls the
//! event loop, and `send` waits for the broker's acknowledgment of each
//! publish before returning its result code.

use super::ack_tracker::AckTracker;
use super::connection::{split_host_port, ConnectionState, MqttError, PublishResultCode};
use super::event_router::LinkEvent;
use super::session::{open_session, SessionClient, SessionEventLoop};
use crate::config::{MqttSection, ProtocolVersion};
use crate::observability::PublishStats;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// How long disconnect waits for the loop to stop and for DISCONNECT to flush
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How far a `send` got before its deadline
#[derive(Debug, Clone, Copy)]
enum PublishStage {
    Waiting,
    Registered(u64),
    Queued(u64),
}

/// Publisher session bound to one broker
pub struct MessageService {
    config: MqttSection,
    client: SessionClient,
    tracker: Arc<Mutex<AckTracker>>,
    /// One publish in flight at a time, held from registration to result
    publish_lock: Mutex<()>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    event_loop_handle: Option<JoinHandle<SessionEventLoop>>,
    stats: Arc<PublishStats>,
}

impl MessageService {
    /// Connect and wait for the broker's CONNACK
    pub async fn connect(config: MqttSection) -> Result<Self, MqttError> {
        config.validate()?;
        info!(
            host = %config.host,
            port = config.port,
            protocol = %config.protocol,
            "Connecting to MQTT broker"
        );

        let (client, event_loop) = open_session(&config)?;
        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) = Self::setup_connection_channels();
        let tracker = Arc::new(Mutex::new(AckTracker::default()));

        let handle = tokio::spawn(Self::run_event_loop(
            event_loop,
            tracker.clone(),
            state_tx.clone(),
            shutdown_rx,
        ));

        let connect_timeout = config.connect_timeout();
        let service = MessageService {
            config,
            client,
            tracker,
            publish_lock: Mutex::new(()),
            state_tx,
            state_rx: state_rx.clone(),
            shutdown_tx,
            event_loop_handle: Some(handle),
            stats: Arc::new(PublishStats::default()),
        };

        // On failure the service is dropped here, which stops the loop
        Self::wait_for_connection_confirmation(state_rx, connect_timeout)
            .await
            .map_err(|e| {
                error!("MQTT connection failed: {}", e);
                e
            })?;

        info!(host = %service.config.host, "MQTT session established");
        Ok(service)
    }

    /// Connect with credentials, using defaults for everything else.
    /// `host` may carry a port as `host:port`.
    pub async fn open(
        host: &str,
        username: &str,
        password: &str,
        protocol: ProtocolVersion,
    ) -> Result<Self, MqttError> {
        let (host, port) = split_host_port(host);
        let mut config = MqttSection::new(host, username, password).with_protocol(protocol);
        if let Some(port) = port {
            config = config.with_port(port);
        }
        Self::connect(config).await
    }

    #[allow(clippy::type_complexity)]
    fn setup_connection_channels() -> (
        (
            watch::Sender<ConnectionState>,
            watch::Receiver<ConnectionState>,
        ),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        let state_channels = watch::channel(ConnectionState::Constructing);
        let shutdown_channels = watch::channel(false);
        (state_channels, shutdown_channels)
    }

    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let confirmation = tokio::time::timeout(timeout, async {
            loop {
                match &*state_rx.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(reason) => {
                        return Err(MqttError::ConnectionFailed(reason.clone()));
                    }
                    ConnectionState::Constructing => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailed(
                        "State channel closed".to_string(),
                    ));
                }
            }
        })
        .await;

        match confirmation {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectTimeout(timeout)),
        }
    }

    /// Background task: poll until shutdown or link failure, then hand the
    /// event loop back so disconnect can flush a DISCONNECT through it.
    async fn run_event_loop(
        mut event_loop: SessionEventLoop,
        tracker: Arc<Mutex<AckTracker>>,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SessionEventLoop {
        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Event loop received shutdown signal");
                        break;
                    }
                }
                polled = event_loop.poll() => {
                    let keep_running = match polled {
                        Ok(event) => Self::process_link_event(event, &tracker, &state_tx).await,
                        Err(reason) => {
                            error!("MQTT event loop error: {}", reason);
                            Self::mark_link_lost(&tracker, &state_tx, reason).await;
                            false
                        }
                    };
                    if !keep_running {
                        break;
                    }
                }
            }
        }
        event_loop
    }

    async fn process_link_event(
        event: LinkEvent,
        tracker: &Mutex<AckTracker>,
        state_tx: &watch::Sender<ConnectionState>,
    ) -> bool {
        match event {
            LinkEvent::Connected => {
                info!("Received CONNACK");
                state_tx.send_replace(ConnectionState::Connected);
            }
            LinkEvent::PublishSent { pkid } => tracker.lock().await.on_publish_sent(pkid),
            LinkEvent::PublishAcknowledged { pkid, code } => {
                debug!(pkid, code = %code, "Publish acknowledged");
                tracker.lock().await.on_acknowledged(pkid, code);
            }
            LinkEvent::PublishReceived { pkid, code } => {
                tracker.lock().await.on_received(pkid, code);
            }
            LinkEvent::PublishRefused { code } => {
                // rumqttc dropped the socket; the next poll reconnects
                warn!(code = %code, "Broker refused publish, reopening connection");
                tracker.lock().await.on_refused(code);
            }
            LinkEvent::DisconnectSent => debug!("DISCONNECT sent"),
            LinkEvent::BrokerDisconnected => {
                warn!("Broker closed the session");
                Self::mark_link_lost(tracker, state_tx, "Broker sent DISCONNECT".to_string())
                    .await;
                return false;
            }
            LinkEvent::Other => {}
        }
        true
    }

    /// State first, then waiters: a sender that registers after this sees
    /// the new state and withdraws.
    async fn mark_link_lost(
        tracker: &Mutex<AckTracker>,
        state_tx: &watch::Sender<ConnectionState>,
        reason: String,
    ) {
        state_tx.send_replace(ConnectionState::Disconnected(reason.clone()));
        tracker.lock().await.fail_all(&reason);
    }

    fn check_connection_state(&self) -> Result<(), MqttError> {
        let current_state = self.state_rx.borrow().clone();
        if current_state != ConnectionState::Connected {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }
        Ok(())
    }

    /// Publish one message and wait for the broker's result code.
    ///
    /// A broker refusal is logged and returned as `Ok` with a failing code;
    /// `Err` is reserved for transport failures and timeouts.
    pub async fn send(&self, topic: &str, message: &str) -> Result<PublishResultCode, MqttError> {
        let span = crate::mqtt_span!(topic = %topic, bytes = message.len());

        async {
            self.stats.record_attempt();
            match self.publish_and_wait(topic, message).await {
                Ok(code) if code.is_success() => {
                    self.stats.record_acknowledged();
                    debug!(code = %code, "Message published");
                    Ok(code)
                }
                Ok(code) => {
                    self.stats.record_rejected();
                    error!("Error sending message to topic {}: broker returned {}", topic, code);
                    Ok(code)
                }
                Err(e) => {
                    self.stats.record_failed();
                    error!("Error sending message to topic {}: {}", topic, e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Bounded by `publish_timeout` from the call onward: waiting for the
    /// publish lock, for room in the client queue, and for the result code.
    async fn publish_and_wait(
        &self,
        topic: &str,
        message: &str,
    ) -> Result<PublishResultCode, MqttError> {
        self.check_connection_state()?;
        let timeout = self.config.publish_timeout();

        let mut stage = PublishStage::Waiting;
        let outcome =
            tokio::time::timeout(timeout, self.publish_locked(topic, message, &mut stage)).await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                let mut tracker = self.tracker.lock().await;
                match stage {
                    PublishStage::Waiting => {}
                    PublishStage::Registered(id) => {
                        tracker.cancel(id);
                    }
                    PublishStage::Queued(id) => tracker.abandon(id),
                }
                Err(MqttError::AckTimeout {
                    topic: topic.to_string(),
                    timeout,
                })
            }
        }
    }

    async fn publish_locked(
        &self,
        topic: &str,
        message: &str,
        stage: &mut PublishStage,
    ) -> Result<PublishResultCode, MqttError> {
        let qos = self.config.qos;

        let _publish_guard = self.publish_lock.lock().await;
        let (id, ack) = self.tracker.lock().await.register(topic, qos);
        *stage = PublishStage::Registered(id);

        if let Err(e) = self.check_connection_state() {
            self.tracker.lock().await.cancel(id);
            return Err(e);
        }
        if let Err(e) = self.client.publish(topic, qos, message.to_owned()).await {
            self.tracker.lock().await.cancel(id);
            return Err(e);
        }
        *stage = PublishStage::Queued(id);

        match ack.await {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectionLost(
                "acknowledgment channel closed".to_string(),
            )),
        }
    }

    /// Stop the background loop, then close the session. Safe to call twice;
    /// the second call does nothing.
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        let Some(mut handle) = self.event_loop_handle.take() else {
            debug!("Disconnect on a closed session");
            return Ok(());
        };

        let _ = self.shutdown_tx.send(true);
        let event_loop = match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(Ok(event_loop)) => Some(event_loop),
            Ok(Err(e)) => {
                warn!("Event loop task ended with error: {}", e);
                None
            }
            Err(_) => {
                warn!("Event loop task didn't stop in time, aborting");
                handle.abort();
                None
            }
        };

        let link_up = *self.state_rx.borrow() == ConnectionState::Connected;
        let result = match event_loop {
            Some(event_loop) if link_up => self.close_session(event_loop).await,
            _ => Ok(()),
        };

        self.state_tx.send_replace(ConnectionState::Disconnected(
            "Client disconnected".to_string(),
        ));
        self.tracker.lock().await.fail_all("session closed by client");

        info!("MQTT session closed");
        result
    }

    async fn close_session(&self, mut event_loop: SessionEventLoop) -> Result<(), MqttError> {
        self.client.disconnect().await?;

        let flush = async {
            loop {
                match event_loop.poll().await {
                    Ok(LinkEvent::DisconnectSent) => return Ok(()),
                    Ok(_) => continue,
                    Err(reason) => return Err(MqttError::ConnectionLost(reason)),
                }
            }
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, flush).await {
            Ok(Ok(())) => {
                debug!("DISCONNECT flushed");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Link failed while closing session: {}", e);
                Ok(())
            }
            Err(_) => {
                warn!("DISCONNECT not flushed within {:?}", SHUTDOWN_GRACE);
                Ok(())
            }
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Whether the background event loop task is still alive
    pub fn is_loop_running(&self) -> bool {
        self.event_loop_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stats(&self) -> Arc<PublishStats> {
        self.stats.clone()
    }

    pub fn config(&self) -> &MqttSection {
        &self.config
    }
}

#[async_trait]
impl Transport for MessageService {
    type Error = MqttError;

    async fn send(&self, topic: &str, message: &str) -> Result<PublishResultCode, Self::Error> {
        self.send(topic, message).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnect().await
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection_state()
    }
}

impl Drop for MessageService {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);

        // No async in Drop: the loop is aborted without a DISCONNECT
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_connection_channels() {
        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) =
            MessageService::setup_connection_channels();

        assert_eq!(*state_rx.borrow(), ConnectionState::Constructing);
        assert!(!(*shutdown_rx.borrow()));

        state_tx.send(ConnectionState::Connected).unwrap();
        assert_eq!(*state_rx.borrow(), ConnectionState::Connected);

        shutdown_tx.send(true).unwrap();
        assert!(*shutdown_rx.borrow());
    }

    #[tokio::test]
    async fn test_wait_for_connection_confirmation_success() {
        let ((state_tx, state_rx), _) = MessageService::setup_connection_channels();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = state_tx.send(ConnectionState::Connected);
        });

        let result =
            MessageService::wait_for_connection_confirmation(state_rx, Duration::from_millis(500))
                .await;
        assert!(result.is_ok(), "Should see the Connected state");
    }

    #[tokio::test]
    async fn test_wait_for_connection_confirmation_already_connected() {
        let ((state_tx, state_rx), _) = MessageService::setup_connection_channels();
        state_tx.send(ConnectionState::Connected).unwrap();

        let result =
            MessageService::wait_for_connection_confirmation(state_rx, Duration::from_millis(50))
                .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_connection_confirmation_timeout() {
        let ((_state_tx, state_rx), _) = MessageService::setup_connection_channels();

        let result =
            MessageService::wait_for_connection_confirmation(state_rx, Duration::from_millis(10))
                .await;
        assert!(matches!(result, Err(MqttError::ConnectTimeout(_))));
    }

    #[tokio::test]
    async fn test_wait_for_connection_confirmation_disconnected() {
        let ((state_tx, state_rx), _) = MessageService::setup_connection_channels();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = state_tx.send(ConnectionState::Disconnected("Test disconnect".to_string()));
        });

        let result =
            MessageService::wait_for_connection_confirmation(state_rx, Duration::from_millis(500))
                .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Test disconnect"));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let config = MqttSection::anonymous("127.0.0.1")
            .with_port(1)
            .with_connect_timeout(Duration::from_secs(2));

        let result = MessageService::connect(config).await;
        assert!(
            matches!(
                result,
                Err(MqttError::ConnectionFailed(_)) | Err(MqttError::ConnectTimeout(_))
            ),
            "Expected a connection failure"
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = MqttSection::anonymous("");
        let result = MessageService::connect(config).await;
        assert!(matches!(result, Err(MqttError::Config(_))));
    }
}
