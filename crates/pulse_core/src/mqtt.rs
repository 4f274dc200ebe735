//! Transporte MQTT síncrono sobre `rumqttc`.
//!
//! Cada `connect()` cria um cliente novo; a conexão TCP de fato só é
//! aberta no primeiro `next_event()`, e o `ConnAck` vira
//! [`TransportEvent::Connected`].
//!
//! Até o `ConnAck` a leitura espera mais que o `connection_timeout` do
//! `rumqttc` (5s): cancelar o `poll()` no meio do handshake descarta o
//! socket e recomeça do zero na chamada seguinte.

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::listener::{Transport, TransportEvent};
use crate::types::RawMessage;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS, RecvTimeoutError};
use std::time::Duration;
use tracing::debug;

/// Timeout de leitura com a sessão aberta; limita quanto tempo o shutdown espera.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Espera pelo handshake; acima do `connection_timeout` interno do `rumqttc`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacidade da fila de requisições do cliente.
const REQUEST_CAPACITY: usize = 10;

pub struct MqttTransport {
    config: MqttConfig,
    session: Option<(Client, Connection)>,
    /// `ConnAck` recebido na sessão atual
    acked: bool,
}

impl MqttTransport {
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            session: None,
            acked: false,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker.clone(),
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(true);
        if !self.config.username.is_empty() {
            options.set_credentials(self.config.username.clone(), self.config.password.clone());
        }
        options
    }
}

fn not_connected(config: &MqttConfig) -> TransportError {
    TransportError::Connection(format!(
        "sem sessão com {}:{}",
        config.broker, config.port
    ))
}

impl Transport for MqttTransport {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.broker, self.config.port)
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if self.config.broker.trim().is_empty() {
            return Err(TransportError::Connect {
                broker: self.endpoint(),
                reason: "broker não configurado".into(),
            });
        }
        // Derruba a sessão anterior antes de abrir outra
        if let Some((client, _)) = self.session.take() {
            let _ = client.disconnect();
        }
        self.session = Some(Client::new(self.options(), REQUEST_CAPACITY));
        self.acked = false;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let (client, _) = self
            .session
            .as_mut()
            .ok_or_else(|| not_connected(&self.config))?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        let (_, connection) = self
            .session
            .as_mut()
            .ok_or_else(|| not_connected(&self.config))?;

        let timeout = if self.acked {
            POLL_TIMEOUT
        } else {
            HANDSHAKE_TIMEOUT
        };

        match connection.recv_timeout(timeout) {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                Ok(TransportEvent::Message(RawMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                    received_at_ms: chrono::Utc::now().timestamp_millis(),
                }))
            }
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => {
                self.acked = true;
                Ok(TransportEvent::Connected)
            }
            Ok(Ok(Event::Incoming(Packet::SubAck(_)))) => {
                debug!("Assinatura confirmada pelo broker");
                Ok(TransportEvent::Idle)
            }
            Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                self.session = None;
                Ok(TransportEvent::Disconnected("broker encerrou a sessão".into()))
            }
            Ok(Ok(_)) => Ok(TransportEvent::Idle),
            Ok(Err(e)) => {
                self.session = None;
                Err(TransportError::Connection(e.to_string()))
            }
            Err(RecvTimeoutError::Timeout) if self.acked => Ok(TransportEvent::Idle),
            Err(RecvTimeoutError::Timeout) => {
                self.session = None;
                Err(TransportError::Connect {
                    broker: self.endpoint(),
                    reason: format!("sem CONNACK em {}s", timeout.as_secs()),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.session = None;
                Ok(TransportEvent::Disconnected("loop de eventos encerrado".into()))
            }
        }
    }
}
