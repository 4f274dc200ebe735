//! Listener do transporte: máquina de estados de conexão.
//!
//! ```text
//!                 connect() ok
//!  Disconnected ───────────────► Connecting
//!       ▲  ▲                        │ Connected → subscribe()
//!       │  │   erro / queda         ▼
//!       │  └─────────────────── Subscribed ──► Message → handler
//!       └── erro (espera retry_delay)
//! ```
//!
//! Um `Connecting` que passa de `connect_timeout` sem `Connected` conta
//! como falha de conexão e cai no mesmo caminho de retry.
//!
//! A assinatura é feita uma vez por conexão. Falhas nunca encerram o loop;
//! só a flag de shutdown (sinal externo) termina [`Listener::run`].

use crate::error::TransportError;
use crate::types::RawMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Evento entregue pelo transporte.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Broker aceitou a conexão
    Connected,
    Message(RawMessage),
    Disconnected(String),
    /// Nada chegou dentro do timeout de leitura
    Idle,
}

/// Transporte pub/sub. Implementado por [`crate::mqtt::MqttTransport`]
/// e por fakes nos testes.
pub trait Transport {
    /// Descrição do destino para logs.
    fn endpoint(&self) -> String;

    /// Abre uma conexão nova, descartando a anterior.
    fn connect(&mut self) -> Result<(), TransportError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Bloqueia até o próximo evento (ou timeout → `Idle`).
    fn next_event(&mut self) -> Result<TransportEvent, TransportError>;
}

/// Limite padrão para o broker confirmar a conexão.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Estado da conexão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Subscribed,
}

pub struct Listener<T> {
    transport: T,
    topic: String,
    retry_delay: Duration,
    connect_timeout: Duration,
    connecting_since: Instant,
    state: ListenerState,
    shutdown: Arc<AtomicBool>,
    connections: u64,
}

impl<T: Transport> Listener<T> {
    pub fn new(transport: T, topic: impl Into<String>, retry_delay: Duration) -> Self {
        Self {
            transport,
            topic: topic.into(),
            retry_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connecting_since: Instant::now(),
            state: ListenerState::Disconnected,
            shutdown: Arc::new(AtomicBool::new(false)),
            connections: 0,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Flag compartilhada; `true` encerra [`Listener::run`].
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Quantas conexões chegaram a ser assinadas.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Roda até o shutdown, entregando cada mensagem ao handler.
    pub fn run<F: FnMut(RawMessage)>(&mut self, mut handler: F) {
        info!(
            "Listener iniciado – {} | tópico {}",
            self.transport.endpoint(),
            self.topic
        );
        while !self.is_shutdown() {
            self.step(&mut handler);
        }
        info!("Listener encerrado");
    }

    /// Executa uma única transição da máquina de estados.
    pub fn step<F: FnMut(RawMessage)>(&mut self, handler: &mut F) -> ListenerState {
        self.state = match self.state {
            ListenerState::Disconnected => match self.transport.connect() {
                Ok(()) => {
                    debug!("Conectando em {}...", self.transport.endpoint());
                    self.connecting_since = Instant::now();
                    ListenerState::Connecting
                }
                Err(e) => self.fail(e),
            },
            ListenerState::Connecting => match self.transport.next_event() {
                Ok(TransportEvent::Connected) => self.subscribe(),
                Ok(TransportEvent::Disconnected(reason)) => {
                    self.fail(TransportError::Connection(reason))
                }
                Ok(TransportEvent::Message(_)) | Ok(TransportEvent::Idle) => {
                    if self.connecting_since.elapsed() > self.connect_timeout {
                        let broker = self.transport.endpoint();
                        self.fail(TransportError::Connect {
                            broker,
                            reason: format!(
                                "sem confirmação em {}s",
                                self.connect_timeout.as_secs_f64()
                            ),
                        })
                    } else {
                        ListenerState::Connecting
                    }
                }
                Err(e) => self.fail(e),
            },
            ListenerState::Subscribed => match self.transport.next_event() {
                Ok(TransportEvent::Message(msg)) => {
                    handler(msg);
                    ListenerState::Subscribed
                }
                Ok(TransportEvent::Idle) => ListenerState::Subscribed,
                // Sessão nova por baixo (reconexão do cliente): assina de novo
                Ok(TransportEvent::Connected) => self.subscribe(),
                Ok(TransportEvent::Disconnected(reason)) => {
                    warn!("Desconexão inesperada: {reason}. Reconectando...");
                    ListenerState::Disconnected
                }
                Err(e) => self.fail(e),
            },
        };
        self.state
    }

    fn subscribe(&mut self) -> ListenerState {
        info!("✓ Conectado ao broker {}", self.transport.endpoint());
        match self.transport.subscribe(&self.topic) {
            Ok(()) => {
                self.connections += 1;
                info!("✓ Assinado o tópico {}", self.topic);
                ListenerState::Subscribed
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, e: TransportError) -> ListenerState {
        error!(
            "{e}. Tentando novamente em {}s...",
            self.retry_delay.as_secs_f64()
        );
        self.wait_retry();
        ListenerState::Disconnected
    }

    /// Espera o atraso fixo, acordando cedo se vier shutdown.
    fn wait_retry(&self) {
        let deadline = Instant::now() + self.retry_delay;
        while !self.is_shutdown() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(250)));
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Passo roteirizado do fake.
    #[derive(Debug, Clone)]
    pub enum Script {
        ConnectFails,
        ConnectOk,
        SubscribeFails,
        Event(TransportEvent),
        PollFails,
        /// Broker mudo: segura a leitura e devolve `Idle`
        Stall(Duration),
    }

    /// Transporte fake que segue um roteiro e levanta o shutdown no fim.
    pub struct FakeTransport {
        script: VecDeque<Script>,
        pub subscriptions: Vec<String>,
        pub connects: usize,
        pub connect_times: Vec<Instant>,
        shutdown: Option<Arc<AtomicBool>>,
    }

    impl FakeTransport {
        pub fn new(script: Vec<Script>) -> Self {
            Self {
                script: script.into(),
                subscriptions: Vec::new(),
                connects: 0,
                connect_times: Vec::new(),
                shutdown: None,
            }
        }

        fn next(&mut self) -> Option<Script> {
            let step = self.script.pop_front();
            if self.script.is_empty() {
                if let Some(flag) = &self.shutdown {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            step
        }
    }

    impl Transport for FakeTransport {
        fn endpoint(&self) -> String {
            "fake:1883".into()
        }

        fn connect(&mut self) -> Result<(), TransportError> {
            self.connects += 1;
            self.connect_times.push(Instant::now());
            match self.next() {
                Some(Script::ConnectOk) => Ok(()),
                _ => Err(TransportError::Connect {
                    broker: self.endpoint(),
                    reason: "connection refused".into(),
                }),
            }
        }

        fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
            match self.script.front() {
                Some(Script::SubscribeFails) => {
                    self.next();
                    Err(TransportError::Subscribe {
                        topic: topic.into(),
                        reason: "not authorized".into(),
                    })
                }
                _ => {
                    self.subscriptions.push(topic.to_string());
                    Ok(())
                }
            }
        }

        fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
            match self.next() {
                Some(Script::Event(event)) => Ok(event),
                Some(Script::PollFails) => Err(TransportError::Connection("reset by peer".into())),
                Some(Script::Stall(pause)) => {
                    std::thread::sleep(pause);
                    Ok(TransportEvent::Idle)
                }
                _ => Ok(TransportEvent::Idle),
            }
        }
    }

    fn msg(n: u8) -> TransportEvent {
        TransportEvent::Message(RawMessage {
            topic: "msh/US/2/e/pulse-aqi/!node".into(),
            payload: vec![n],
            received_at_ms: 0,
        })
    }

    fn run_script(script: Vec<Script>) -> (Listener<FakeTransport>, Vec<u8>) {
        run_listener(Listener::new(
            FakeTransport::new(script),
            "msh/US/2/e/pulse-aqi/#",
            Duration::ZERO,
        ))
    }

    fn run_listener(mut listener: Listener<FakeTransport>) -> (Listener<FakeTransport>, Vec<u8>) {
        listener.transport.shutdown = Some(listener.shutdown_handle());
        let mut received = Vec::new();
        listener.run(|m| received.push(m.payload[0]));
        (listener, received)
    }

    #[test]
    fn subscribes_once_per_connection() {
        let (listener, received) = run_script(vec![
            Script::ConnectOk,
            Script::Event(TransportEvent::Connected),
            Script::Event(msg(1)),
            Script::Event(TransportEvent::Idle),
            Script::Event(msg(2)),
        ]);
        assert_eq!(received, vec![1, 2]);
        assert_eq!(listener.transport().subscriptions.len(), 1);
        assert_eq!(listener.state(), ListenerState::Subscribed);
    }

    #[test]
    fn retries_until_the_broker_answers() {
        let (listener, received) = run_script(vec![
            Script::ConnectFails,
            Script::ConnectFails,
            Script::ConnectFails,
            Script::ConnectOk,
            Script::Event(TransportEvent::Connected),
            Script::Event(msg(7)),
        ]);
        assert_eq!(listener.transport().connects, 4);
        assert_eq!(received, vec![7]);
    }

    #[test]
    fn keeps_delivering_after_a_disconnect() {
        let (listener, received) = run_script(vec![
            Script::ConnectOk,
            Script::Event(TransportEvent::Connected),
            Script::Event(msg(1)),
            Script::Event(TransportEvent::Disconnected("keep-alive timeout".into())),
            Script::ConnectOk,
            Script::Event(TransportEvent::Connected),
            Script::Event(msg(2)),
            Script::PollFails,
            Script::ConnectOk,
            Script::Event(TransportEvent::Connected),
            Script::Event(msg(3)),
        ]);
        assert_eq!(received, vec![1, 2, 3]);
        assert_eq!(listener.transport().subscriptions.len(), 3);
        assert_eq!(listener.connections(), 3);
    }

    #[test]
    fn failed_subscription_forces_a_reconnect() {
        let (listener, received) = run_script(vec![
            Script::ConnectOk,
            Script::Event(TransportEvent::Connected),
            Script::SubscribeFails,
            Script::ConnectOk,
            Script::Event(TransportEvent::Connected),
            Script::Event(msg(9)),
        ]);
        assert_eq!(received, vec![9]);
        assert_eq!(listener.transport().connects, 2);
        assert_eq!(listener.connections(), 1);
    }

    #[test]
    fn messages_before_subscription_are_ignored() {
        let (_, received) = run_script(vec![
            Script::ConnectOk,
            Script::Event(msg(1)),
            Script::Event(TransportEvent::Connected),
            Script::Event(msg(2)),
        ]);
        assert_eq!(received, vec![2]);
    }

    #[test]
    fn waits_the_retry_delay_between_attempts() {
        let delay = Duration::from_millis(40);
        let (listener, received) = run_listener(Listener::new(
            FakeTransport::new(vec![
                Script::ConnectFails,
                Script::ConnectFails,
                Script::ConnectOk,
                Script::Event(TransportEvent::Connected),
                Script::Event(msg(1)),
            ]),
            "t/#",
            delay,
        ));

        assert_eq!(received, vec![1]);
        let times = &listener.transport().connect_times;
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= delay, "gap {:?}", pair[1] - pair[0]);
        }
    }

    #[test]
    fn stalled_handshake_counts_as_a_failure() {
        let listener = Listener::new(
            FakeTransport::new(vec![
                Script::ConnectOk,
                Script::Stall(Duration::from_millis(40)),
                Script::ConnectOk,
                Script::Event(TransportEvent::Connected),
                Script::Event(msg(5)),
            ]),
            "t/#",
            Duration::ZERO,
        )
        .with_connect_timeout(Duration::from_millis(20));

        let (listener, received) = run_listener(listener);
        assert_eq!(received, vec![5]);
        assert_eq!(listener.transport().connects, 2);
        assert_eq!(listener.connections(), 1);
    }

    #[test]
    fn slow_handshake_within_the_limit_is_kept() {
        let listener = Listener::new(
            FakeTransport::new(vec![
                Script::ConnectOk,
                Script::Stall(Duration::from_millis(10)),
                Script::Event(TransportEvent::Connected),
                Script::Event(msg(3)),
            ]),
            "t/#",
            Duration::ZERO,
        )
        .with_connect_timeout(Duration::from_secs(5));

        let (listener, received) = run_listener(listener);
        assert_eq!(received, vec![3]);
        assert_eq!(listener.transport().connects, 1);
    }

    #[test]
    fn step_walks_the_states() {
        let mut listener = Listener::new(
            FakeTransport::new(vec![
                Script::ConnectOk,
                Script::Event(TransportEvent::Connected),
                Script::Event(TransportEvent::Disconnected("bye".into())),
                Script::Event(TransportEvent::Idle),
            ]),
            "t/#",
            Duration::ZERO,
        );
        let mut sink = |_m: RawMessage| {};
        assert_eq!(listener.state(), ListenerState::Disconnected);
        assert_eq!(listener.step(&mut sink), ListenerState::Connecting);
        assert_eq!(listener.step(&mut sink), ListenerState::Subscribed);
        assert_eq!(listener.step(&mut sink), ListenerState::Disconnected);
    }
}
