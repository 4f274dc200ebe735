//! # Pulse Core
//!
//! Crate compartilhada do PulseAQI: recebe frames da mesh via MQTT,
//! identifica o formato (protobuf ou JSON legado), valida a leitura do
//! sensor, calcula o AQI e entrega pontos de série temporal a um destino.
//!
//! ## Módulos
//! - [`types`] – Entidades do pipeline (frame, envelope, leitura, ponto)
//! - [`mesh`] – Esquema protobuf do `ServiceEnvelope`
//! - [`envelope`] – Classificação do frame e extração do texto
//! - [`validator`] – Leitura do sensor a partir do JSON
//! - [`aqi`] – AQI/EPA do PM2.5
//! - [`emitter`] – Leitura + AQI → lote de pontos
//! - [`sink`] – Contrato do armazenamento
//! - [`pipeline`] – Encadeamento completo por mensagem
//! - [`listener`] – Máquina de estados da conexão
//! - [`mqtt`] – Transporte `rumqttc`
//! - [`config`] – Configuração via TOML

pub mod aqi;
pub mod config;
pub mod emitter;
pub mod envelope;
pub mod error;
pub mod listener;
pub mod mesh;
pub mod mqtt;
pub mod pipeline;
pub mod sink;
pub mod types;
pub mod validator;

// Re-exports convenientes
pub use aqi::{AqiCategory, AqiResult};
pub use config::AppConfig;
pub use error::{
    DecodeError, FilterReason, PipelineError, SinkError, TransportError, ValidationError,
};
pub use listener::{Listener, ListenerState, Transport, TransportEvent};
pub use pipeline::{Outcome, Pipeline};
pub use sink::{MetricSink, Rejection, WriteReport};
pub use types::{DecodedEnvelope, MetricPoint, NodeId, RawMessage, SensorReading};
