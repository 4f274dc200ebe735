//! Pipeline completo de uma mensagem:
//! classificação → extração → validação → AQI → emissão.
//!
//! Cada frame é processado até o fim antes do próximo; não há estado
//! compartilhado entre mensagens.

use crate::aqi::{self, AqiResult};
use crate::emitter::Emitter;
use crate::envelope::{self, Extraction};
use crate::error::{FilterReason, PipelineError};
use crate::sink::MetricSink;
use crate::types::{NodeId, RawMessage};
use crate::validator;
use tracing::{debug, error, info, warn};

/// O que aconteceu com um frame.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Emitted {
        node_id: NodeId,
        aqi: AqiResult,
        points: usize,
    },
    Filtered(FilterReason),
    Dropped(PipelineError),
}

pub struct Pipeline<S> {
    emitter: Emitter<S>,
    text_port: i32,
}

impl<S: MetricSink> Pipeline<S> {
    pub fn new(sink: S, text_port: i32) -> Self {
        Self {
            emitter: Emitter::new(sink),
            text_port,
        }
    }

    pub fn sink(&self) -> &S {
        self.emitter.sink()
    }

    /// Processa um frame com o timestamp do momento do processamento.
    pub fn process(&self, msg: &RawMessage) -> Outcome {
        self.process_at(msg, chrono::Utc::now().timestamp_millis())
    }

    /// Igual a [`Pipeline::process`], com timestamp explícito.
    pub fn process_at(&self, msg: &RawMessage, timestamp_ms: i64) -> Outcome {
        let outcome = match self.run(msg, timestamp_ms) {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Dropped(e),
        };
        log_outcome(&msg.topic, &outcome);
        outcome
    }

    fn run(&self, msg: &RawMessage, timestamp_ms: i64) -> Result<Outcome, PipelineError> {
        let decoded = envelope::classify(&msg.payload)?;

        let (node_id, text) = match envelope::extract(decoded, self.text_port)? {
            Extraction::Text { node_id, text } => (node_id, text),
            Extraction::Filtered(reason) => return Ok(Outcome::Filtered(reason)),
        };

        let reading = validator::validate(node_id, &text)?;
        let aqi = aqi::calculate(reading.pm25);

        info!(
            node_id = %reading.node_id,
            aqi = aqi.value,
            category = %aqi.category,
            pm25 = reading.pm25,
            "📊 Leitura recebida"
        );

        let report = self.emitter.emit(&reading, &aqi, timestamp_ms)?;

        Ok(Outcome::Emitted {
            node_id: reading.node_id,
            aqi,
            points: report.accepted,
        })
    }
}

fn log_outcome(topic: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Emitted { node_id, points, .. } => {
            info!(node_id = %node_id, points, "✓ Lote gravado");
        }
        Outcome::Filtered(reason) => {
            debug!(topic, "Ignorando mensagem: {reason}");
        }
        Outcome::Dropped(PipelineError::Sink(e)) => {
            error!(topic, "Lote descartado: {e}");
        }
        Outcome::Dropped(e) => {
            warn!(topic, "Mensagem descartada: {e}");
        }
    }
}
