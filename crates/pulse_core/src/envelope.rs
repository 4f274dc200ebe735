//! Classificação do frame e extração do texto do sensor.
//!
//! Os nós publicam dois formatos incompatíveis para a mesma leitura:
//!
//! ```text
//! ┌──────────────┐  decode ok + packet  ┌──────────────────────┐
//! │  frame bruto │ ───────────────────► │ Protobuf (Service-   │
//! │              │                      │ Envelope)            │
//! │              │  UTF-8 que abre `{`  ├──────────────────────┤
//! │              │ ───────────────────► │ Legacy (JSON)        │
//! │              │  nenhum dos dois     ├──────────────────────┤
//! │              │ ───────────────────► │ DecodeError          │
//! └──────────────┘                      └──────────────────────┘
//! ```
//!
//! A escolha é feita uma vez, sem tratar a falha de um formato como erro;
//! o resto do pipeline só faz `match` num conjunto fechado.

use crate::error::{DecodeError, FilterReason, PipelineError, ValidationError};
use crate::mesh::{mesh_packet::PayloadVariant, ServiceEnvelope};
use crate::types::{DecodedEnvelope, NodeId};
use prost::Message;
use serde_json::Value;

/// Porta de texto do firmware (`TEXT_MESSAGE_APP`).
pub const TEXT_PORT: i32 = 1;

/// Resultado do passo de extração.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Texto JSON candidato a leitura de sensor
    Text { node_id: NodeId, text: String },
    Filtered(FilterReason),
}

/// Decide o formato do frame.
pub fn classify(payload: &[u8]) -> Result<DecodedEnvelope, DecodeError> {
    if let Some(envelope) = try_protobuf(payload) {
        return Ok(envelope);
    }

    match std::str::from_utf8(payload) {
        Ok(text) if text.trim_start().starts_with('{') => parse_legacy(text),
        _ => Err(DecodeError::Unrecognized(payload.len())),
    }
}

/// Só conta como protobuf se decodifica e traz `packet`.
fn try_protobuf(payload: &[u8]) -> Option<DecodedEnvelope> {
    let envelope = ServiceEnvelope::decode(payload).ok()?;
    let packet = envelope.packet?;

    let (port, has_decoded, data) = match packet.payload_variant {
        Some(PayloadVariant::Decoded(data)) => (data.portnum, true, data.payload),
        Some(PayloadVariant::Encrypted(_)) | None => (0, false, Vec::new()),
    };

    Some(DecodedEnvelope::Protobuf {
        node_id: packet.from,
        port,
        has_decoded,
        payload: data,
        channel_id: envelope.channel_id,
        gateway_id: envelope.gateway_id,
    })
}

fn parse_legacy(text: &str) -> Result<DecodedEnvelope, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::MalformedJson(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(DecodeError::MalformedJson("envelope legado não é objeto".into()));
    };

    let sender = obj.get("sender").map(sender_to_string);
    let message_type = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let text = obj
        .get("payload")
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(DecodedEnvelope::Legacy {
        sender,
        message_type,
        text,
    })
}

/// Qualquer valor presente em `sender` é aceito.
fn sender_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(num) => NodeId::from_num(num).to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Aplica os filtros do formato e devolve o texto com o node id.
pub fn extract(envelope: DecodedEnvelope, text_port: i32) -> Result<Extraction, PipelineError> {
    match envelope {
        DecodedEnvelope::Protobuf {
            node_id,
            port,
            has_decoded,
            payload,
            ..
        } => {
            if !has_decoded {
                return Ok(Extraction::Filtered(FilterReason::Encrypted));
            }
            if port != text_port {
                return Ok(Extraction::Filtered(FilterReason::NonTextPort(port)));
            }
            let num = node_id.ok_or(ValidationError::MissingSender)?;
            let text = String::from_utf8(payload)
                .map_err(|e| DecodeError::InvalidUtf8(e.utf8_error().to_string()))?;
            if !text.trim_start().starts_with('{') {
                return Ok(Extraction::Filtered(FilterReason::NotJsonText));
            }
            Ok(Extraction::Text {
                node_id: NodeId::from_num(num),
                text,
            })
        }
        DecodedEnvelope::Legacy {
            sender,
            message_type,
            text,
        } => {
            if message_type != "text" {
                return Ok(Extraction::Filtered(FilterReason::NonTextType(message_type)));
            }
            let sender = sender.ok_or(ValidationError::MissingSender)?;
            if !text.starts_with('{') {
                return Ok(Extraction::Filtered(FilterReason::NotJsonText));
            }
            Ok(Extraction::Text {
                node_id: NodeId::from_sender(&sender),
                text,
            })
        }
    }
}
