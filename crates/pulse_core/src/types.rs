//! Tipos do pipeline: do frame bruto do MQTT até o ponto de série temporal.
//!
//! Todas as entidades são transitórias; nada aqui é persistido.

use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Node ID
// ──────────────────────────────────────────────

/// Identificador normalizado de um nó da mesh.
///
/// IDs numéricos são sempre renderizados como `!` + 8 dígitos hex
/// minúsculos, inclusive o ID zero (`!00000000`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Renderiza um ID numérico de 32 bits.
    pub fn from_num(num: u32) -> Self {
        Self(format!("!{num:08x}"))
    }

    /// Normaliza o campo `sender` do envelope JSON legado.
    ///
    /// Strings no formato `!xxxxxxxx` (ou só os 8 dígitos hex) viram a
    /// forma canônica; qualquer outro valor é aceito como veio.
    pub fn from_sender(sender: &str) -> Self {
        let trimmed = sender.trim();
        let hex = trimmed.strip_prefix('!').unwrap_or(trimmed);
        if hex.len() == 8 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(num) = u32::from_str_radix(hex, 16) {
                return Self::from_num(num);
            }
        }
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ──────────────────────────────────────────────
// Frame bruto e envelope decodificado
// ──────────────────────────────────────────────

/// Frame recebido do broker, antes de qualquer classificação.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Momento do recebimento (epoch ms)
    pub received_at_ms: i64,
}

/// Resultado da classificação: exatamente um formato por frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEnvelope {
    /// `ServiceEnvelope` binário (protobuf).
    Protobuf {
        /// `packet.from`; `None` apenas quando o campo não veio no fio
        node_id: Option<u32>,
        /// Porta da aplicação; 0 quando não há `decoded`
        port: i32,
        /// `false` = pacote criptografado (só `encrypted` preenchido)
        has_decoded: bool,
        payload: Vec<u8>,
        channel_id: String,
        gateway_id: String,
    },
    /// Envelope JSON legado `{"sender", "type", "payload": {"text"}}`.
    Legacy {
        /// `None` quando a chave `sender` não existe no objeto
        sender: Option<String>,
        message_type: String,
        text: String,
    },
}

// ──────────────────────────────────────────────
// Leitura do sensor
// ──────────────────────────────────────────────

/// Leitura completa e validada do sensor de qualidade do ar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub node_id: NodeId,
    /// PM1.0 (µg/m³)
    pub pm1: f64,
    /// PM2.5 (µg/m³)
    pub pm25: f64,
    /// PM4.0 (µg/m³)
    pub pm4: f64,
    /// PM10 (µg/m³)
    pub pm10: f64,
    /// Índice VOC
    pub voc: f64,
    /// Índice NOx
    pub nox: f64,
    /// Temperatura (°C), campo `t` no fio
    pub temperature: f64,
    /// Umidade relativa (%), campo `rh` no fio
    pub humidity: f64,
}

// ──────────────────────────────────────────────
// Ponto de série temporal
// ──────────────────────────────────────────────

/// Um registro por métrica, independente do backend de armazenamento.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub node_id: NodeId,
    #[serde(rename = "metric")]
    pub metric_name: &'static str,
    pub value: f64,
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_renders_eight_hex_digits() {
        assert_eq!(NodeId::from_num(0).as_str(), "!00000000");
        assert_eq!(NodeId::from_num(0xe702_87b5).as_str(), "!e70287b5");
        assert_eq!(NodeId::from_num(0x1234_5678).as_str(), "!12345678");
        assert_eq!(NodeId::from_num(u32::MAX).as_str(), "!ffffffff");
        assert_eq!(NodeId::from_num(0xab).as_str(), "!000000ab");
    }

    #[test]
    fn node_id_format_holds_across_the_range() {
        for n in [1u32, 15, 16, 255, 0x0010_0000, 0x8000_0000, u32::MAX - 1] {
            let id = NodeId::from_num(n);
            let s = id.as_str();
            assert_eq!(s.len(), 9);
            assert!(s.starts_with('!'));
            assert!(s[1..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            assert_eq!(u32::from_str_radix(&s[1..], 16).unwrap(), n);
        }
    }

    #[test]
    fn legacy_sender_is_normalized_when_numeric() {
        assert_eq!(NodeId::from_sender("!E70287B5").as_str(), "!e70287b5");
        assert_eq!(NodeId::from_sender("e70287b5").as_str(), "!e70287b5");
        assert_eq!(NodeId::from_sender("!00000000").as_str(), "!00000000");
    }

    #[test]
    fn legacy_sender_keeps_free_form_values() {
        assert_eq!(NodeId::from_sender("garden-node").as_str(), "garden-node");
        assert_eq!(NodeId::from_sender("").as_str(), "");
    }

    #[test]
    fn metric_point_serializes_with_metric_key() {
        let point = MetricPoint {
            node_id: NodeId::from_num(1),
            metric_name: "pm25",
            value: 4.0,
            timestamp_ms: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(
            json,
            r#"{"node_id":"!00000001","metric":"pm25","value":4.0,"timestamp_ms":1700000000000}"#
        );
    }
}
