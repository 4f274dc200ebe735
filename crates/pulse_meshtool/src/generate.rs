//! Envelope de teste: leitura de sensor em claro na porta de texto.

use pulse_core::mesh::ServiceEnvelope;
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub node_id: u32,
    pub pm1: f64,
    pub pm25: f64,
    pub pm4: f64,
    pub pm10: f64,
    pub voc: f64,
    pub nox: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub channel_id: String,
    pub gateway_id: String,
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self {
            node_id: 0xe702_87b5,
            pm1: 3.0,
            pm25: 4.5,
            pm4: 5.0,
            pm10: 5.0,
            voc: 103.0,
            nox: 1.0,
            temperature: 24.7,
            humidity: 63.8,
            channel_id: "pulse-aqi".into(),
            gateway_id: "!gatewaynode".into(),
        }
    }
}

impl SensorFrame {
    /// JSON que o firmware do sensor envia como texto.
    pub fn reading_json(&self) -> String {
        json!({
            "pm1": self.pm1,
            "pm25": self.pm25,
            "pm4": self.pm4,
            "pm10": self.pm10,
            "voc": self.voc,
            "nox": self.nox,
            "t": self.temperature,
            "rh": self.humidity,
        })
        .to_string()
    }

    pub fn envelope(&self) -> ServiceEnvelope {
        ServiceEnvelope::text_message(
            self.node_id,
            &self.reading_json(),
            &self.channel_id,
            &self.gateway_id,
        )
    }
}

/// Aceita `0xe70287b5`, `!e70287b5` ou decimal.
pub fn parse_node_id(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix('!')) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}
