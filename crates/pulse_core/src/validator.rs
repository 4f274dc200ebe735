//! Validação da leitura do sensor.
//!
//! Esquema no fio:
//! `{"pm1", "pm25", "pm4", "pm10", "voc", "nox", "t", "rh"}`, todos numéricos.
//! Chaves extras são ignoradas.

use crate::error::{DecodeError, PipelineError, ValidationError};
use crate::types::{NodeId, SensorReading};
use serde_json::{Map, Value};

/// Chaves obrigatórias, na ordem em que são conferidas.
pub const REQUIRED_FIELDS: [&str; 8] = ["pm1", "pm25", "pm4", "pm10", "voc", "nox", "t", "rh"];

/// Converte o texto extraído numa [`SensorReading`] completa.
pub fn validate(node_id: NodeId, text: &str) -> Result<SensorReading, PipelineError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::MalformedJson(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(ValidationError::NotAnObject.into());
    };

    Ok(SensorReading {
        node_id,
        pm1: number(&obj, "pm1")?,
        pm25: number(&obj, "pm25")?,
        pm4: number(&obj, "pm4")?,
        pm10: number(&obj, "pm10")?,
        voc: number(&obj, "voc")?,
        nox: number(&obj, "nox")?,
        temperature: number(&obj, "t")?,
        humidity: number(&obj, "rh")?,
    })
}

fn number(obj: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    match obj.get(field) {
        None => Err(ValidationError::MissingField(field)),
        Some(value) => value.as_f64().ok_or(ValidationError::NonNumericField(field)),
    }
}
