//! Converte leitura + AQI em pontos de série temporal e grava o lote.

use crate::aqi::AqiResult;
use crate::error::SinkError;
use crate::sink::{MetricSink, WriteReport};
use crate::types::{MetricPoint, SensorReading};
use tracing::warn;

/// Nomes das métricas, na ordem de emissão.
pub const METRIC_NAMES: [&str; 9] = [
    "pm1", "pm25", "pm4", "pm10", "voc", "nox", "temp", "humidity", "aqi",
];

/// Sempre 9 pontos com o mesmo timestamp: 8 brutos + `aqi`.
pub fn build_points(
    reading: &SensorReading,
    aqi: &AqiResult,
    timestamp_ms: i64,
) -> Vec<MetricPoint> {
    let values = [
        reading.pm1,
        reading.pm25,
        reading.pm4,
        reading.pm10,
        reading.voc,
        reading.nox,
        reading.temperature,
        reading.humidity,
        f64::from(aqi.value),
    ];

    METRIC_NAMES
        .iter()
        .zip(values)
        .map(|(&metric_name, value)| MetricPoint {
            node_id: reading.node_id.clone(),
            metric_name,
            value,
            timestamp_ms,
        })
        .collect()
}

/// Dono do handle do destino.
pub struct Emitter<S> {
    sink: S,
}

impl<S: MetricSink> Emitter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Grava o lote num único `write_batch`.
    ///
    /// Rejeições parciais são registradas aqui e não viram erro.
    pub fn emit(
        &self,
        reading: &SensorReading,
        aqi: &AqiResult,
        timestamp_ms: i64,
    ) -> Result<WriteReport, SinkError> {
        let points = build_points(reading, aqi, timestamp_ms);
        let report = self.sink.write_batch(&points)?;

        for rejection in &report.rejected {
            warn!(
                node_id = %reading.node_id,
                metric = rejection.metric.as_deref().unwrap_or("-"),
                reason = %rejection.reason,
                "Registro recusado pelo destino"
            );
        }

        Ok(report)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aqi;
    use crate::sink::{MockMetricSink, Rejection};
    use crate::types::NodeId;

    fn reading() -> SensorReading {
        SensorReading {
            node_id: NodeId::from_num(0xe702_87b5),
            pm1: 3.0,
            pm25: 4.0,
            pm4: 5.0,
            pm10: 5.0,
            voc: 103.0,
            nox: 1.0,
            temperature: 24.7,
            humidity: 63.8,
        }
    }

    #[test]
    fn nine_points_share_timestamp_and_node() {
        let r = reading();
        let points = build_points(&r, &aqi::calculate(r.pm25), 1_700_000_000_123);

        assert_eq!(points.len(), 9);
        assert!(points.iter().all(|p| p.timestamp_ms == 1_700_000_000_123));
        assert!(points.iter().all(|p| p.node_id.as_str() == "!e70287b5"));
        assert_eq!(points.iter().filter(|p| p.metric_name == "aqi").count(), 1);

        let names: Vec<_> = points.iter().map(|p| p.metric_name).collect();
        assert_eq!(names, METRIC_NAMES);
    }

    #[test]
    fn renamed_fields_carry_their_values() {
        let r = reading();
        let points = build_points(&r, &aqi::calculate(r.pm25), 0);
        let value = |name: &str| points.iter().find(|p| p.metric_name == name).unwrap().value;

        assert_eq!(value("temp"), 24.7);
        assert_eq!(value("humidity"), 63.8);
        assert_eq!(value("aqi"), 16.0);
    }

    #[test]
    fn emit_writes_a_single_batch() {
        let mut sink = MockMetricSink::new();
        sink.expect_write_batch()
            .withf(|points: &[MetricPoint]| points.len() == 9)
            .times(1)
            .returning(|points| Ok(WriteReport::all_accepted(points.len())));

        let emitter = Emitter::new(sink);
        let r = reading();
        let report = emitter.emit(&r, &aqi::calculate(r.pm25), 42).unwrap();
        assert_eq!(report.accepted, 9);
        assert!(!report.is_partial());
    }

    #[test]
    fn partial_rejection_is_not_an_error() {
        let mut sink = MockMetricSink::new();
        sink.expect_write_batch().times(1).returning(|points| {
            Ok(WriteReport {
                accepted: points.len() - 1,
                rejected: vec![Rejection {
                    metric: Some("voc".into()),
                    reason: "field type conflict".into(),
                }],
            })
        });

        let emitter = Emitter::new(sink);
        let r = reading();
        let report = emitter.emit(&r, &aqi::calculate(r.pm25), 42).unwrap();
        assert!(report.is_partial());
        assert_eq!(report.accepted, 8);
    }

    #[test]
    fn total_failure_is_propagated() {
        let mut sink = MockMetricSink::new();
        sink.expect_write_batch()
            .times(1)
            .returning(|_| Err(SinkError::Unreachable("connection refused".into())));

        let emitter = Emitter::new(sink);
        let r = reading();
        assert_eq!(
            emitter.emit(&r, &aqi::calculate(r.pm25), 42),
            Err(SinkError::Unreachable("connection refused".into()))
        );
    }
}
