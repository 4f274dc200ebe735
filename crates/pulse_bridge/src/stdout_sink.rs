//! Destino de ensaio (`--dry-run`): um JSON por ponto na saída padrão.

use pulse_core::{MetricPoint, MetricSink, SinkError, WriteReport};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

#[derive(Serialize)]
struct Line<'a> {
    measurement: &'a str,
    #[serde(flatten)]
    point: &'a MetricPoint,
}

pub struct StdoutSink<W: Write = std::io::Stdout> {
    measurement: String,
    out: Mutex<W>,
}

impl StdoutSink {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self::with_writer(measurement, std::io::stdout())
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn with_writer(measurement: impl Into<String>, out: W) -> Self {
        Self {
            measurement: measurement.into(),
            out: Mutex::new(out),
        }
    }
}

impl<W: Write> MetricSink for StdoutSink<W> {
    fn write_batch(&self, points: &[MetricPoint]) -> Result<WriteReport, SinkError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Io("saída envenenada".into()))?;

        for point in points {
            let line = Line {
                measurement: &self.measurement,
                point,
            };
            let json = serde_json::to_string(&line).map_err(|e| SinkError::Io(e.to_string()))?;
            writeln!(out, "{json}").map_err(|e| SinkError::Io(e.to_string()))?;
        }
        out.flush().map_err(|e| SinkError::Io(e.to_string()))?;

        Ok(WriteReport::all_accepted(points.len()))
    }
}
