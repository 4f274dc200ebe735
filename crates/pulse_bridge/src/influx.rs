//! Destino InfluxDB v2: line protocol via HTTP.
//!
//! Um lote = um POST em `/api/v2/write` com precisão de milissegundos.

use pulse_core::config::InfluxConfig;
use pulse_core::{MetricPoint, MetricSink, Rejection, SinkError, WriteReport};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

pub struct InfluxSink {
    client: Client,
    write_url: String,
    org: String,
    bucket: String,
    token: String,
    measurement: String,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SinkError::Io(format!("cliente HTTP: {e}")))?;

        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            measurement: config.measurement.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.write_url
    }
}

impl MetricSink for InfluxSink {
    fn write_batch(&self, points: &[MetricPoint]) -> Result<WriteReport, SinkError> {
        let body = points
            .iter()
            .map(|p| render_line(&self.measurement, p))
            .collect::<Vec<_>>()
            .join("\n");

        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        debug!(status = status.as_u16(), points = points.len(), "Resposta do InfluxDB");
        interpret(status, &text, points.len())
    }
}

// ──────────────────────────────────────────────
// Line protocol
// ──────────────────────────────────────────────

/// Tag que ficaria vazia depois da limpeza (o InfluxDB recusa `tag=`).
const EMPTY_TAG: &str = "unknown";

/// `<measurement>,node_id=<id>,metric=<nome> value=<f64> <ts_ms>`
///
/// Sempre uma única linha: caracteres de controle do remetente são
/// descartados antes do escape.
pub fn render_line(measurement: &str, point: &MetricPoint) -> String {
    format!(
        "{},node_id={},metric={} value={:?} {}",
        escape(measurement, false),
        escape(point.node_id.as_str(), true),
        escape(point.metric_name, true),
        point.value,
        point.timestamp_ms
    )
}

/// Measurement escapa vírgula e espaço; tags também escapam `=` e `\\`.
fn escape(raw: &str, is_tag: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().filter(|c| !c.is_control()) {
        if c == ',' || c == ' ' || (is_tag && (c == '=' || c == '\\')) {
            out.push('\\');
        }
        out.push(c);
    }
    if out.is_empty() {
        out.push_str(EMPTY_TAG);
    }
    out
}

// ──────────────────────────────────────────────
// Status HTTP → WriteReport
// ──────────────────────────────────────────────

fn interpret(status: StatusCode, body: &str, total: usize) -> Result<WriteReport, SinkError> {
    if status.is_success() {
        return Ok(WriteReport::all_accepted(total));
    }

    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        let dropped = dropped_count(body).unwrap_or(total).min(total);
        // Lote inteiro recusado não é escrita parcial
        if dropped == total {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        return Ok(WriteReport {
            accepted: total - dropped,
            rejected: (0..dropped)
                .map(|_| Rejection {
                    metric: None,
                    reason: body.trim().to_string(),
                })
                .collect(),
        });
    }

    Err(SinkError::Rejected {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

/// Extrai `dropped=N` da mensagem de escrita parcial do InfluxDB.
fn dropped_count(body: &str) -> Option<usize> {
    let start = body.find("dropped=")? + "dropped=".len();
    let digits: String = body[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::NodeId;

    fn point(metric: &'static str, value: f64) -> MetricPoint {
        MetricPoint {
            node_id: NodeId::from_num(0xe702_87b5),
            metric_name: metric,
            value,
            timestamp_ms: 1_700_000_000_123,
        }
    }

    #[test]
    fn renders_one_record_per_point() {
        assert_eq!(
            render_line("air_quality", &point("pm25", 4.0)),
            "air_quality,node_id=!e70287b5,metric=pm25 value=4.0 1700000000123"
        );
        assert_eq!(
            render_line("air_quality", &point("temp", 24.7)),
            "air_quality,node_id=!e70287b5,metric=temp value=24.7 1700000000123"
        );
    }

    #[test]
    fn legacy_sender_with_spaces_is_escaped() {
        let p = MetricPoint {
            node_id: NodeId::from_sender("lab node,1"),
            ..point("aqi", 16.0)
        };
        assert_eq!(
            render_line("air quality", &p),
            r"air\ quality,node_id=lab\ node\,1,metric=aqi value=16.0 1700000000123"
        );
    }

    #[test]
    fn success_accepts_everything() {
        let report = interpret(StatusCode::NO_CONTENT, "", 9).unwrap();
        assert_eq!(report, WriteReport::all_accepted(9));
    }

    #[test]
    fn partial_write_reports_dropped_records() {
        let body = r#"{"code":"unprocessable entity","message":"partial write: field type conflict: input field \"value\" on measurement \"air_quality\" is type float, already exists as type integer dropped=2"}"#;
        let report = interpret(StatusCode::UNPROCESSABLE_ENTITY, body, 9).unwrap();
        assert_eq!(report.accepted, 7);
        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected[0].reason.contains("field type conflict"));
    }

    #[test]
    fn bad_request_without_count_fails_the_batch() {
        assert_eq!(
            interpret(StatusCode::BAD_REQUEST, "unable to parse", 9),
            Err(SinkError::Rejected {
                status: 400,
                body: "unable to parse".into()
            })
        );
    }

    #[test]
    fn every_record_dropped_is_a_failure() {
        let body = "partial write: field type conflict dropped=9";
        assert!(matches!(
            interpret(StatusCode::UNPROCESSABLE_ENTITY, body, 9),
            Err(SinkError::Rejected { status: 422, .. })
        ));
    }

    #[test]
    fn sender_cannot_inject_extra_records() {
        let p = MetricPoint {
            node_id: NodeId::from_sender("x\nevil_measurement,node_id=spoof value=999\r"),
            ..point("pm25", 4.0)
        };
        let line = render_line("air_quality", &p);
        assert_eq!(line.lines().count(), 1);
        assert_eq!(
            line,
            r"air_quality,node_id=xevil_measurement\,node_id\=spoof\ value\=999,metric=pm25 value=4.0 1700000000123"
        );
    }

    #[test]
    fn backslash_in_sender_is_escaped() {
        let p = MetricPoint {
            node_id: NodeId::from_sender(r"lab\"),
            ..point("aqi", 16.0)
        };
        assert_eq!(
            render_line("air_quality", &p),
            r"air_quality,node_id=lab\\,metric=aqi value=16.0 1700000000123"
        );
    }

    #[test]
    fn empty_sender_gets_a_placeholder_tag() {
        let p = MetricPoint {
            node_id: NodeId::from_sender(""),
            ..point("aqi", 16.0)
        };
        assert_eq!(
            render_line("air_quality", &p),
            "air_quality,node_id=unknown,metric=aqi value=16.0 1700000000123"
        );
    }

    #[test]
    fn other_statuses_are_total_failures() {
        assert_eq!(
            interpret(StatusCode::UNAUTHORIZED, "unauthorized access\n", 9),
            Err(SinkError::Rejected {
                status: 401,
                body: "unauthorized access".into()
            })
        );
        assert!(interpret(StatusCode::SERVICE_UNAVAILABLE, "", 9).is_err());
    }

    #[test]
    fn write_url_ignores_trailing_slash() {
        let sink = InfluxSink::new(&InfluxConfig {
            url: "http://localhost:8086/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(sink.endpoint(), "http://localhost:8086/api/v2/write");
    }
}
