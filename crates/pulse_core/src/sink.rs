//! Contrato com o armazenamento de séries temporais.
//!
//! O pipeline só conhece "gravar um lote de pontos". O backend concreto
//! (InfluxDB, stdout...) fica no binário.

use crate::error::SinkError;
use crate::types::MetricPoint;

/// Registro recusado individualmente pelo destino.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Métrica afetada, quando o destino informa
    pub metric: Option<String>,
    pub reason: String,
}

/// Resultado de um lote aceito (total ou parcialmente).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteReport {
    pub accepted: usize,
    pub rejected: Vec<Rejection>,
}

impl WriteReport {
    pub fn all_accepted(count: usize) -> Self {
        Self {
            accepted: count,
            rejected: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Destino de lotes de [`MetricPoint`].
///
/// `Ok` com rejeições = falha parcial (segue o baile);
/// `Err` = lote inteiro perdido, sem fila de retentativa.
#[cfg_attr(test, mockall::automock)]
pub trait MetricSink {
    fn write_batch(&self, points: &[MetricPoint]) -> Result<WriteReport, SinkError>;
}

impl<T: MetricSink + ?Sized> MetricSink for Box<T> {
    fn write_batch(&self, points: &[MetricPoint]) -> Result<WriteReport, SinkError> {
        (**self).write_batch(points)
    }
}
