//! Erros do pipeline.
//!
//! Nenhum destes erros encerra o processo: o listener registra, descarta a
//! mensagem e segue para a próxima.

use std::fmt;

/// Falha ao decodificar o frame ou o texto embutido.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("Frame não é protobuf nem JSON legado ({0} bytes)")]
    Unrecognized(usize),

    #[error("Payload da porta de texto não é UTF-8 válido: {0}")]
    InvalidUtf8(String),

    #[error("JSON malformado: {0}")]
    MalformedJson(String),
}

/// Mensagem decodificada, mas incompleta.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Envelope sem identificação do remetente")]
    MissingSender,

    #[error("Leitura do sensor não é um objeto JSON")]
    NotAnObject,

    #[error("Campo obrigatório ausente: {0}")]
    MissingField(&'static str),

    #[error("Campo não numérico: {0}")]
    NonNumericField(&'static str),
}

/// Falha ao gravar no destino de séries temporais.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SinkError {
    #[error("Destino inacessível: {0}")]
    Unreachable(String),

    #[error("Destino recusou o lote (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Falha de E/S no destino: {0}")]
    Io(String),
}

/// Falha de conexão com o broker.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransportError {
    #[error("Falha ao conectar em {broker}: {reason}")]
    Connect { broker: String, reason: String },

    #[error("Falha ao assinar {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Conexão perdida: {0}")]
    Connection(String),
}

/// Qualquer motivo para uma mensagem não virar pontos gravados.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Tráfego esperado que não nos interessa. Não é erro.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterReason {
    /// Só `encrypted` preenchido
    Encrypted,
    /// Telemetria, posição, admin...
    NonTextPort(i32),
    /// `type` do JSON legado diferente de `"text"`
    NonTextType(String),
    /// Texto que não começa com `{` (chat comum)
    NotJsonText,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::Encrypted => write!(f, "pacote criptografado"),
            FilterReason::NonTextPort(port) => {
                write!(f, "porta {}", crate::mesh::port_name(*port))
            }
            FilterReason::NonTextType(kind) => write!(f, "tipo legado '{kind}'"),
            FilterReason::NotJsonText => write!(f, "texto sem JSON"),
        }
    }
}
