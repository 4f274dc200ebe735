//! # PulseAQI Meshtool
//!
//! Ferramentas de operador para o tráfego da mesh.
//!
//! ## Uso
//! ```bash
//! pulseaqi_meshtool decode frame.bin           # inspeciona um frame capturado
//! pulseaqi_meshtool decode - --hex < frame.hex # hex pela entrada padrão
//! pulseaqi_meshtool generate --pm25 40 --hex   # envelope de teste
//! pulseaqi_meshtool listen --config pulse.toml # resumo de cada frame do broker
//! ```

mod generate;
mod inspect;

use generate::{parse_node_id, SensorFrame};
use prost::Message;
use pulse_core::config::{AppConfig, SinkKind};
use pulse_core::mqtt::MqttTransport;
use pulse_core::Listener;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{error, info};

const USAGE: &str = "\
uso:
  pulseaqi_meshtool decode <arquivo|-> [--hex]
  pulseaqi_meshtool generate [--node-id N] [--pm25 X] [--pm10 X] [--temp X] [--humidity X] [--output ARQ] [--hex]
  pulseaqi_meshtool listen [--config ARQ]";

#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error("{0}\n{usage}", usage = USAGE)]
    Usage(String),

    #[error("Erro de E/S em {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Hex inválido: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Configuração inválida: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
}

#[derive(Debug, PartialEq)]
enum Command {
    Decode {
        input: String,
        hex: bool,
    },
    Generate {
        frame: SensorFrame,
        output: Option<PathBuf>,
        hex: bool,
    },
    Listen {
        config: Option<PathBuf>,
    },
}

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = parse_command(std::env::args().skip(1)).and_then(|cmd| match cmd {
        Command::Decode { input, hex } => decode(&input, hex),
        Command::Generate { frame, output, hex } => generate(&frame, output, hex),
        Command::Listen { config } => listen(config),
    });

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(2);
    }
}

// ──────────────────────────────────────────────
// Argumentos
// ──────────────────────────────────────────────

fn parse_command<I: IntoIterator<Item = String>>(args: I) -> Result<Command, ToolError> {
    let mut args = args.into_iter();
    let name = args
        .next()
        .ok_or_else(|| ToolError::Usage("comando ausente".into()))?;

    match name.as_str() {
        "decode" => {
            let mut input = None;
            let mut hex = false;
            for arg in args {
                match arg.as_str() {
                    "--hex" => hex = true,
                    _ if input.is_none() => input = Some(arg),
                    _ => return Err(ToolError::Usage(format!("argumento extra: {arg}"))),
                }
            }
            let input = input.ok_or_else(|| ToolError::Usage("informe o arquivo ou '-'".into()))?;
            Ok(Command::Decode { input, hex })
        }
        "generate" => {
            let mut frame = SensorFrame::default();
            let mut output = None;
            let mut hex = false;
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "--hex" => hex = true,
                    "--output" => output = Some(value(&flag, args.next())?.into()),
                    "--node-id" => {
                        let raw = value(&flag, args.next())?;
                        frame.node_id = parse_node_id(&raw)
                            .ok_or_else(|| ToolError::Usage(format!("node id inválido: {raw}")))?;
                    }
                    "--pm25" => frame.pm25 = number(&flag, args.next())?,
                    "--pm10" => frame.pm10 = number(&flag, args.next())?,
                    "--temp" => frame.temperature = number(&flag, args.next())?,
                    "--humidity" => frame.humidity = number(&flag, args.next())?,
                    _ => return Err(ToolError::Usage(format!("opção desconhecida: {flag}"))),
                }
            }
            Ok(Command::Generate { frame, output, hex })
        }
        "listen" => {
            let mut config = None;
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "--config" => config = Some(value(&flag, args.next())?.into()),
                    _ => return Err(ToolError::Usage(format!("opção desconhecida: {flag}"))),
                }
            }
            Ok(Command::Listen { config })
        }
        other => Err(ToolError::Usage(format!("comando desconhecido: {other}"))),
    }
}

fn value(flag: &str, next: Option<String>) -> Result<String, ToolError> {
    next.ok_or_else(|| ToolError::Usage(format!("{flag} exige um valor")))
}

fn number(flag: &str, next: Option<String>) -> Result<f64, ToolError> {
    let raw = value(flag, next)?;
    raw.parse()
        .map_err(|_| ToolError::Usage(format!("{flag}: número inválido '{raw}'")))
}

// ──────────────────────────────────────────────
// Comandos
// ──────────────────────────────────────────────

fn decode(input: &str, hex: bool) -> Result<(), ToolError> {
    let io_err = |source| ToolError::Io {
        path: input.to_string(),
        source,
    };

    let mut bytes = Vec::new();
    if input == "-" {
        std::io::stdin().read_to_end(&mut bytes).map_err(io_err)?;
    } else {
        bytes = std::fs::read(input).map_err(io_err)?;
    }

    if hex {
        bytes = decode_hex(&bytes)?;
    }

    for line in inspect::describe(&bytes, pulse_core::envelope::TEXT_PORT) {
        println!("{line}");
    }
    Ok(())
}

fn decode_hex(raw: &[u8]) -> Result<Vec<u8>, ToolError> {
    let compact: String = String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    Ok(hex::decode(compact)?)
}

fn generate(frame: &SensorFrame, output: Option<PathBuf>, hex: bool) -> Result<(), ToolError> {
    let mut bytes = frame.envelope().encode_to_vec();
    if hex {
        bytes = format!("{}\n", hex::encode(&bytes)).into_bytes();
    }

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes).map_err(|source| ToolError::Io {
                path: path.display().to_string(),
                source,
            })?;
            info!(
                "Envelope de {} bytes gravado em {} ({})",
                bytes.len(),
                path.display(),
                frame.reading_json()
            );
        }
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(&bytes)
                .and_then(|_| out.flush())
                .map_err(|source| ToolError::Io {
                    path: "<stdout>".into(),
                    source,
                })?;
        }
    }
    Ok(())
}

fn listen(config_path: Option<PathBuf>) -> Result<(), ToolError> {
    let path = config_path.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&path);
    config.apply_env();

    // Só o lado MQTT importa aqui; nada é gravado
    config.sink.kind = SinkKind::Stdout;
    let problems = config.validate();
    if !problems.is_empty() {
        return Err(ToolError::InvalidConfig(problems));
    }

    let text_port = config.pipeline.text_port;
    let mqtt = config.mqtt;
    let mut listener = Listener::new(
        MqttTransport::new(mqtt.clone()),
        mqtt.topic.clone(),
        mqtt.retry_delay(),
    );

    listener.run(|msg| {
        println!("{}", inspect::summarize(&msg.topic, &msg.payload, text_port));
    });
    Ok(())
}
