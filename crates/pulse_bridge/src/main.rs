//! # PulseAQI Bridge
//!
//! Serviço de longa duração: assina o tópico da mesh no broker MQTT,
//! transforma cada leitura de sensor em pontos de série temporal (com AQI)
//! e grava no InfluxDB.
//!
//! ## Uso
//! ```bash
//! pulseaqi_bridge                          # config.toml ao lado do executável
//! pulseaqi_bridge --config /etc/pulse.toml # config explícito
//! pulseaqi_bridge --dry-run                # pontos em JSON na saída padrão
//! ```

mod influx;
mod stdout_sink;

use influx::InfluxSink;
use pulse_core::config::{AppConfig, SinkKind};
use pulse_core::mqtt::MqttTransport;
use pulse_core::{Listener, MetricSink, Pipeline, SinkError};
use std::path::PathBuf;
use stdout_sink::StdoutSink;
use tracing::{error, info, warn};

/// Falhas de inicialização; depois do arranque nada encerra o processo.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Argumento desconhecido: {0}")]
    UnknownArg(String),

    #[error("--config exige um caminho")]
    MissingConfigPath,

    #[error("Configuração inválida:\n  - {}", .0.join("\n  - "))]
    InvalidConfig(Vec<String>),

    #[error("Falha ao criar o destino: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    dry_run: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, StartupError> {
    let mut parsed = Args::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                parsed.config = Some(iter.next().ok_or(StartupError::MissingConfigPath)?.into());
            }
            "--dry-run" => parsed.dry_run = true,
            _ => return Err(StartupError::UnknownArg(arg)),
        }
    }
    Ok(parsed)
}

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), StartupError> {
    let args = parse_args(std::env::args().skip(1))?;

    // ── Carregar config ──
    let config_path = args.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    config.apply_env();
    if args.dry_run {
        config.sink.kind = SinkKind::Stdout;
    }

    let problems = config.validate();
    if !problems.is_empty() {
        return Err(StartupError::InvalidConfig(problems));
    }

    // ── Destino (criado uma vez) ──
    let (sink, sink_desc): (Box<dyn MetricSink>, String) = match config.sink.kind {
        SinkKind::Influxdb => {
            let influx = InfluxSink::new(&config.sink.influxdb)?;
            let desc = format!(
                "InfluxDB {} (bucket {})",
                influx.endpoint(),
                config.sink.influxdb.bucket
            );
            (Box::new(influx), desc)
        }
        SinkKind::Stdout => (
            Box::new(StdoutSink::new(config.sink.influxdb.measurement.clone())),
            "stdout (JSON lines)".to_string(),
        ),
    };

    // ── Banner ──
    let mqtt = &config.mqtt;
    eprintln!();
    eprintln!("══════════════════════════════════════════════");
    eprintln!("   🌫  PULSEAQI BRIDGE – ATIVO (Rust)");
    eprintln!("══════════════════════════════════════════════");
    eprintln!("  Broker:    {}:{}", mqtt.broker, mqtt.port);
    eprintln!("  Tópico:    {}", mqtt.topic);
    eprintln!("  Destino:   {sink_desc}");
    eprintln!("  Reconexão: {}s", mqtt.retry_delay_secs);
    eprintln!("══════════════════════════════════════════════");
    eprintln!();

    // ── Loop principal ──
    let pipeline = Pipeline::new(sink, config.pipeline.text_port);
    let mut listener = Listener::new(
        MqttTransport::new(mqtt.clone()),
        mqtt.topic.clone(),
        mqtt.retry_delay(),
    );

    info!("Aguardando leituras da mesh...");
    listener.run(|msg| {
        pipeline.process(&msg);
    });

    Ok(())
}
