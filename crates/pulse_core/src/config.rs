//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável; segredos e endpoints de
//! implantação podem vir do ambiente (`INFLUXDB_*`, `PULSEAQI_MQTT_BROKER`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros ao persistir a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de serialização: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Conexão com o broker MQTT da mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// `msh/<região>/<canal>/e/<app>/#`
    pub topic: String,
    /// Atraso fixo entre tentativas de conexão
    pub retry_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "mqtt.meshtastic.org".into(),
            port: 1883,
            username: "meshdev".into(),
            password: "large4cats".into(),
            client_id: "pulseaqi-bridge".into(),
            keep_alive_secs: 60,
            topic: "msh/US/2/e/pulse-aqi/#".into(),
            retry_delay_secs: 10,
        }
    }
}

impl MqttConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Parâmetros do pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Porta de aplicação com as leituras (`TEXT_MESSAGE_APP`)
    pub text_port: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_port: crate::envelope::TEXT_PORT,
        }
    }
}

/// Backend de armazenamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Influxdb,
    Stdout,
}

/// InfluxDB v2 (API de escrita em line protocol).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    pub measurement: String,
    pub timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "https://us-east-1-1.aws.cloud2.influxdata.com".into(),
            org: String::new(),
            bucket: "pulseaqi".into(),
            token: String::new(),
            measurement: "air_quality".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub influxdb: InfluxConfig,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Influxdb,
            influxdb: InfluxConfig::default(),
        }
    }
}

/// Configuração raiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub pipeline: PipelineConfig,
    pub sink: SinkConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Aplica overrides do ambiente do processo.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Aplica overrides de uma fonte qualquer (ambiente, testes).
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let influx = &mut self.sink.influxdb;
        let targets: [(&str, &mut String); 4] = [
            ("INFLUXDB_URL", &mut influx.url),
            ("INFLUXDB_TOKEN", &mut influx.token),
            ("INFLUXDB_ORG", &mut influx.org),
            ("INFLUXDB_BUCKET", &mut influx.bucket),
        ];
        for (key, field) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
        if let Some(broker) = lookup("PULSEAQI_MQTT_BROKER").filter(|v| !v.is_empty()) {
            self.mqtt.broker = broker;
        }
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.mqtt.broker.trim().is_empty() {
            errors.push("Broker MQTT não pode ser vazio".into());
        }
        if self.mqtt.port == 0 {
            errors.push("Porta MQTT não pode ser 0".into());
        }
        if !self.mqtt.topic.ends_with("/#") {
            errors.push(format!(
                "Tópico deve terminar com o curinga '/#': {}",
                self.mqtt.topic
            ));
        }
        if self.mqtt.retry_delay_secs == 0 {
            errors.push("Intervalo de reconexão não pode ser 0".into());
        }
        if self.sink.kind == SinkKind::Influxdb {
            let influx = &self.sink.influxdb;
            if influx.token.is_empty() || influx.org.is_empty() {
                errors.push("INFLUXDB_TOKEN e INFLUXDB_ORG devem estar definidos".into());
            }
            if influx.bucket.is_empty() {
                errors.push("Bucket do InfluxDB não pode ser vazio".into());
            }
        }

        errors
    }
}
