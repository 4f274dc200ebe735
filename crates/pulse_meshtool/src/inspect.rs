//! Relatório legível de um frame capturado.

use prost::Message;
use pulse_core::envelope::{self, Extraction};
use pulse_core::mesh::{port_name, ServiceEnvelope};
use pulse_core::{aqi, validator, DecodedEnvelope, NodeId};

/// Relatório completo, uma linha por campo (comando `decode`).
pub fn describe(payload: &[u8], text_port: i32) -> Vec<String> {
    let mut lines = vec![format!("Tamanho:      {} bytes", payload.len())];

    let decoded = match envelope::classify(payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            lines.push(format!("Formato:      desconhecido ({e})"));
            return lines;
        }
    };

    match &decoded {
        DecodedEnvelope::Protobuf {
            node_id,
            port,
            has_decoded,
            channel_id,
            gateway_id,
            ..
        } => {
            lines.push("Formato:      protobuf (ServiceEnvelope)".into());
            lines.push(format!("Remetente:    {}", sender_label(*node_id)));
            lines.push(format!("Canal:        {}", or_dash(channel_id)));
            lines.push(format!("Gateway:      {}", or_dash(gateway_id)));
            if *has_decoded {
                lines.push(format!("Porta:        {} ({port})", port_name(*port)));
                lines.push("Criptografia: não".into());
            } else {
                lines.push("Porta:        -".into());
                lines.push("Criptografia: sim (payload cifrado)".into());
            }
            if let Some(packet) = ServiceEnvelope::decode(payload).ok().and_then(|e| e.packet) {
                lines.push(format!(
                    "Rádio:        RSSI {} dBm | SNR {:.2} dB | hop_limit {}",
                    packet.rx_rssi, packet.rx_snr, packet.hop_limit
                ));
                lines.push(format!("Pacote:       id {:#010x} → {:#010x}", packet.id, packet.to));
            }
        }
        DecodedEnvelope::Legacy {
            sender,
            message_type,
            ..
        } => {
            lines.push("Formato:      JSON legado".into());
            let who = sender
                .as_deref()
                .map_or("(ausente)".into(), |s| NodeId::from_sender(s).to_string());
            lines.push(format!("Remetente:    {who}"));
            lines.push(format!("Tipo:         {message_type}"));
        }
    }

    match envelope::extract(decoded, text_port) {
        Ok(Extraction::Text { node_id, text }) => {
            lines.push(format!("Texto:        {text}"));
            match validator::validate(node_id, &text) {
                Ok(reading) => {
                    let result = aqi::calculate(reading.pm25);
                    lines.push(format!(
                        "Leitura:      PM1 {} | PM2.5 {} | PM4 {} | PM10 {}",
                        reading.pm1, reading.pm25, reading.pm4, reading.pm10
                    ));
                    lines.push(format!(
                        "              VOC {} | NOx {} | {}°C | {}%",
                        reading.voc, reading.nox, reading.temperature, reading.humidity
                    ));
                    lines.push(format!("AQI:          {} ({})", result.value, result.category));
                }
                Err(e) => lines.push(format!("Leitura:      inválida ({e})")),
            }
        }
        Ok(Extraction::Filtered(reason)) => lines.push(format!("Filtrado:     {reason}")),
        Err(e) => lines.push(format!("Descartado:   {e}")),
    }

    lines
}

/// Resumo de uma linha (comando `listen`).
pub fn summarize(topic: &str, payload: &[u8], text_port: i32) -> String {
    let decoded = match envelope::classify(payload) {
        Ok(decoded) => decoded,
        Err(e) => return format!("{topic} | ✗ {e}"),
    };

    let format = match decoded {
        DecodedEnvelope::Protobuf { .. } => "protobuf",
        DecodedEnvelope::Legacy { .. } => "legado",
    };

    let detail = match envelope::extract(decoded, text_port) {
        Ok(Extraction::Text { node_id, text }) => {
            let who = node_id.to_string();
            match validator::validate(node_id, &text) {
                Ok(reading) => {
                    let result = aqi::calculate(reading.pm25);
                    format!(
                        "{who} PM2.5 {} → AQI {} ({})",
                        reading.pm25, result.value, result.category
                    )
                }
                Err(e) => format!("{who} ✗ {e}"),
            }
        }
        Ok(Extraction::Filtered(reason)) => format!("– {reason}"),
        Err(e) => format!("✗ {e}"),
    };

    format!("{topic} | {format} | {detail}")
}

fn sender_label(node_id: Option<u32>) -> String {
    node_id.map_or("(ausente)".into(), |n| NodeId::from_num(n).to_string())
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
