//! Gemini-backed dashboard analysis.
//!
//! The model is asked for a pipe-delimited `TITULO|MENSAJE|COLOR` reply.
//! Anything else degrades to a fallback card; this service never fails the
//! metrics request that invoked it.

use comunimapp_common::config::AiConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::metrics::BusinessKpis;

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Executive alert card produced by the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub titulo: String,
    pub mensaje: String,
    /// One of `red`, `yellow`, `green`, `blue`, `gray`.
    pub color_alerta: String,
}

impl AiAnalysis {
    fn quota_exceeded() -> Self {
        Self {
            titulo: "Servicio Saturado".to_string(),
            mensaje: "El sistema de IA está ocupado momentáneamente. Intente más tarde."
                .to_string(),
            color_alerta: "gray".to_string(),
        }
    }

    fn unavailable() -> Self {
        Self {
            titulo: "Error de Servicio".to_string(),
            mensaje: "No disponible temporalmente.".to_string(),
            color_alerta: "gray".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Gemini analysis service.
#[derive(Clone)]
pub struct AiService {
    config: AiConfig,
    http_client: reqwest::Client,
}

impl AiService {
    /// Create an AI service.
    #[must_use]
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Produce an alert card for the current dashboard numbers.
    ///
    /// Always returns a card: quota exhaustion and every other failure map
    /// to fixed gray fallbacks.
    pub async fn analyze(
        &self,
        kpis: &BusinessKpis,
        risk_zones: &BTreeMap<String, u64>,
        priorities: &BTreeMap<String, u64>,
    ) -> AiAnalysis {
        let prompt = build_prompt(kpis, risk_zones, priorities);
        match self.generate(&prompt).await {
            Ok(text) => parse_reply(&text),
            Err(GenerateError::QuotaExceeded) => {
                tracing::warn!("Gemini quota exceeded");
                AiAnalysis::quota_exceeded()
            }
            Err(GenerateError::Other(detail)) => {
                tracing::warn!(error = %detail, "Gemini request failed");
                AiAnalysis::unavailable()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let url = format!(
            "{GEMINI_API}/models/{}:generateContent?key={}",
            self.config.model, self.config.gemini_api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerateError::Other(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerateError::QuotaExceeded);
        }
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerateError::Other(detail));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Other(e.to_string()))?;
        generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| GenerateError::Other("empty completion".to_string()))
    }
}

enum GenerateError {
    QuotaExceeded,
    Other(String),
}

fn build_prompt(
    kpis: &BusinessKpis,
    risk_zones: &BTreeMap<String, u64>,
    priorities: &BTreeMap<String, u64>,
) -> String {
    let zones: Vec<&str> = risk_zones.keys().map(String::as_str).collect();
    format!(
        "Rol: Analista de Seguridad y Operaciones.\n\
        \n\
        Contexto de Datos:\n\
        - Incidentes Totales: {}\n\
        - Casos Pendientes: {}\n\
        - Eficiencia de Resolucion: {}\n\
        - Zonas Criticas: {zones:?}\n\
        - Distribucion de Prioridad: {priorities:?}\n\
        \n\
        Instruccion:\n\
        Analiza la situacion actual y genera una alerta ejecutiva.\n\
        \n\
        Formato de Respuesta Requerido (Texto plano separado por tuberias):\n\
        TITULO|MENSAJE|COLOR\n\
        \n\
        Reglas de Negocio:\n\
        1. TITULO: Maximo 5 palabras. Conciso y directo.\n\
        2. MENSAJE: Maximo 20 palabras. Debe sugerir una accion tactica.\n\
        3. COLOR:\n\
           - 'red': Si resolucion < 50% o pendientes > 20 (Situacion Critica).\n\
           - 'yellow': Si hay acumulacion moderada (Precaucion).\n\
           - 'green': Si la operacion es estable (Optimo).",
        kpis.total_reportes, kpis.casos_activos, kpis.tiempo_formato
    )
}

/// Parse a model reply. Fewer than three pipe-separated parts degrade to a
/// blue card carrying the truncated raw text.
fn parse_reply(text: &str) -> AiAnalysis {
    let parts: Vec<&str> = text.split('|').collect();
    if parts.len() >= 3 {
        AiAnalysis {
            titulo: parts[0].trim().to_string(),
            mensaje: parts[1].trim().to_string(),
            color_alerta: parts[2].trim().to_lowercase(),
        }
    } else {
        AiAnalysis {
            titulo: "Reporte IA Generado".to_string(),
            mensaje: text.chars().take(100).collect(),
            color_alerta: "blue".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_reply() {
        let card = parse_reply("Acumulacion Critica | Refuerce el equipo de campo | RED");
        assert_eq!(card.titulo, "Acumulacion Critica");
        assert_eq!(card.mensaje, "Refuerce el equipo de campo");
        assert_eq!(card.color_alerta, "red");
    }

    #[test]
    fn test_parse_extra_pipes_keeps_first_three() {
        let card = parse_reply("Titulo|Mensaje|green|ignorado");
        assert_eq!(card.color_alerta, "green");
    }

    #[test]
    fn test_parse_malformed_reply_falls_back_blue() {
        let raw = "La operacion se encuentra estable y sin acumulacion relevante";
        let card = parse_reply(raw);
        assert_eq!(card.titulo, "Reporte IA Generado");
        assert_eq!(card.mensaje, raw);
        assert_eq!(card.color_alerta, "blue");
    }

    #[test]
    fn test_parse_truncates_long_raw_text() {
        let raw = "x".repeat(300);
        let card = parse_reply(&raw);
        assert_eq!(card.mensaje.len(), 100);
    }

    #[test]
    fn test_fallback_cards_are_gray() {
        assert_eq!(AiAnalysis::quota_exceeded().color_alerta, "gray");
        assert_eq!(AiAnalysis::unavailable().color_alerta, "gray");
    }
}
