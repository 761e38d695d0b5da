//! Dashboard metrics aggregation.
//!
//! One pass over the report fleet, filtered by a creation-date lower bound
//! and a status group. Results are cached per `(range, status_type)` for a
//! few seconds to absorb dashboard polling.

use chrono::{DateTime, Duration, Utc};
use comunimapp_db::entities::{Report, ReportStatus};
use comunimapp_db::repositories::ReportRepository;
use comunimapp_common::AppResult;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::ai::{AiAnalysis, AiService};

const CACHE_TTL_SECS: u64 = 5;

const OPEN_STATUSES: &[ReportStatus] = &[
    ReportStatus::Pendiente,
    ReportStatus::Asignado,
    ReportStatus::EnProceso,
];
const CLOSED_STATUSES: &[ReportStatus] = &[ReportStatus::Resuelto, ReportStatus::Cerrado];

/// Headline business KPIs of the dashboard payload.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessKpis {
    pub total_reportes: u64,
    pub casos_activos: u64,
    /// Resolution rate, percent. The field name is kept for dashboard
    /// compatibility; it no longer carries an average wait time.
    pub tiempo_promedio_espera_horas: f64,
    pub tiempo_formato: String,
    pub etiqueta_tiempo: String,
    pub tasa_transparencia: f64,
    pub tasa_evidencia: f64,
    pub productividad_semanal: u64,
    pub mensaje_alerta: String,
}

/// Anonymity split chart.
#[derive(Debug, Clone, Serialize)]
pub struct AnonymitySplit {
    pub anonimos: u64,
    pub publicos: u64,
}

/// Chart series of the dashboard payload.
#[derive(Debug, Clone, Serialize)]
pub struct Charts {
    pub por_estado: BTreeMap<String, u64>,
    pub por_prioridad: BTreeMap<String, u64>,
    pub top_zonas_riesgo: BTreeMap<String, u64>,
    pub anonimato: AnonymitySplit,
}

/// Full dashboard payload.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub kpis_negocio: BusinessKpis,
    pub graficas: Charts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analisis_ia: Option<AiAnalysis>,
}

/// Metrics service with the TTL cache.
#[derive(Clone)]
pub struct MetricsService {
    reports: ReportRepository,
    ai: Option<Arc<AiService>>,
    cache: Arc<RwLock<HashMap<(String, String), (Instant, DashboardResponse)>>>,
}

impl MetricsService {
    /// Create a metrics service. AI analysis is optional.
    #[must_use]
    pub fn new(reports: ReportRepository, ai: Option<Arc<AiService>>) -> Self {
        Self {
            reports,
            ai,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Compute (or serve from cache) the dashboard for a range and status
    /// filter, optionally attaching the AI analysis card.
    pub async fn dashboard(
        &self,
        range: &str,
        status_type: &str,
        analyze_ai: bool,
    ) -> AppResult<DashboardResponse> {
        let key = (range.to_string(), status_type.to_string());

        let cached = {
            let cache = self.cache.read().await;
            cache.get(&key).and_then(|(at, payload)| {
                (at.elapsed().as_secs() < CACHE_TTL_SECS).then(|| payload.clone())
            })
        };

        let mut payload = match cached {
            Some(payload) => payload,
            None => {
                tracing::debug!(range, status_type, "Computing dashboard metrics");
                let reports = self.reports.find_all(None, None).await?;
                let payload = aggregate(&reports, range, status_type, Utc::now());
                self.cache
                    .write()
                    .await
                    .insert(key, (Instant::now(), payload.clone()));
                payload
            }
        };

        if analyze_ai && let Some(ai) = &self.ai {
            payload.analisis_ia = Some(
                ai.analyze(
                    &payload.kpis_negocio,
                    &payload.graficas.top_zonas_riesgo,
                    &payload.graficas.por_prioridad,
                )
                .await,
            );
        }
        Ok(payload)
    }
}

/// Whether a status counts as closed for the efficiency rate.
fn is_closed(status: ReportStatus) -> bool {
    CLOSED_STATUSES.contains(&status)
}

fn passes_status_filter(status: ReportStatus, status_type: &str) -> bool {
    match status_type {
        "todos" => true,
        "abiertos" => OPEN_STATUSES.contains(&status),
        "cerrados" => CLOSED_STATUSES.contains(&status),
        exact => status.as_str() == exact,
    }
}

fn range_lower_bound(range: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match range {
        "dia" => Some(now - Duration::hours(24)),
        "semana" => Some(now - Duration::days(7)),
        "mes" => Some(now - Duration::days(30)),
        // "historico" and anything unrecognized: no bound.
        _ => None,
    }
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = (part as f64 / total as f64) * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Single-pass aggregation over the fleet.
#[must_use]
pub fn aggregate(
    reports: &[Report],
    range: &str,
    status_type: &str,
    now: DateTime<Utc>,
) -> DashboardResponse {
    let lower_bound = range_lower_bound(range, now);

    let mut total = 0u64;
    let mut closed = 0u64;
    let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_priority: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_city: BTreeMap<String, u64> = BTreeMap::new();
    let mut anonymous = 0u64;
    let mut public = 0u64;
    let mut with_images = 0u64;

    for report in reports {
        if let Some(bound) = lower_bound
            && report.created_at < bound
        {
            continue;
        }
        if !passes_status_filter(report.status, status_type) {
            continue;
        }

        total += 1;
        if is_closed(report.status) {
            closed += 1;
        }
        *by_status.entry(report.status.as_str().to_string()).or_default() += 1;
        *by_priority
            .entry(report.priority.as_str().to_string())
            .or_default() += 1;
        if let Some(city) = report.location.city.as_deref()
            && !city.is_empty()
        {
            *by_city.entry(city.to_string()).or_default() += 1;
        }
        if report.is_anonymous_public {
            anonymous += 1;
        } else {
            public += 1;
        }
        if report.has_images() {
            with_images += 1;
        }
    }

    let efficiency = rate(closed, total);

    DashboardResponse {
        kpis_negocio: BusinessKpis {
            total_reportes: total,
            casos_activos: total - closed,
            tiempo_promedio_espera_horas: efficiency,
            tiempo_formato: format!("{efficiency:.1}%"),
            etiqueta_tiempo: "Tasa Eficacia".to_string(),
            tasa_transparencia: rate(public, total),
            tasa_evidencia: rate(with_images, total),
            productividad_semanal: 0,
            mensaje_alerta: "Normal".to_string(),
        },
        graficas: Charts {
            por_estado: by_status,
            por_prioridad: by_priority,
            top_zonas_riesgo: by_city,
            anonimato: AnonymitySplit {
                anonimos: anonymous,
                publicos: public,
            },
        },
        analisis_ia: None,
    }
}
