//! Report endpoints.
//!
//! Creation arrives as a multipart form so image files can ride along with
//! the report fields, mirroring the mobile client.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, put},
};
use comunimapp_common::{AppError, AppResult};
use comunimapp_core::{CreateReportInput, ReportView, UploadedImage};
use comunimapp_db::entities::{ReportPriority, ReportStatus};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::extractors::AuthUser;
use crate::middleware::AppState;
use crate::response::Message;

#[derive(Debug, Deserialize)]
struct ListReportsQuery {
    status: Option<ReportStatus>,
    priority: Option<ReportPriority>,
    #[serde(default)]
    assigned_to_me: bool,
}

#[derive(Debug, Deserialize)]
struct AssignQuery {
    encargado_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    new_status: ReportStatus,
}

/// Parse a wire-name enum value out of a form text field.
fn parse_field<T: DeserializeOwned>(name: &str, raw: &str) -> AppResult<T> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| AppError::Validation(format!("invalid value for {name}: {raw}")))
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid value for {name}: {raw}")))
}

/// Pull report fields and image files out of a multipart form.
async fn read_report_form(
    mut multipart: Multipart,
) -> AppResult<(CreateReportInput, Vec<UploadedImage>)> {
    let mut description = None;
    let mut latitude = None;
    let mut longitude = None;
    let mut address = None;
    let mut city = None;
    let mut is_anonymous = false;
    let mut priority = ReportPriority::Media;
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match name.as_str() {
            "images" => {
                let filename = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("could not read {filename}: {e}")))?;
                images.push(UploadedImage {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("could not read {name}: {e}")))?;
                match name.as_str() {
                    "description" => description = Some(text),
                    "latitude" => latitude = Some(parse_number("latitude", &text)?),
                    "longitude" => longitude = Some(parse_number("longitude", &text)?),
                    "address" => address = Some(text),
                    "city" => city = Some(text),
                    "is_anonymous" => {
                        let raw = text.trim();
                        is_anonymous = raw.eq_ignore_ascii_case("true") || raw == "1";
                    }
                    "priority" => priority = parse_field("priority", &text)?,
                    _ => {}
                }
            }
        }
    }

    let input = CreateReportInput {
        description: description
            .ok_or_else(|| AppError::Validation("description is required".to_string()))?,
        latitude: latitude
            .ok_or_else(|| AppError::Validation("latitude is required".to_string()))?,
        longitude: longitude
            .ok_or_else(|| AppError::Validation("longitude is required".to_string()))?,
        address,
        city,
        is_anonymous,
        priority,
    };
    Ok((input, images))
}

async fn create_report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ReportView>)> {
    let (input, images) = read_report_form(multipart).await?;
    let report = state.report_service.create(&user, input, images).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn list_reports(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListReportsQuery>,
) -> AppResult<Json<Vec<ReportView>>> {
    let reports = if query.assigned_to_me {
        state
            .report_service
            .list_assigned(&user, query.status, query.priority)
            .await?
    } else {
        state
            .report_service
            .list(&user, query.status, query.priority)
            .await?
    };
    Ok(Json(reports))
}

async fn list_assigned_reports(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListReportsQuery>,
) -> AppResult<Json<Vec<ReportView>>> {
    let reports = state
        .report_service
        .list_assigned(&user, query.status, query.priority)
        .await?;
    Ok(Json(reports))
}

async fn get_report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<Json<ReportView>> {
    let report = state.report_service.get(&user, &report_id).await?;
    Ok(Json(report))
}

async fn assign_report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Query(query): Query<AssignQuery>,
) -> AppResult<Json<ReportView>> {
    let report = state
        .report_service
        .assign(&user, &report_id, &query.encargado_id)
        .await?;
    Ok(Json(report))
}

async fn update_report_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<ReportView>> {
    let report = state
        .report_service
        .update_status(&user, &report_id, query.new_status)
        .await?;
    Ok(Json(report))
}

async fn delete_report(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<Json<Message>> {
    state.report_service.delete(&user, &report_id).await?;
    Ok(Json(Message::new("Reporte eliminado correctamente")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reports).post(create_report))
        .route("/assigned-reports/", get(list_assigned_reports))
        .route("/{report_id}", get(get_report).delete(delete_report))
        .route("/{report_id}/assign", put(assign_report))
        .route("/{report_id}/status", patch(update_report_status))
}
