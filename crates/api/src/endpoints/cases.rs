//! Case update endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use comunimapp_common::{AppError, AppResult};
use comunimapp_core::{CaseUpdateView, CreateCaseUpdateInput, UploadedImage};
use comunimapp_db::entities::UpdateType;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::extractors::AuthUser;
use crate::middleware::AppState;
use crate::response::Message;

#[derive(Debug, Deserialize)]
struct ListUpdatesQuery {
    report_id: String,
}

fn parse_field<T: DeserializeOwned>(name: &str, raw: &str) -> AppResult<T> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| AppError::Validation(format!("invalid value for {name}: {raw}")))
}

/// Pull case update fields and image files out of a multipart form.
async fn read_update_form(
    mut multipart: Multipart,
) -> AppResult<(CreateCaseUpdateInput, Vec<UploadedImage>)> {
    let mut report_id = None;
    let mut message = None;
    let mut update_type = UpdateType::Avance;
    let mut new_status = None;
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
                    "report_id" => report_id = Some(text),
                    "message" => message = Some(text),
                    "update_type" => update_type = parse_field("update_type", &text)?,
                    "new_status" => new_status = Some(parse_field("new_status", &text)?),
                    _ => {}
                }
            }
        }
    }

    let input = CreateCaseUpdateInput {
        report_id: report_id
            .ok_or_else(|| AppError::Validation("report_id is required".to_string()))?,
        message: message.ok_or_else(|| AppError::Validation("message is required".to_string()))?,
        update_type,
        new_status,
    };
    Ok((input, images))
}

async fn create_update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<CaseUpdateView>)> {
    let (input, images) = read_update_form(multipart).await?;
    let update = state
        .case_update_service
        .create(&user, input, images)
        .await?;
    Ok((StatusCode::CREATED, Json(update)))
}

async fn list_updates(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListUpdatesQuery>,
) -> AppResult<Json<Vec<CaseUpdateView>>> {
    let updates = state
        .case_update_service
        .list(&user, &query.report_id)
        .await?;
    Ok(Json(updates))
}

async fn get_update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(update_id): Path<String>,
) -> AppResult<Json<CaseUpdateView>> {
    let update = state.case_update_service.get(&user, &update_id).await?;
    Ok(Json(update))
}

async fn count_updates(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<Json<Value>> {
    let count = state.case_update_service.count(&user, &report_id).await?;
    Ok(Json(json!({ "report_id": report_id, "count": count })))
}

async fn delete_update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(update_id): Path<String>,
) -> AppResult<Json<Message>> {
    state.case_update_service.delete(&user, &update_id).await?;
    Ok(Json(Message::new("Actualización eliminada correctamente")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/updates", get(list_updates).post(create_update))
        .route("/updates/{id}", get(get_update).delete(delete_update))
        .route("/updates/{id}/count", get(count_updates))
}
