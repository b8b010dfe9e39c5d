use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_capability,
    error::{AppError, AppResult},
    models::MeterReading,
    roles::Capability,
    schemas::{
        validate_input, AbnormalReadingsQuery, BuildingPath, CreateMeterReadingInput,
        ReadingPath, ReadingRangeQuery, RoomPath, UpdateMeterReadingInput, UsageStatisticsQuery,
    },
    services::readings::{BuildingUsageStatistics, UsageStatistics},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/meter-readings", axum::routing::post(create_reading))
        .route(
            "/meter-readings/{reading_id}",
            axum::routing::get(get_reading)
                .put(update_reading)
                .delete(delete_reading),
        )
        .route(
            "/meter-readings/pending/count",
            axum::routing::get(pending_readings_count),
        )
        .route(
            "/meter-readings/{reading_id}/confirm",
            axum::routing::post(confirm_reading),
        )
        .route(
            "/meter-readings/{reading_id}/dispute",
            axum::routing::post(dispute_reading),
        )
        .route(
            "/rooms/{room_id}/meter-readings",
            axum::routing::get(list_room_readings),
        )
        .route(
            "/rooms/{room_id}/meter-readings/latest",
            axum::routing::get(latest_room_reading),
        )
        .route(
            "/rooms/{room_id}/abnormal-readings",
            axum::routing::get(abnormal_readings),
        )
        .route(
            "/rooms/{room_id}/usage-statistics",
            axum::routing::get(usage_statistics),
        )
        .route(
            "/buildings/{building_id}/usage-statistics",
            axum::routing::get(building_usage_statistics),
        )
}

async fn create_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateMeterReadingInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_capability(&state, &headers, Capability::RecordReadings)?;
    validate_input(&payload)?;
    let reading = state
        .readings
        .create_reading(payload.into(), Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

async fn get_reading(
    State(state): State<AppState>,
    Path(path): Path<ReadingPath>,
    headers: HeaderMap,
) -> AppResult<Json<MeterReading>> {
    require_capability(&state, &headers, Capability::ViewReadings)?;
    Ok(Json(state.readings.get_reading(path.reading_id).await?))
}

async fn update_reading(
    State(state): State<AppState>,
    Path(path): Path<ReadingPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateMeterReadingInput>,
) -> AppResult<Json<MeterReading>> {
    require_capability(&state, &headers, Capability::RecordReadings)?;
    validate_input(&payload)?;
    Ok(Json(
        state
            .readings
            .update_reading(path.reading_id, payload.into())
            .await?,
    ))
}

async fn pending_readings_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, Capability::ViewReadings)?;
    let pending = state.readings.pending_readings_count().await?;
    Ok(Json(json!({ "pending": pending })))
}

async fn delete_reading(
    State(state): State<AppState>,
    Path(path): Path<ReadingPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, Capability::RecordReadings)?;
    state.readings.delete_reading(path.reading_id).await?;
    Ok(Json(json!({ "id": path.reading_id, "deleted": true })))
}

async fn confirm_reading(
    State(state): State<AppState>,
    Path(path): Path<ReadingPath>,
    headers: HeaderMap,
) -> AppResult<Json<MeterReading>> {
    require_capability(&state, &headers, Capability::RecordReadings)?;
    Ok(Json(state.readings.confirm_reading(path.reading_id).await?))
}

async fn dispute_reading(
    State(state): State<AppState>,
    Path(path): Path<ReadingPath>,
    headers: HeaderMap,
) -> AppResult<Json<MeterReading>> {
    require_capability(&state, &headers, Capability::RecordReadings)?;
    Ok(Json(state.readings.dispute_reading(path.reading_id).await?))
}

async fn list_room_readings(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    Query(query): Query<ReadingRangeQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, Capability::ViewReadings)?;
    let readings = state
        .readings
        .list_room_readings(path.room_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(json!({ "data": readings })))
}

async fn latest_room_reading(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    headers: HeaderMap,
) -> AppResult<Json<MeterReading>> {
    require_capability(&state, &headers, Capability::ViewReadings)?;
    Ok(Json(state.readings.latest_room_reading(path.room_id).await?))
}

async fn abnormal_readings(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    Query(query): Query<AbnormalReadingsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, Capability::ViewReadings)?;
    validate_input(&query)?;
    let readings = state
        .readings
        .abnormal_readings(
            path.room_id,
            query.electricity_threshold,
            query.water_threshold,
        )
        .await?;
    Ok(Json(json!({ "data": readings })))
}

async fn usage_statistics(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    Query(query): Query<UsageStatisticsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<UsageStatistics>> {
    require_capability(&state, &headers, Capability::ViewReadings)?;
    if query.start_date > query.end_date {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date.".to_string(),
        ));
    }
    let statistics = state
        .readings
        .usage_statistics(path.room_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(statistics))
}

async fn building_usage_statistics(
    State(state): State<AppState>,
    Path(path): Path<BuildingPath>,
    Query(query): Query<UsageStatisticsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<BuildingUsageStatistics>> {
    require_capability(&state, &headers, Capability::ViewReadings)?;
    if query.start_date > query.end_date {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date.".to_string(),
        ));
    }
    let statistics = state
        .readings
        .building_usage_statistics(path.building_id, query.start_date, query.end_date)
        .await?;
    Ok(Json(statistics))
}
