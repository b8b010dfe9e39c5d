use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_capability,
    error::AppResult,
    models::{Bill, BillKind},
    roles::Capability,
    schemas::{
        parse_bill_month, validate_input, BillPath, BillsQuery, CreateActualBillInput,
        EstimatedBillPath, GenerateAllInput, GenerateEstimatedBillInput, UpdateBillInput,
        UpdateBillStatusInput, UpdatePaymentInput,
    },
    services::billing::BatchSummary,
    state::AppState,
};

pub fn estimated_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/estimated-bills",
            axum::routing::get(list_estimated_bills),
        )
        .route(
            "/estimated-bills/generate",
            axum::routing::post(generate_estimated_bill),
        )
        .route(
            "/estimated-bills/generate-all",
            axum::routing::post(generate_all_estimated_bills),
        )
        .route(
            "/estimated-bills/{bill_id}",
            axum::routing::get(get_estimated_bill)
                .patch(update_estimated_bill)
                .delete(delete_estimated_bill),
        )
        .route(
            "/estimated-bills/{bill_id}/status",
            axum::routing::put(update_estimated_status),
        )
}

pub fn actual_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/actual-bills",
            axum::routing::get(list_actual_bills).post(create_actual_bill),
        )
        .route(
            "/actual-bills/from-estimated/{estimated_bill_id}",
            axum::routing::post(create_actual_from_estimated),
        )
        .route(
            "/actual-bills/{bill_id}",
            axum::routing::get(get_actual_bill)
                .patch(update_actual_bill)
                .delete(delete_actual_bill),
        )
        .route(
            "/actual-bills/{bill_id}/status",
            axum::routing::put(update_actual_status),
        )
        .route(
            "/actual-bills/{bill_id}/payment",
            axum::routing::put(update_payment),
        )
}

async fn list_bills(
    state: &AppState,
    headers: &HeaderMap,
    query: BillsQuery,
    kind: BillKind,
) -> AppResult<Json<Value>> {
    require_capability(state, headers, Capability::ViewBills)?;
    let filter = query.into_filter(kind)?;
    let bills = state.billing.list_bills(&filter).await?;
    Ok(Json(json!({ "data": bills })))
}

async fn get_bill(
    state: &AppState,
    headers: &HeaderMap,
    path: BillPath,
    kind: BillKind,
) -> AppResult<Json<Bill>> {
    require_capability(state, headers, Capability::ViewBills)?;
    Ok(Json(state.billing.get_bill(path.bill_id, kind).await?))
}

async fn update_bill(
    state: &AppState,
    headers: &HeaderMap,
    path: BillPath,
    kind: BillKind,
    payload: UpdateBillInput,
) -> AppResult<Json<Bill>> {
    require_capability(state, headers, Capability::ManageBills)?;
    validate_input(&payload)?;
    let bill = state
        .billing
        .update_bill(path.bill_id, kind, payload.into())
        .await?;
    Ok(Json(bill))
}

async fn update_status(
    state: &AppState,
    headers: &HeaderMap,
    path: BillPath,
    kind: BillKind,
    payload: UpdateBillStatusInput,
) -> AppResult<Json<Bill>> {
    require_capability(state, headers, Capability::ManageBills)?;
    let bill = state
        .billing
        .update_status(path.bill_id, kind, payload.status)
        .await?;
    Ok(Json(bill))
}

async fn delete_bill(
    state: &AppState,
    headers: &HeaderMap,
    path: BillPath,
    kind: BillKind,
) -> AppResult<Json<Value>> {
    require_capability(state, headers, Capability::ManageBills)?;
    state.billing.delete_bill(path.bill_id, kind).await?;
    Ok(Json(json!({ "id": path.bill_id, "deleted": true })))
}

async fn list_estimated_bills(
    State(state): State<AppState>,
    Query(query): Query<BillsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    list_bills(&state, &headers, query, BillKind::Estimated).await
}

async fn generate_estimated_bill(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateEstimatedBillInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_capability(&state, &headers, Capability::ManageBills)?;
    let bill_month = parse_bill_month(&payload.bill_month)?;
    let bill = state
        .billing
        .generate_estimated_bill(payload.room_id, bill_month, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

async fn generate_all_estimated_bills(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<GenerateAllInput>>,
) -> AppResult<Json<BatchSummary>> {
    require_capability(&state, &headers, Capability::RunBillingJobs)?;
    let payload = payload.map(|Json(input)| input).unwrap_or_default();
    let bill_month = match payload.bill_month.as_deref() {
        Some(raw) => parse_bill_month(raw)?,
        None => state.billing.current_month(),
    };
    let summary = state
        .billing
        .generate_monthly_estimated_bills(bill_month)
        .await?;
    Ok(Json(summary))
}

async fn get_estimated_bill(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
) -> AppResult<Json<Bill>> {
    get_bill(&state, &headers, path, BillKind::Estimated).await
}

async fn update_estimated_bill(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBillInput>,
) -> AppResult<Json<Bill>> {
    update_bill(&state, &headers, path, BillKind::Estimated, payload).await
}

async fn delete_estimated_bill(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    delete_bill(&state, &headers, path, BillKind::Estimated).await
}

async fn update_estimated_status(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBillStatusInput>,
) -> AppResult<Json<Bill>> {
    update_status(&state, &headers, path, BillKind::Estimated, payload).await
}

async fn list_actual_bills(
    State(state): State<AppState>,
    Query(query): Query<BillsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    list_bills(&state, &headers, query, BillKind::Actual).await
}

async fn create_actual_bill(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateActualBillInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_capability(&state, &headers, Capability::ManageBills)?;
    validate_input(&payload)?;
    let bill = state
        .billing
        .create_actual_bill(payload.into_manual_bill()?, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

async fn create_actual_from_estimated(
    State(state): State<AppState>,
    Path(path): Path<EstimatedBillPath>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = require_capability(&state, &headers, Capability::ManageBills)?;
    let bill = state
        .billing
        .generate_actual_bill_from_estimated(path.estimated_bill_id, Some(user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

async fn get_actual_bill(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
) -> AppResult<Json<Bill>> {
    get_bill(&state, &headers, path, BillKind::Actual).await
}

async fn update_actual_bill(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBillInput>,
) -> AppResult<Json<Bill>> {
    update_bill(&state, &headers, path, BillKind::Actual, payload).await
}

async fn delete_actual_bill(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    delete_bill(&state, &headers, path, BillKind::Actual).await
}

async fn update_actual_status(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBillStatusInput>,
) -> AppResult<Json<Bill>> {
    update_status(&state, &headers, path, BillKind::Actual, payload).await
}

async fn update_payment(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePaymentInput>,
) -> AppResult<Json<Bill>> {
    require_capability(&state, &headers, Capability::ManageBills)?;
    validate_input(&payload)?;
    let bill = state
        .billing
        .update_payment(
            path.bill_id,
            payload.payment_status,
            payload.payment_date,
            payload.payment_method,
        )
        .await?;
    Ok(Json(bill))
}
