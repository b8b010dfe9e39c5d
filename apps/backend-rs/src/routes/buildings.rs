use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_capability,
    error::AppResult,
    models::{Building, BuildingRates, NewBuilding},
    roles::Capability,
    schemas::{
        validate_input, BuildingOwnerInput, BuildingOwnerPath, BuildingPath, CreateBuildingInput,
        UpdateBuildingRatesInput,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/buildings",
            axum::routing::get(list_buildings).post(create_building),
        )
        .route("/buildings/{building_id}", axum::routing::get(get_building))
        .route(
            "/buildings/{building_id}/rates",
            axum::routing::put(update_building_rates),
        )
        .route(
            "/buildings/{building_id}/owners",
            axum::routing::post(assign_owner),
        )
        .route(
            "/buildings/{building_id}/owners/{user_id}",
            axum::routing::delete(remove_owner),
        )
        .route("/me/buildings", axum::routing::get(my_buildings))
}

async fn list_buildings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, Capability::ViewProperties)?;
    let buildings = state.properties.list_buildings().await?;
    Ok(Json(json!({ "data": buildings })))
}

async fn create_building(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateBuildingInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_capability(&state, &headers, Capability::ManageProperties)?;
    validate_input(&payload)?;

    let building = state
        .properties
        .create_building(
            NewBuilding {
                name: payload.name.trim().to_string(),
                landlord_name: payload.landlord_name,
                electricity_unit_price: payload.electricity_unit_price,
                water_unit_price: payload.water_unit_price,
                hot_water_unit_price: payload.hot_water_unit_price,
                created_by: Some(user.id.clone()),
            },
            &user.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(building)))
}

async fn get_building(
    State(state): State<AppState>,
    Path(path): Path<BuildingPath>,
    headers: HeaderMap,
) -> AppResult<Json<Building>> {
    require_capability(&state, &headers, Capability::ViewProperties)?;
    Ok(Json(state.properties.get_building(path.building_id).await?))
}

async fn update_building_rates(
    State(state): State<AppState>,
    Path(path): Path<BuildingPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateBuildingRatesInput>,
) -> AppResult<Json<Building>> {
    let user = require_capability(&state, &headers, Capability::ManageProperties)?;
    validate_input(&payload)?;

    let building = state
        .properties
        .update_building_rates(
            path.building_id,
            BuildingRates::from(payload),
            &user.building_scope(),
        )
        .await?;
    Ok(Json(building))
}

async fn assign_owner(
    State(state): State<AppState>,
    Path(path): Path<BuildingPath>,
    headers: HeaderMap,
    Json(payload): Json<BuildingOwnerInput>,
) -> AppResult<impl IntoResponse> {
    require_capability(&state, &headers, Capability::ManageAllProperties)?;
    validate_input(&payload)?;
    let user_id = payload.user_id.trim().to_string();
    state
        .properties
        .assign_owner(path.building_id, &user_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "building_id": path.building_id, "user_id": user_id })),
    ))
}

async fn remove_owner(
    State(state): State<AppState>,
    Path(path): Path<BuildingOwnerPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, Capability::ManageAllProperties)?;
    state
        .properties
        .remove_owner(path.building_id, &path.user_id)
        .await?;
    Ok(Json(json!({
        "building_id": path.building_id,
        "user_id": path.user_id,
        "deleted": true,
    })))
}

async fn my_buildings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_capability(&state, &headers, Capability::ViewProperties)?;
    let buildings = state.properties.owned_buildings(&user.id).await?;
    Ok(Json(json!({ "data": buildings })))
}
