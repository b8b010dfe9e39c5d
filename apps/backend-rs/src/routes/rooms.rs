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
    models::{NewRoom, Room},
    roles::Capability,
    schemas::{validate_input, CreateRoomInput, RoomPath, RoomsQuery, UpdateRentalStatusInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/rooms", axum::routing::get(list_rooms).post(create_room))
        .route("/rooms/{room_id}", axum::routing::get(get_room))
        .route(
            "/rooms/{room_id}/rental-status",
            axum::routing::put(update_rental_status),
        )
}

async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_capability(&state, &headers, Capability::ViewProperties)?;
    let rooms = state.properties.list_rooms(query.building_id).await?;
    Ok(Json(json!({ "data": rooms })))
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_capability(&state, &headers, Capability::ManageProperties)?;
    validate_input(&payload)?;

    let scope = user.building_scope();
    let room = state
        .properties
        .create_room(
            NewRoom {
                building_id: payload.building_id,
                room_number: payload.room_number.trim().to_string(),
                rent: payload.rent,
                default_deposit: payload.default_deposit,
                electricity_unit_price: payload.electricity_unit_price,
                water_unit_price: payload.water_unit_price,
                hot_water_unit_price: payload.hot_water_unit_price,
                rental_status: payload.rental_status,
                created_by: Some(user.id),
            },
            &scope,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn get_room(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    headers: HeaderMap,
) -> AppResult<Json<Room>> {
    require_capability(&state, &headers, Capability::ViewProperties)?;
    Ok(Json(state.properties.get_room(path.room_id).await?))
}

async fn update_rental_status(
    State(state): State<AppState>,
    Path(path): Path<RoomPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateRentalStatusInput>,
) -> AppResult<Json<Room>> {
    let user = require_capability(&state, &headers, Capability::ManageProperties)?;
    let room = state
        .properties
        .set_rental_status(path.room_id, payload.rental_status, &user.building_scope())
        .await?;
    Ok(Json(room))
}
