use axum::{routing::get, Router};

use crate::state::AppState;

pub mod bills;
pub mod buildings;
pub mod health;
pub mod identity;
pub mod readings;
pub mod rooms;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/me", get(identity::me))
        .merge(buildings::router())
        .merge(rooms::router())
        .merge(readings::router())
        .merge(bills::estimated_router())
        .merge(bills::actual_router())
}

#[cfg(test)]
mod tests;
