use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_user;
use crate::error::AppResult;
use crate::state::AppState;

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers)?;
    let capabilities: Vec<&str> = {
        let mut granted = Vec::new();
        for role in &user.roles {
            for capability in role.grants() {
                if !granted.contains(&capability.as_str()) {
                    granted.push(capability.as_str());
                }
            }
        }
        granted
    };
    Ok(Json(json!({
        "user": { "id": user.id, "roles": user.roles },
        "capabilities": capabilities,
    })))
}
