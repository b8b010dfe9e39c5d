use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::roles::{has_capability, parse_roles, Capability, Role};
use crate::services::properties::BuildingScope;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if has_capability(&self.roles, capability) {
            return Ok(());
        }
        Err(AppError::Forbidden(format!(
            "Forbidden: missing capability '{}'.",
            capability.as_str()
        )))
    }

    /// Buildings this user may change: all of them for admins, otherwise the
    /// ones they own.
    pub fn building_scope(&self) -> BuildingScope {
        if has_capability(&self.roles, Capability::ManageAllProperties) {
            BuildingScope::All
        } else {
            BuildingScope::Owned(self.id.clone())
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Resolves the caller from a bearer token, or from `x-user-id` /
/// `x-user-roles` when dev overrides are enabled outside production.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> AppResult<AuthUser> {
    if let Some(token) = bearer_token(headers) {
        return decode_token(state, &token);
    }

    if state.config.auth_dev_overrides_enabled() {
        if let Some(user_id) = header_value(headers, "x-user-id") {
            let roles = header_value(headers, "x-user-roles").unwrap_or_default();
            return Ok(AuthUser {
                id: user_id,
                roles: parse_roles(roles.split(',')),
            });
        }
    }

    Err(AppError::Unauthorized(
        "Unauthorized: missing bearer token.".to_string(),
    ))
}

/// Shorthand for the common handler prologue: authenticate, then check one
/// capability.
pub fn require_capability(
    state: &AppState,
    headers: &HeaderMap,
    capability: Capability,
) -> AppResult<AuthUser> {
    let user = require_user(state, headers)?;
    user.require(capability)?;
    Ok(user)
}

fn decode_token(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let Some(secret) = state.config.jwt_secret.as_deref() else {
        return Err(AppError::Unauthorized(
            "Unauthorized: token authentication is not configured.".to_string(),
        ));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(issuer) = state.config.jwt_issuer.as_deref() {
        validation.set_issuer(&[issuer]);
    }

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|error| {
            tracing::debug!(error = %error, "Rejected bearer token");
            AppError::Unauthorized("Unauthorized: invalid or expired token.".to_string())
        })?;

    let claims = data.claims;
    if claims.sub.trim().is_empty() {
        return Err(AppError::Unauthorized(
            "Unauthorized: token has no subject.".to_string(),
        ));
    }
    Ok(AuthUser {
        id: claims.sub,
        roles: parse_roles(claims.roles.iter().map(String::as_str)),
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = header_value(headers, "authorization")?;
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
pub(crate) fn token_for(secret: &str, sub: &str, roles: &[&str]) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: sub.to_string(),
        roles: roles.iter().map(|role| role.to_string()).collect(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iss: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode token")
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{require_capability, require_user, token_for, AuthUser};
    use crate::error::AppError;
    use crate::roles::{Capability, Role};
    use crate::services::properties::BuildingScope;
    use crate::state::AppState;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).expect("header"));
        }
        map
    }

    #[test]
    fn accepts_valid_bearer_token() {
        let state = AppState::for_tests();
        let token = token_for("test-secret", "user-7", &["finance", "unknown"]);
        let user = require_user(
            &state,
            &headers(&[("authorization", &format!("Bearer {token}"))]),
        )
        .expect("user");
        assert_eq!(user.id, "user-7");
        assert_eq!(user.roles, vec![Role::Finance]);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let state = AppState::for_tests();
        let token = token_for("not-the-secret", "user-7", &["admin"]);
        let result = require_user(
            &state,
            &headers(&[("authorization", &format!("Bearer {token}"))]),
        );
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn dev_override_headers_resolve_user() {
        let state = AppState::for_tests();
        let user = require_user(
            &state,
            &headers(&[("x-user-id", "dev-1"), ("x-user-roles", "admin, guest")]),
        )
        .expect("user");
        assert_eq!(user.id, "dev-1");
        assert_eq!(user.roles, vec![Role::Admin, Role::Guest]);
    }

    #[test]
    fn missing_credentials_are_unauthorized() {
        let state = AppState::for_tests();
        assert!(matches!(
            require_user(&state, &HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn missing_capability_is_forbidden() {
        let state = AppState::for_tests();
        let result = require_capability(
            &state,
            &headers(&[("x-user-id", "dev-1"), ("x-user-roles", "customer_service")]),
            Capability::ManageBills,
        );
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn only_admins_get_unscoped_building_access() {
        let admin = AuthUser {
            id: "admin-1".to_string(),
            roles: vec![Role::Admin],
        };
        assert_eq!(admin.building_scope(), BuildingScope::All);

        let landlord = AuthUser {
            id: "landlord-1".to_string(),
            roles: vec![Role::ContentManager],
        };
        assert_eq!(
            landlord.building_scope(),
            BuildingScope::Owned("landlord-1".to_string())
        );
    }
}
