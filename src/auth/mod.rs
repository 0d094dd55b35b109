// src/auth/mod.rs
//
// Bearer-token verification. Tokens are issued elsewhere; this service only
// checks them and loads the account behind the subject.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Method},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::query_as;
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{Party, UserRole};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    SupportAgent,
    Customer,
    Guest,
}

impl Role {
    pub fn staff(&self) -> Option<UserRole> {
        match self {
            Self::SuperAdmin => Some(UserRole::SuperAdmin),
            Self::Admin => Some(UserRole::Admin),
            Self::Manager => Some(UserRole::Manager),
            Self::SupportAgent => Some(UserRole::SupportAgent),
            Self::Customer | Self::Guest => None,
        }
    }
}

impl From<UserRole> for Role {
    fn from(r: UserRole) -> Self {
        match r {
            UserRole::SuperAdmin => Self::SuperAdmin,
            UserRole::Admin => Self::Admin,
            UserRole::Manager => Self::Manager,
            UserRole::SupportAgent => Self::SupportAgent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
        }
    }

    /// Mint a token. Used by tooling and tests; the API never issues tokens.
    pub fn issue(&self, sub: Uuid, role: Role, ttl_secs: i64) -> ApiResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims { sub, role, iat: now, exp: now + ttl_secs, iss: self.issuer.clone() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Unexpected(e.into()))
    }

    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "rejected bearer token");
                ApiError::Unauthorized("Invalid or expired token".into())
            })
    }
}

/// Read-only catalog paths open to guest tokens.
const GUEST_PATHS: &[&str] = &[
    "/api/v1/hotel/get",
    "/api/v1/masterRoom/get",
    "/api/v1/subRoom/get",
    "/api/v1/slot/get",
    "/api/v1/review/get",
];

pub fn guest_allowed(method: &Method, path: &str) -> bool {
    method == Method::GET && GUEST_PATHS.iter().any(|p| path.starts_with(p))
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub is_chain_admin: bool,
    pub hotel_ids: Vec<Uuid>,
}

impl Actor {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn is_staff(&self) -> bool {
        self.role.staff().is_some()
    }

    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }

    pub fn party(&self) -> Party {
        match self.role {
            Role::Customer => Party::customer(self.id),
            _ => Party::user(self.id),
        }
    }

    fn require(&self, ok: bool) -> ApiResult<()> {
        if ok {
            Ok(())
        } else {
            Err(ApiError::Forbidden("You are not allowed to perform this action".into()))
        }
    }

    pub fn require_super_admin(&self) -> ApiResult<()> {
        self.require(self.is_super_admin())
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        self.require(matches!(self.role, Role::SuperAdmin | Role::Admin))
    }

    pub fn require_manager(&self) -> ApiResult<()> {
        self.require(matches!(self.role, Role::SuperAdmin | Role::Admin | Role::Manager))
    }

    pub fn require_support(&self) -> ApiResult<()> {
        self.require(matches!(self.role, Role::SuperAdmin | Role::SupportAgent))
    }

    pub fn require_staff(&self) -> ApiResult<()> {
        self.require(self.is_staff())
    }

    /// Customers act only on their own records; staff on any.
    pub fn require_self_or_staff(&self, customer_id: Uuid) -> ApiResult<()> {
        self.require(self.is_staff() || self.id == customer_id)
    }

    pub fn manages_hotel(&self, hotel_id: Uuid) -> bool {
        self.is_super_admin() || self.hotel_ids.contains(&hotel_id)
    }

    /// Manager or above, acting on one of their own hotels.
    pub fn require_hotel_staff(&self, hotel_id: Uuid) -> ApiResult<()> {
        self.require_manager()?;
        self.require(self.manages_hotel(hotel_id))
    }
}

fn bearer(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }
    // Browsers cannot set headers on a WebSocket handshake.
    if parts.uri.path().ends_with("/notification/stream") {
        return parts.uri.query().and_then(|q| {
            q.split('&')
                .filter_map(|kv| kv.split_once('='))
                .find(|(k, _)| *k == "token")
                .map(|(_, v)| v.to_string())
        });
    }
    None
}

#[derive(sqlx::FromRow)]
struct StaffAccount {
    role: UserRole,
    is_chain_admin: bool,
    hotel_ids: Vec<Uuid>,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;
        let claims = state.jwt.verify(&token)?;

        match claims.role {
            Role::Guest => {
                if !guest_allowed(&parts.method, parts.uri.path()) {
                    return Err(ApiError::Unauthorized("Please sign in to continue".into()));
                }
                Ok(Actor { id: claims.sub, role: Role::Guest, is_chain_admin: false, hotel_ids: vec![] })
            }
            Role::Customer => {
                let active: Option<bool> = sqlx::query_scalar(
                    r#"SELECT is_active AND NOT is_deleted FROM customers WHERE id = $1"#,
                )
                .bind(claims.sub)
                .fetch_optional(&state.pool)
                .await?;
                if active != Some(true) {
                    return Err(ApiError::Unauthorized("Account not found or inactive".into()));
                }
                Ok(Actor { id: claims.sub, role: Role::Customer, is_chain_admin: false, hotel_ids: vec![] })
            }
            staff => {
                let account = query_as::<_, StaffAccount>(
                    r#"
                    SELECT role, is_chain_admin, hotel_ids FROM users
                    WHERE id = $1 AND is_active AND NOT is_deleted
                    "#,
                )
                .bind(claims.sub)
                .fetch_optional(&state.pool)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("Account not found or inactive".into()))?;

                if Role::from(account.role) != staff {
                    return Err(ApiError::Unauthorized("Token role does not match account".into()));
                }
                Ok(Actor {
                    id: claims.sub,
                    role: staff,
                    is_chain_admin: account.is_chain_admin,
                    hotel_ids: account.hotel_ids,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig { secret: "test-secret".into(), issuer: "hotel-booking-api".into() })
    }

    fn actor(role: Role) -> Actor {
        Actor { id: Uuid::new_v4(), role, is_chain_admin: false, hotel_ids: vec![] }
    }

    #[test]
    fn token_round_trip() {
        let keys = keys();
        let sub = Uuid::new_v4();
        let token = keys.issue(sub, Role::Manager, 3600).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn rejects_expired_and_foreign_tokens() {
        let keys = keys();
        let expired = keys.issue(Uuid::new_v4(), Role::Admin, -3600).unwrap();
        assert!(matches!(keys.verify(&expired), Err(ApiError::Unauthorized(_))));

        let other = JwtKeys::new(&JwtConfig { secret: "test-secret".into(), issuer: "someone-else".into() });
        let token = other.issue(Uuid::new_v4(), Role::Admin, 3600).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn guest_whitelist() {
        assert!(guest_allowed(&Method::GET, "/api/v1/hotel/getAll"));
        assert!(guest_allowed(&Method::GET, "/api/v1/subRoom/get/8d1f"));
        assert!(!guest_allowed(&Method::POST, "/api/v1/hotel/create"));
        assert!(!guest_allowed(&Method::GET, "/api/v1/booking/getAll"));
    }

    #[test]
    fn role_guards() {
        assert!(actor(Role::SuperAdmin).require_admin().is_ok());
        assert!(actor(Role::Admin).require_manager().is_ok());
        assert!(actor(Role::Manager).require_admin().is_err());
        assert!(actor(Role::SupportAgent).require_support().is_ok());
        assert!(actor(Role::Manager).require_support().is_err());
        assert!(actor(Role::Customer).require_staff().is_err());
        assert!(actor(Role::Admin).require_super_admin().is_err());
    }

    #[test]
    fn hotel_staff_stay_inside_their_hotels() {
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let manager = Actor { hotel_ids: vec![mine], ..actor(Role::Manager) };
        assert!(manager.require_hotel_staff(mine).is_ok());
        assert!(matches!(manager.require_hotel_staff(other), Err(ApiError::Forbidden(_))));

        let admin = Actor { hotel_ids: vec![mine], ..actor(Role::Admin) };
        assert!(admin.require_hotel_staff(other).is_err());

        let agent = Actor { hotel_ids: vec![mine], ..actor(Role::SupportAgent) };
        assert!(agent.require_hotel_staff(mine).is_err());

        assert!(actor(Role::SuperAdmin).require_hotel_staff(other).is_ok());
    }

    #[test]
    fn customers_only_touch_their_own_records() {
        let me = actor(Role::Customer);
        assert!(me.require_self_or_staff(me.id).is_ok());
        assert!(me.require_self_or_staff(Uuid::new_v4()).is_err());
        assert!(actor(Role::Manager).require_self_or_staff(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn reads_ws_token_from_query() {
        let req = axum::http::Request::builder()
            .uri("/api/v1/notification/stream?token=abc.def")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(bearer(&parts).as_deref(), Some("abc.def"));

        let req = axum::http::Request::builder().uri("/api/v1/hotel/getAll?token=abc").body(()).unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(bearer(&parts), None);
    }
}
