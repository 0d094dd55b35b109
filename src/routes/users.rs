// src/routes/users.rs

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::query_as;
use uuid::Uuid;

use super::{parse_id, parse_ids, require_text, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::Actor;
use crate::error::ApiError;
use crate::models::{SupportAgentStatus, User, UserRole};
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserBody {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub is_chain_admin: bool,
    pub support_agent_status: Option<SupportAgentStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchUserBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_chain_admin: Option<bool>,
    pub support_agent_status: Option<SupportAgentStatus>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub support_agent_status: Option<SupportAgentStatus>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const USER_FILTER: &str = r#"
    WHERE ($1 OR (is_active AND NOT is_deleted))
      AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%')
      AND ($3::user_role IS NULL OR role = $3)
      AND ($4::support_agent_status IS NULL OR support_agent_status = $4)
      AND ($5::bool IS NULL OR is_active = $5)
      AND ($6::bool IS NULL OR is_deleted = $6)
"#;

/// Admins manage hotel staff; only superAdmin creates admins.
fn ensure_may_grant(actor: &Actor, role: UserRole) -> Result<(), ApiError> {
    if actor.is_super_admin() || matches!(role, UserRole::Manager | UserRole::SupportAgent) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Only superAdmin can grant the {role} role")))
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateUserBody>,
) -> Reply<User> {
    actor.require_admin()?;
    require_text(&b.name, "name")?;
    require_text(&b.email, "email")?;
    ensure_may_grant(&actor, b.role)?;

    let agent_status = match b.role {
        UserRole::SupportAgent => Some(b.support_agent_status.unwrap_or(SupportAgentStatus::Available)),
        _ if b.support_agent_status.is_some() => {
            return Err(ApiError::validation("supportAgentStatus applies to support agents only"))
        }
        _ => None,
    };

    let row = query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, email, phone, role, support_agent_status, agent_status_changed_at, is_chain_admin)
        VALUES ($1,$2,$3,$4,$5,$6, CASE WHEN $6::support_agent_status IS NULL THEN NULL ELSE NOW() END, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(b.name.trim())
    .bind(b.email.trim().to_lowercase())
    .bind(b.phone)
    .bind(b.role)
    .bind(agent_status)
    .bind(b.is_chain_admin && b.role == UserRole::Admin)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(Envelope::ok(row).message("User created successfully")))
}

pub async fn get_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<User> {
    let id = parse_id(&id, "user")?;
    actor.require_staff()?;
    let row = query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let row = Visibility::for_actor(&actor).visible(row, "User")?;
    Ok(Json(Envelope::ok(row)))
}

pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListUsersQ>,
) -> Reply<Vec<User>> {
    actor.require_admin()?;
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let count_sql = format!("SELECT COUNT(*) FROM users {USER_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(q.role)
        .bind(q.support_agent_status)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_one(&state.pool)
        .await?;

    let list_sql = format!("SELECT * FROM users {USER_FILTER} ORDER BY created_at DESC LIMIT $7 OFFSET $8");
    let rows = query_as::<_, User>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(q.role)
        .bind(q.support_agent_status)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows)
            .paginated(page.summarize(total))
            .filters(json!({ "search": search, "role": q.role, "supportAgentStatus": q.support_agent_status })),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchUserBody>,
) -> Reply<User> {
    let id = parse_id(&id, "user")?;
    let is_self = actor.id == id;
    if !is_self {
        actor.require_admin()?;
    }
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if let Some(role) = b.role {
        actor.require_admin()?;
        ensure_may_grant(&actor, role)?;
    }
    if (b.is_chain_admin.is_some() || b.is_active.is_some()) && !actor.is_super_admin() && is_self {
        return Err(ApiError::Forbidden("You cannot change your own account flags".into()));
    }

    let mut tx = state.pool.begin().await?;
    let current = query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let current = Visibility::for_actor(&actor).visible(current, "User")?;

    let role = b.role.unwrap_or(current.role);
    if b.support_agent_status.is_some() && role != UserRole::SupportAgent {
        return Err(ApiError::validation("supportAgentStatus applies to support agents only"));
    }
    // Agents leaving the role drop their status; new agents start available.
    let (agent_status, clear_status) = match (current.role, role) {
        (UserRole::SupportAgent, UserRole::SupportAgent) => (b.support_agent_status, false),
        (_, UserRole::SupportAgent) => (Some(b.support_agent_status.unwrap_or(SupportAgentStatus::Available)), false),
        (UserRole::SupportAgent, _) => (None, true),
        _ => (None, false),
    };

    let row = query_as::<_, User>(
        r#"
        UPDATE users SET
          name                    = COALESCE($2, name),
          email                   = COALESCE($3, email),
          phone                   = COALESCE($4, phone),
          role                    = COALESCE($5, role),
          support_agent_status    = CASE WHEN $10 THEN NULL ELSE COALESCE($6, support_agent_status) END,
          agent_status_changed_at = CASE WHEN $10 THEN NULL
                                         WHEN $6::support_agent_status IS NOT NULL THEN NOW()
                                         ELSE agent_status_changed_at END,
          is_chain_admin          = COALESCE($7, is_chain_admin),
          is_active               = COALESCE($8, is_active),
          is_deleted              = COALESCE($9, is_deleted),
          updated_at              = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name)
    .bind(b.email.map(|e| e.trim().to_lowercase()))
    .bind(b.phone)
    .bind(b.role)
    .bind(agent_status)
    .bind(b.is_chain_admin)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .bind(clear_status)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(Envelope::ok(row).message("User updated successfully")))
}

pub async fn delete_users(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "user")?;
    if ids.contains(&actor.id) {
        return Err(ApiError::validation("You cannot delete your own account"));
    }
    let res = sqlx::query(r#"DELETE FROM users WHERE id = ANY($1)"#)
        .bind(&ids)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("No users found with the provided IDs".into()));
    }
    Ok(Json(
        Envelope::ok(json!({ "deletedCount": res.rows_affected() }))
            .message(format!("{} user(s) deleted successfully", res.rows_affected())),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn actor(role: Role) -> Actor {
        Actor { id: Uuid::new_v4(), role, is_chain_admin: false, hotel_ids: vec![] }
    }

    #[test]
    fn admins_grant_only_staff_roles() {
        let admin = actor(Role::Admin);
        assert!(ensure_may_grant(&admin, UserRole::Manager).is_ok());
        assert!(ensure_may_grant(&admin, UserRole::SupportAgent).is_ok());
        assert!(ensure_may_grant(&admin, UserRole::Admin).is_err());
        assert!(ensure_may_grant(&admin, UserRole::SuperAdmin).is_err());
        assert!(ensure_may_grant(&actor(Role::SuperAdmin), UserRole::Admin).is_ok());
    }
}
