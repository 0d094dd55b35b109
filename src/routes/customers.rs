// src/routes/customers.rs

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::query_as;
use uuid::Uuid;

use super::{parse_id, parse_ids, require_text, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::Actor;
use crate::error::ApiError;
use crate::models::Customer;
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerBody {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchCustomerBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCustomersQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const CUSTOMER_FILTER: &str = r#"
    WHERE ($1 OR (is_active AND NOT is_deleted))
      AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%' OR phone ILIKE '%' || $2 || '%')
      AND ($3::bool IS NULL OR is_active = $3)
      AND ($4::bool IS NULL OR is_deleted = $4)
"#;

/// Public sign-up. Credentials live with the identity provider.
pub async fn create_customer(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<CreateCustomerBody>,
) -> Reply<Customer> {
    require_text(&b.name, "name")?;
    require_text(&b.email, "email")?;
    if !b.email.contains('@') {
        return Err(ApiError::validation("Please provide a valid email"));
    }

    let row = query_as::<_, Customer>(
        r#"
        INSERT INTO customers (id, name, email, phone)
        VALUES ($1,$2,$3,$4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(b.name.trim())
    .bind(b.email.trim().to_lowercase())
    .bind(b.phone.map(|p| p.trim().to_string()))
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(Envelope::ok(row).message("Customer created successfully")))
}

pub async fn get_customer(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<Customer> {
    let id = parse_id(&id, "customer")?;
    actor.require_self_or_staff(id)?;
    let row = query_as::<_, Customer>(r#"SELECT * FROM customers WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer"))?;
    let row = Visibility::for_actor(&actor).visible(row, "Customer")?;
    Ok(Json(Envelope::ok(row)))
}

pub async fn list_customers(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListCustomersQ>,
) -> Reply<Vec<Customer>> {
    actor.require_manager()?;
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let count_sql = format!("SELECT COUNT(*) FROM customers {CUSTOMER_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_one(&state.pool)
        .await?;

    let list_sql =
        format!("SELECT * FROM customers {CUSTOMER_FILTER} ORDER BY created_at DESC LIMIT $5 OFFSET $6");
    let rows = query_as::<_, Customer>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows).paginated(page.summarize(total)).filters(json!({ "search": search })),
    ))
}

pub async fn update_customer(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchCustomerBody>,
) -> Reply<Customer> {
    let id = parse_id(&id, "customer")?;
    actor.require_self_or_staff(id)?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if b.is_active.is_some() && !actor.is_staff() {
        return Err(ApiError::Forbidden("You cannot change your own account flags".into()));
    }

    let current = query_as::<_, Customer>(r#"SELECT * FROM customers WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer"))?;
    Visibility::for_actor(&actor).visible(current, "Customer")?;

    let row = query_as::<_, Customer>(
        r#"
        UPDATE customers SET
          name       = COALESCE($2, name),
          email      = COALESCE($3, email),
          phone      = COALESCE($4, phone),
          is_active  = COALESCE($5, is_active),
          is_deleted = COALESCE($6, is_deleted),
          updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name)
    .bind(b.email.map(|e| e.trim().to_lowercase()))
    .bind(b.phone)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(Envelope::ok(row).message("Customer updated successfully")))
}

pub async fn delete_customers(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "customer")?;
    let res = sqlx::query(r#"DELETE FROM customers WHERE id = ANY($1)"#)
        .bind(&ids)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("No customers found with the provided IDs".into()));
    }
    Ok(Json(
        Envelope::ok(json!({ "deletedCount": res.rows_affected() }))
            .message(format!("{} customer(s) deleted successfully", res.rows_affected())),
    ))
}
