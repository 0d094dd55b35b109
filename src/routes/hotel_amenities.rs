// src/routes/hotel_amenities.rs

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::{query, query_as};
use tracing::info;
use uuid::Uuid;

use super::{parse_id, parse_ids, require_text, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::Actor;
use crate::error::ApiError;
use crate::models::HotelAmenity;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAmenityBody {
    pub name: String,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchAmenityBody {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAmenitiesQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

const AMENITY_FILTER: &str = r#"
    WHERE ($1 OR is_active)
      AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
      AND ($3::bool IS NULL OR is_active = $3)
"#;

pub async fn create_amenity(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateAmenityBody>,
) -> Reply<HotelAmenity> {
    actor.require_super_admin()?;
    require_text(&b.name, "name")?;

    let amenity = query_as::<_, HotelAmenity>(
        r#"
        INSERT INTO hotel_amenities (id, name, is_active)
        VALUES ($1, $2, COALESCE($3, TRUE))
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(b.name.trim())
    .bind(b.is_active)
    .fetch_one(&state.pool)
    .await?;

    info!(amenity_id = %amenity.id, "hotel amenity created");
    Ok(Json(Envelope::ok(amenity).message("Hotel amenity created successfully")))
}

pub async fn get_amenity(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<HotelAmenity> {
    actor.require_super_admin()?;
    let id = parse_id(&id, "hotel amenity")?;
    let amenity = query_as::<_, HotelAmenity>(r#"SELECT * FROM hotel_amenities WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Hotel amenity"))?;
    Ok(Json(Envelope::ok(amenity)))
}

/// Open to every signed-in caller; only superAdmin sees inactive amenities.
pub async fn list_amenities(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListAmenitiesQ>,
) -> Reply<Vec<HotelAmenity>> {
    let include_inactive = actor.is_super_admin();
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let is_active = if include_inactive { q.is_active } else { None };

    let count_sql = format!("SELECT COUNT(*) FROM hotel_amenities {AMENITY_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(include_inactive)
        .bind(&search)
        .bind(is_active)
        .fetch_one(&state.pool)
        .await?;

    let list_sql = format!("SELECT * FROM hotel_amenities {AMENITY_FILTER} ORDER BY name LIMIT $4 OFFSET $5");
    let rows = query_as::<_, HotelAmenity>(&list_sql)
        .bind(include_inactive)
        .bind(&search)
        .bind(is_active)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows)
            .paginated(page.summarize(total))
            .filters(json!({ "search": search, "isActive": is_active })),
    ))
}

pub async fn update_amenity(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchAmenityBody>,
) -> Reply<HotelAmenity> {
    actor.require_super_admin()?;
    let id = parse_id(&id, "hotel amenity")?;
    if let Some(name) = &b.name {
        require_text(name, "name")?;
    }

    let amenity = query_as::<_, HotelAmenity>(
        r#"
        UPDATE hotel_amenities SET
          name       = COALESCE($2, name),
          is_active  = COALESCE($3, is_active),
          updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name.as_deref().map(str::trim))
    .bind(b.is_active)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Hotel amenity"))?;

    Ok(Json(Envelope::ok(amenity).message("Hotel amenity updated successfully")))
}

/// Deleted amenities are also dropped from every hotel that listed them.
pub async fn delete_amenities(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "hotel amenity")?;

    let mut tx = state.pool.begin().await?;
    let removed: Vec<Uuid> =
        sqlx::query_scalar(r#"DELETE FROM hotel_amenities WHERE id = ANY($1) RETURNING id"#)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;
    if removed.is_empty() {
        return Err(ApiError::NotFound("No hotel amenities found with the provided IDs".into()));
    }
    query(
        r#"
        UPDATE hotels
        SET amenity_ids = ARRAY(SELECT a FROM unnest(amenity_ids) a WHERE a <> ALL($1)), updated_at = NOW()
        WHERE amenity_ids && $1
        "#,
    )
    .bind(&removed)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(
        Envelope::ok(json!({ "deletedCount": removed.len() }))
            .message(format!("{} hotel amenity(s) deleted successfully", removed.len())),
    ))
}

/// Every id must name an existing amenity; duplicates collapse.
pub(crate) async fn checked_amenity_ids(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ids: &[Uuid],
) -> Result<Vec<Uuid>, ApiError> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(ids);
    }
    let found: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM hotel_amenities WHERE id = ANY($1)"#)
        .bind(&ids)
        .fetch_one(&mut **tx)
        .await?;
    if found != ids.len() as i64 {
        return Err(ApiError::validation("amenitiesId must reference existing hotel amenities"));
    }
    Ok(ids)
}
