// src/routes/slots.rs

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::query_as;
use uuid::Uuid;

use super::{parse_id, parse_id_filter, parse_ids, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::Actor;
use crate::domain::catalog::{self, SlotView, WindowInput};
use crate::error::ApiError;
use crate::models::{Slot, SubRoom};
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotBody {
    pub hotel_id: Uuid,
    pub master_room_id: Uuid,
    pub sub_room_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub manual_slots: Vec<WindowInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSlotBody {
    pub date: Option<NaiveDate>,
    pub manual_slots: Option<Vec<WindowInput>>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSlotsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub hotel_id: Option<String>,
    pub master_room_id: Option<String>,
    pub sub_room_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub price_from: Option<f64>,
    pub price_to: Option<f64>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const SLOT_FILTER: &str = r#"
    WHERE ($1 OR (s.is_active AND NOT s.is_deleted))
      AND ($2::uuid[] IS NULL OR s.hotel_id = ANY($2))
      AND ($3::uuid[] IS NULL OR s.master_room_id = ANY($3))
      AND ($4::uuid[] IS NULL OR s.sub_room_id = ANY($4))
      AND ($5::date IS NULL OR s.date = $5)
      AND (($6::float8 IS NULL AND $7::float8 IS NULL) OR EXISTS (
            SELECT 1 FROM slot_windows w
            WHERE w.slot_id = s.id
              AND ($6::float8 IS NULL OR w.price >= $6)
              AND ($7::float8 IS NULL OR w.price <= $7)
          ))
      AND ($8::bool IS NULL OR s.is_active = $8)
      AND ($9::bool IS NULL OR s.is_deleted = $9)
"#;

/// Ad-hoc windows for one sub room on one date, priced like its default windows.
pub async fn create_slot(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateSlotBody>,
) -> Reply<SlotView> {
    actor.require_hotel_staff(b.hotel_id)?;
    if b.manual_slots.is_empty() {
        return Err(ApiError::validation("At least one manual slot is required"));
    }
    catalog::validate_windows(&b.manual_slots)?;

    let sub = query_as::<_, SubRoom>(r#"SELECT * FROM sub_rooms WHERE id = $1"#)
        .bind(b.sub_room_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Sub room"))?;
    let sub = Visibility::for_actor(&actor).visible(sub, "Sub room")?;
    if sub.master_room_id != b.master_room_id || sub.hotel_id != b.hotel_id {
        return Err(ApiError::validation("Sub room does not belong to this master room and hotel"));
    }

    let mut tx = state.pool.begin().await?;
    let slot = query_as::<_, Slot>(
        r#"
        INSERT INTO slots (id, hotel_id, master_room_id, sub_room_id, date)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(sub.hotel_id)
    .bind(sub.master_room_id)
    .bind(sub.id)
    .bind(b.date)
    .fetch_one(&mut *tx)
    .await?;

    let price = catalog::sub_room_price(&mut *tx, sub.id).await?;
    let manual_slots = catalog::insert_windows(&mut *tx, sub.id, Some(slot.id), &b.manual_slots, price).await?;
    tx.commit().await?;

    Ok(Json(Envelope::ok(SlotView { slot, manual_slots }).message("Slot created successfully")))
}

pub async fn get_slot(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<SlotView> {
    let id = parse_id(&id, "slot")?;
    let slot = query_as::<_, Slot>(r#"SELECT * FROM slots WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Slot"))?;
    let slot = Visibility::for_actor(&actor).visible(slot, "Slot")?;
    let view = catalog::slot_views(&state.pool, vec![slot])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Slot"))?;
    Ok(Json(Envelope::ok(view)))
}

pub async fn list_slots(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListSlotsQ>,
) -> Reply<Vec<SlotView>> {
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let hotel_ids = parse_id_filter(q.hotel_id.as_deref(), "hotel")?;
    let master_ids = parse_id_filter(q.master_room_id.as_deref(), "master room")?;
    let sub_ids = parse_id_filter(q.sub_room_id.as_deref(), "sub room")?;
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let count_sql = format!("SELECT COUNT(*) FROM slots s {SLOT_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&hotel_ids)
        .bind(&master_ids)
        .bind(&sub_ids)
        .bind(q.date)
        .bind(q.price_from)
        .bind(q.price_to)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_one(&state.pool)
        .await?;

    let list_sql = format!(
        "SELECT s.* FROM slots s {SLOT_FILTER} ORDER BY s.date ASC, s.created_at DESC LIMIT $10 OFFSET $11"
    );
    let rows = query_as::<_, Slot>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&hotel_ids)
        .bind(&master_ids)
        .bind(&sub_ids)
        .bind(q.date)
        .bind(q.price_from)
        .bind(q.price_to)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    let views = catalog::slot_views(&state.pool, rows).await?;
    Ok(Json(
        Envelope::ok(views).paginated(page.summarize(total)).filters(json!({
            "hotelId": hotel_ids,
            "masterRoomId": master_ids,
            "subRoomId": sub_ids,
            "date": q.date,
            "priceFrom": q.price_from,
            "priceTo": q.price_to,
        })),
    ))
}

pub async fn update_slot(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchSlotBody>,
) -> Reply<SlotView> {
    let id = parse_id(&id, "slot")?;
    actor.require_manager()?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if let Some(windows) = &b.manual_slots {
        if windows.is_empty() {
            return Err(ApiError::validation("At least one manual slot is required"));
        }
        catalog::validate_windows(windows)?;
    }

    let mut tx = state.pool.begin().await?;
    let current = query_as::<_, Slot>(r#"SELECT * FROM slots WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Slot"))?;
    let current = Visibility::for_actor(&actor).visible(current, "Slot")?;
    actor.require_hotel_staff(current.hotel_id)?;

    let slot = query_as::<_, Slot>(
        r#"
        UPDATE slots SET
          date       = COALESCE($2, date),
          is_active  = COALESCE($3, is_active),
          is_deleted = COALESCE($4, is_deleted),
          updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.date)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&mut *tx)
    .await?;

    // Manual windows always follow the current sub room price.
    let price = catalog::sub_room_price(&mut *tx, current.sub_room_id).await?;
    let manual_slots = match &b.manual_slots {
        Some(windows) => catalog::replace_windows(&mut *tx, current.sub_room_id, Some(id), windows, price).await?,
        None => {
            sqlx::query(r#"UPDATE slot_windows SET price = $2 WHERE slot_id = $1"#)
                .bind(id)
                .bind(price)
                .execute(&mut *tx)
                .await?;
            catalog::manual_windows(&mut *tx, &[id]).await?.remove(&id).unwrap_or_default()
        }
    };
    tx.commit().await?;

    Ok(Json(Envelope::ok(SlotView { slot, manual_slots }).message("Slot updated successfully")))
}

pub async fn delete_slots(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "slot")?;
    let res = sqlx::query(r#"DELETE FROM slots WHERE id = ANY($1)"#)
        .bind(&ids)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("No slots found with the provided IDs".into()));
    }
    Ok(Json(
        Envelope::ok(json!({ "deletedCount": res.rows_affected() }))
            .message(format!("{} slot(s) deleted successfully", res.rows_affected())),
    ))
}
