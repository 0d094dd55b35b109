// src/routes/sub_rooms.rs

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::query_as;
use uuid::Uuid;

use super::{parse_id, parse_id_filter, parse_ids, require_text, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::Actor;
use crate::domain::catalog::{self, SubRoomView, WindowInput};
use crate::domain::pricing;
use crate::error::ApiError;
use crate::models::{MasterRoom, SubRoom};
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubRoomBody {
    pub hotel_id: Uuid,
    pub master_room_id: Uuid,
    #[serde(alias = "subRoomName")]
    pub name: String,
    pub slot_duration: i32,
    #[serde(default)]
    pub default_slots: Vec<WindowInput>,
    pub is_available: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSubRoomBody {
    #[serde(alias = "subRoomName")]
    pub name: Option<String>,
    pub slot_duration: Option<i32>,
    pub default_slots: Option<Vec<WindowInput>>,
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSubRoomsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub hotel_id: Option<String>,
    pub master_room_id: Option<String>,
    pub slot_duration: Option<i32>,
    pub is_available: Option<bool>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const SUB_ROOM_FILTER: &str = r#"
    WHERE ($1 OR (is_active AND NOT is_deleted))
      AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
      AND ($3::uuid[] IS NULL OR hotel_id = ANY($3))
      AND ($4::uuid[] IS NULL OR master_room_id = ANY($4))
      AND ($5::int4 IS NULL OR slot_duration = $5)
      AND ($6::bool IS NULL OR is_available = $6)
      AND ($7::bool IS NULL OR is_active = $7)
      AND ($8::bool IS NULL OR is_deleted = $8)
"#;

pub async fn create_sub_room(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateSubRoomBody>,
) -> Reply<SubRoomView> {
    actor.require_hotel_staff(b.hotel_id)?;
    require_text(&b.name, "subRoomName")?;
    catalog::ensure_duration(b.slot_duration)?;
    catalog::validate_windows(&b.default_slots)?;

    let vis = Visibility::for_actor(&actor);
    let master = query_as::<_, MasterRoom>(r#"SELECT * FROM master_rooms WHERE id = $1"#)
        .bind(b.master_room_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Master room"))?;
    let master = vis.visible(master, "Master room")?;
    if master.hotel_id != b.hotel_id {
        return Err(ApiError::validation("Master room does not belong to this hotel"));
    }

    let mut tx = state.pool.begin().await?;
    let sub = query_as::<_, SubRoom>(
        r#"
        INSERT INTO sub_rooms (id, hotel_id, master_room_id, name, slot_duration, is_available)
        VALUES ($1,$2,$3,$4,$5, COALESCE($6, TRUE))
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(b.hotel_id)
    .bind(master.id)
    .bind(b.name.trim())
    .bind(b.slot_duration)
    .bind(b.is_available)
    .fetch_one(&mut *tx)
    .await?;

    let price = pricing::slot_price(master.full_day_price, sub.slot_duration);
    let default_slots = catalog::insert_windows(&mut *tx, sub.id, None, &b.default_slots, price).await?;
    tx.commit().await?;

    Ok(Json(
        Envelope::ok(SubRoomView { sub_room: sub, default_slots }).message("Sub room created successfully"),
    ))
}

pub async fn get_sub_room(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<SubRoomView> {
    let id = parse_id(&id, "sub room")?;
    let sub = query_as::<_, SubRoom>(r#"SELECT * FROM sub_rooms WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Sub room"))?;
    let sub = Visibility::for_actor(&actor).visible(sub, "Sub room")?;
    let view = catalog::sub_room_views(&state.pool, vec![sub])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Sub room"))?;
    Ok(Json(Envelope::ok(view)))
}

pub async fn list_sub_rooms(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListSubRoomsQ>,
) -> Reply<Vec<SubRoomView>> {
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let hotel_ids = parse_id_filter(q.hotel_id.as_deref(), "hotel")?;
    let master_ids = parse_id_filter(q.master_room_id.as_deref(), "master room")?;
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let count_sql = format!("SELECT COUNT(*) FROM sub_rooms {SUB_ROOM_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&hotel_ids)
        .bind(&master_ids)
        .bind(q.slot_duration)
        .bind(q.is_available)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_one(&state.pool)
        .await?;

    let list_sql =
        format!("SELECT * FROM sub_rooms {SUB_ROOM_FILTER} ORDER BY created_at DESC LIMIT $9 OFFSET $10");
    let rows = query_as::<_, SubRoom>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&hotel_ids)
        .bind(&master_ids)
        .bind(q.slot_duration)
        .bind(q.is_available)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    let views = catalog::sub_room_views(&state.pool, rows).await?;
    Ok(Json(
        Envelope::ok(views).paginated(page.summarize(total)).filters(json!({
            "search": search,
            "hotelId": hotel_ids,
            "masterRoomId": master_ids,
            "slotDuration": q.slot_duration,
            "isAvailable": q.is_available,
        })),
    ))
}

pub async fn update_sub_room(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchSubRoomBody>,
) -> Reply<SubRoomView> {
    let id = parse_id(&id, "sub room")?;
    actor.require_manager()?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if let Some(name) = &b.name {
        require_text(name, "subRoomName")?;
    }
    if let Some(duration) = b.slot_duration {
        catalog::ensure_duration(duration)?;
    }
    if let Some(windows) = &b.default_slots {
        catalog::validate_windows(windows)?;
    }

    let mut tx = state.pool.begin().await?;
    let current = query_as::<_, SubRoom>(r#"SELECT * FROM sub_rooms WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Sub room"))?;
    let current = Visibility::for_actor(&actor).visible(current, "Sub room")?;
    actor.require_hotel_staff(current.hotel_id)?;

    let sub = query_as::<_, SubRoom>(
        r#"
        UPDATE sub_rooms SET
          name          = COALESCE($2, name),
          slot_duration = COALESCE($3, slot_duration),
          is_available  = COALESCE($4, is_available),
          is_active     = COALESCE($5, is_active),
          is_deleted    = COALESCE($6, is_deleted),
          updated_at    = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name.as_deref().map(str::trim))
    .bind(b.slot_duration)
    .bind(b.is_available)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&mut *tx)
    .await?;

    let price = catalog::sub_room_price(&mut *tx, id).await?;
    if b.slot_duration.is_some() {
        catalog::reprice_sub_room(&mut *tx, id, price).await?;
    }
    if let Some(windows) = &b.default_slots {
        catalog::replace_windows(&mut *tx, id, None, windows, price).await?;
    }
    let default_slots = catalog::default_windows(&mut *tx, &[id]).await?.remove(&id).unwrap_or_default();
    tx.commit().await?;

    Ok(Json(
        Envelope::ok(SubRoomView { sub_room: sub, default_slots }).message("Sub room updated successfully"),
    ))
}

pub async fn delete_sub_rooms(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "sub room")?;
    let res = sqlx::query(r#"DELETE FROM sub_rooms WHERE id = ANY($1)"#)
        .bind(&ids)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("No sub rooms found with the provided IDs".into()));
    }
    Ok(Json(
        Envelope::ok(json!({ "deletedCount": res.rows_affected() }))
            .message(format!("{} sub room(s) deleted successfully", res.rows_affected())),
    ))
}
