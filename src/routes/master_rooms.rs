// src/routes/master_rooms.rs

use std::collections::{HashMap, HashSet};

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::{query_as, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{
    parse_id, parse_id_filter, parse_ids, release_media, require_text, search_term, ApiJson, ApiPath, ApiQuery,
    Envelope, Page, Reply,
};
use crate::auth::Actor;
use crate::domain::catalog::{self, MasterRoomView, WindowInput};
use crate::domain::pricing;
use crate::error::ApiError;
use crate::models::{MasterRoom, SubRoom};
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedSubRoom {
    #[serde(alias = "subRoomName")]
    pub name: String,
    pub slot_duration: i32,
    #[serde(default)]
    pub default_slots: Vec<WindowInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMasterRoomBody {
    pub hotel_id: Uuid,
    #[serde(alias = "masterRoomName")]
    pub name: String,
    pub full_day_price: f64,
    pub description: Option<String>,
    pub capacity: Option<i32>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sub_rooms: Vec<NestedSubRoom>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchMasterRoomBody {
    #[serde(alias = "masterRoomName")]
    pub name: Option<String>,
    pub full_day_price: Option<f64>,
    pub description: Option<String>,
    pub capacity: Option<i32>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMasterRoomsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub hotel_id: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const MASTER_ROOM_FILTER: &str = r#"
    WHERE ($1 OR (is_active AND NOT is_deleted))
      AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
      AND ($3::uuid[] IS NULL OR hotel_id = ANY($3))
      AND ($4::float8 IS NULL OR full_day_price >= $4)
      AND ($5::float8 IS NULL OR full_day_price <= $5)
      AND ($6::bool IS NULL OR is_active = $6)
      AND ($7::bool IS NULL OR is_deleted = $7)
"#;

/// Sub room names must be unique within one request too.
fn check_nested(sub_rooms: &[NestedSubRoom]) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for s in sub_rooms {
        require_text(&s.name, "subRoomName")?;
        catalog::ensure_duration(s.slot_duration)?;
        catalog::validate_windows(&s.default_slots)?;
        if !seen.insert(s.name.trim().to_lowercase()) {
            return Err(ApiError::Conflict(format!("Duplicate sub room name '{}'", s.name.trim())));
        }
    }
    Ok(())
}

pub async fn create_master_room(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateMasterRoomBody>,
) -> Reply<MasterRoomView> {
    actor.require_hotel_staff(b.hotel_id)?;
    require_text(&b.name, "masterRoomName")?;
    catalog::ensure_price(b.full_day_price)?;
    check_nested(&b.sub_rooms)?;

    let hotel_visible: Option<bool> =
        sqlx::query_scalar(r#"SELECT is_active AND NOT is_deleted FROM hotels WHERE id = $1"#)
            .bind(b.hotel_id)
            .fetch_optional(&state.pool)
            .await?;
    match hotel_visible {
        Some(true) => {}
        Some(false) if actor.is_super_admin() => {}
        _ => return Err(ApiError::not_found("Hotel")),
    }

    let mut tx = state.pool.begin().await?;
    let master = query_as::<_, MasterRoom>(
        r#"
        INSERT INTO master_rooms (id, hotel_id, name, description, full_day_price, capacity, amenities, images)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(b.hotel_id)
    .bind(b.name.trim())
    .bind(&b.description)
    .bind(pricing::round2(b.full_day_price))
    .bind(b.capacity)
    .bind(&b.amenities)
    .bind(&b.images)
    .fetch_one(&mut *tx)
    .await?;

    for nested in &b.sub_rooms {
        let sub = query_as::<_, SubRoom>(
            r#"
            INSERT INTO sub_rooms (id, hotel_id, master_room_id, name, slot_duration)
            VALUES ($1,$2,$3,$4,$5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(b.hotel_id)
        .bind(master.id)
        .bind(nested.name.trim())
        .bind(nested.slot_duration)
        .fetch_one(&mut *tx)
        .await?;

        let price = pricing::slot_price(master.full_day_price, sub.slot_duration);
        catalog::insert_windows(&mut *tx, sub.id, None, &nested.default_slots, price).await?;
    }
    tx.commit().await?;

    info!(master_room_id = %master.id, sub_rooms = b.sub_rooms.len(), "master room created");
    let view = single_view(&state.pool, master, Visibility::for_actor(&actor)).await?;
    Ok(Json(Envelope::ok(view).message("Master room created successfully")))
}

pub async fn get_master_room(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<MasterRoomView> {
    let id = parse_id(&id, "master room")?;
    let vis = Visibility::for_actor(&actor);
    let master = query_as::<_, MasterRoom>(r#"SELECT * FROM master_rooms WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Master room"))?;
    let master = vis.visible(master, "Master room")?;
    Ok(Json(Envelope::ok(single_view(&state.pool, master, vis).await?)))
}

pub async fn list_master_rooms(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListMasterRoomsQ>,
) -> Reply<Vec<MasterRoomView>> {
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let hotel_ids = parse_id_filter(q.hotel_id.as_deref(), "hotel")?;
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let count_sql = format!("SELECT COUNT(*) FROM master_rooms {MASTER_ROOM_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&hotel_ids)
        .bind(q.min_price)
        .bind(q.max_price)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_one(&state.pool)
        .await?;

    let list_sql = format!(
        "SELECT * FROM master_rooms {MASTER_ROOM_FILTER} ORDER BY created_at DESC LIMIT $8 OFFSET $9"
    );
    let rows = query_as::<_, MasterRoom>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&hotel_ids)
        .bind(q.min_price)
        .bind(q.max_price)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    let views = views(&state.pool, rows, vis).await?;
    Ok(Json(
        Envelope::ok(views)
            .paginated(page.summarize(total))
            .filters(json!({ "search": search, "hotelId": hotel_ids, "minPrice": q.min_price, "maxPrice": q.max_price })),
    ))
}

pub async fn update_master_room(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchMasterRoomBody>,
) -> Reply<MasterRoomView> {
    let id = parse_id(&id, "master room")?;
    actor.require_manager()?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if let Some(name) = &b.name {
        require_text(name, "masterRoomName")?;
    }
    if let Some(price) = b.full_day_price {
        catalog::ensure_price(price)?;
    }

    let vis = Visibility::for_actor(&actor);
    let mut tx = state.pool.begin().await?;
    let current = query_as::<_, MasterRoom>(r#"SELECT * FROM master_rooms WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Master room"))?;
    let current = vis.visible(current, "Master room")?;
    actor.require_hotel_staff(current.hotel_id)?;

    let master = query_as::<_, MasterRoom>(
        r#"
        UPDATE master_rooms SET
          name           = COALESCE($2, name),
          full_day_price = COALESCE($3, full_day_price),
          description    = COALESCE($4, description),
          capacity       = COALESCE($5, capacity),
          amenities      = COALESCE($6, amenities),
          images         = COALESCE($7, images),
          is_active      = COALESCE($8, is_active),
          is_deleted     = COALESCE($9, is_deleted),
          updated_at     = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name.as_deref().map(str::trim))
    .bind(b.full_day_price.map(pricing::round2))
    .bind(b.description)
    .bind(b.capacity)
    .bind(b.amenities)
    .bind(b.images)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&mut *tx)
    .await?;

    if b.full_day_price.is_some() {
        let subs = query_as::<_, (Uuid, i32)>(
            r#"SELECT id, slot_duration FROM sub_rooms WHERE master_room_id = $1"#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        for (sub_id, duration) in subs {
            let price = pricing::slot_price(master.full_day_price, duration);
            catalog::reprice_sub_room(&mut *tx, sub_id, price).await?;
        }
    }
    tx.commit().await?;

    let view = single_view(&state.pool, master, vis).await?;
    Ok(Json(Envelope::ok(view).message("Master room updated successfully")))
}

/// Hard delete. Sub rooms, slots and windows go with it.
pub async fn delete_master_rooms(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "master room")?;

    let removed = query_as::<_, (Uuid, Vec<String>)>(
        r#"DELETE FROM master_rooms WHERE id = ANY($1) RETURNING id, images"#,
    )
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;
    if removed.is_empty() {
        return Err(ApiError::NotFound("No master rooms found with the provided IDs".into()));
    }
    for (id, images) in &removed {
        release_media("rooms", *id, images);
    }
    Ok(Json(
        Envelope::ok(json!({ "deletedCount": removed.len() }))
            .message(format!("{} master room(s) deleted successfully", removed.len())),
    ))
}

async fn single_view(pool: &PgPool, master: MasterRoom, vis: Visibility) -> Result<MasterRoomView, ApiError> {
    views(pool, vec![master], vis)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Master room"))
}

async fn views(pool: &PgPool, masters: Vec<MasterRoom>, vis: Visibility) -> Result<Vec<MasterRoomView>, ApiError> {
    let ids: Vec<Uuid> = masters.iter().map(|m| m.id).collect();
    let subs = query_as::<_, SubRoom>(
        r#"
        SELECT * FROM sub_rooms
        WHERE master_room_id = ANY($1) AND ($2 OR (is_active AND NOT is_deleted))
        ORDER BY created_at, name
        "#,
    )
    .bind(&ids)
    .bind(vis.include_hidden())
    .fetch_all(pool)
    .await?;

    let mut by_master: HashMap<Uuid, Vec<catalog::SubRoomView>> = HashMap::new();
    for view in catalog::sub_room_views(pool, subs).await? {
        by_master.entry(view.sub_room.master_room_id).or_default().push(view);
    }
    Ok(masters
        .into_iter()
        .map(|master_room| MasterRoomView {
            sub_rooms: by_master.remove(&master_room.id).unwrap_or_default(),
            master_room,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(name: &str, duration: i32) -> NestedSubRoom {
        NestedSubRoom { name: name.into(), slot_duration: duration, default_slots: vec![] }
    }

    #[test]
    fn nested_sub_rooms_are_checked() {
        assert!(check_nested(&[nested("D1", 6), nested("D2", 3)]).is_ok());
        assert!(matches!(check_nested(&[nested("D1", 6), nested(" d1 ", 12)]), Err(ApiError::Conflict(_))));
        assert!(matches!(check_nested(&[nested("D1", 5)]), Err(ApiError::Validation(_))));
        assert!(matches!(check_nested(&[nested("  ", 6)]), Err(ApiError::Validation(_))));
    }

    #[test]
    fn accepts_original_field_names() {
        let b: CreateMasterRoomBody = serde_json::from_value(json!({
            "hotelId": Uuid::nil(),
            "masterRoomName": "Deluxe",
            "fullDayPrice": 1000,
            "subRooms": [{
                "subRoomName": "D1",
                "slotDuration": 6,
                "defaultSlots": [{ "startTime": "2025-03-01T06:00:00Z", "endTime": "2025-03-01T12:00:00Z" }]
            }]
        }))
        .unwrap();
        assert_eq!(b.name, "Deluxe");
        assert_eq!(b.sub_rooms[0].name, "D1");
        assert_eq!(pricing::slot_price(b.full_day_price, b.sub_rooms[0].slot_duration), 500.0);
    }
}
