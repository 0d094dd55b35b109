// src/routes/hotels.rs

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::{query, query_as};
use tracing::info;
use uuid::Uuid;

use super::{
    hotel_amenities::checked_amenity_ids, parse_id, parse_id_filter, parse_ids, require_text, search_term, ApiJson,
    ApiPath, ApiQuery, Envelope, Page, Reply,
};
use crate::auth::{Actor, Role};
use crate::error::{ApiError, ApiResult};
use crate::models::Hotel;
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHotelBody {
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub website: Option<String>,
    pub contact_number: String,
    pub email: String,
    pub admin_id: Option<Uuid>,
    #[serde(default)]
    pub manager_ids: Vec<Uuid>,
    #[serde(default, rename = "amenitiesId")]
    pub amenity_ids: Vec<Uuid>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchHotelBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub website: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub manager_ids: Option<Vec<Uuid>>,
    #[serde(rename = "amenitiesId")]
    pub amenity_ids: Option<Vec<Uuid>>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHotelsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
    pub admin_id: Option<String>,
    pub amenities_id: Option<String>,
    pub customer_id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Metres.
    pub distance: Option<f64>,
}

const DEFAULT_RADIUS_M: f64 = 5000.0;

/// Hotels with their great-circle distance in metres from ($10, $11), NULL without a point.
const HOTELS_WITH_DISTANCE: &str = r#"
    (SELECT h.*,
            CASE WHEN $10::float8 IS NULL OR $11::float8 IS NULL THEN NULL
            ELSE 6371000 * 2 * asin(sqrt(least(1.0,
                power(sin(radians(h.latitude - $10) / 2), 2)
                + cos(radians($10)) * cos(radians(h.latitude))
                  * power(sin(radians(h.longitude - $11) / 2), 2))))
            END AS distance_m
     FROM hotels h) hotels
"#;

const HOTEL_FILTER: &str = r#"
    WHERE ($1 OR (is_active AND NOT is_deleted))
      AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR city ILIKE '%' || $2 || '%'
           OR country ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%'
           OR contact_number ILIKE '%' || $2 || '%')
      AND ($3::text IS NULL OR city ILIKE $3)
      AND ($4::text IS NULL OR country ILIKE $4)
      AND ($5::bool IS NULL OR is_active = $5)
      AND ($6::bool IS NULL OR is_deleted = $6)
      AND ($7::uuid[] IS NULL OR admin_id = ANY($7))
      AND ($8::uuid[] IS NULL OR amenity_ids && $8)
      AND ($9::uuid IS NULL OR EXISTS (
            SELECT 1 FROM bookings b WHERE b.hotel_id = hotels.id AND b.customer_id = $9))
      AND ($12::float8 IS NULL OR distance_m <= $12)
"#;

/// A search point needs both coordinates; the radius defaults to 5 km.
fn search_area(
    lat: Option<f64>,
    lng: Option<f64>,
    distance: Option<f64>,
) -> ApiResult<Option<(f64, f64, f64)>> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        return Ok(None);
    };
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::validation("lat/lng are out of range"));
    }
    let radius = distance.unwrap_or(DEFAULT_RADIUS_M);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(ApiError::validation("distance must be a positive number of metres"));
    }
    Ok(Some((lat, lng, radius)))
}

pub async fn create_hotel(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateHotelBody>,
) -> Reply<Hotel> {
    actor.require_admin()?;
    for (value, field) in [
        (&b.name, "name"),
        (&b.address, "address"),
        (&b.city, "city"),
        (&b.country, "country"),
        (&b.contact_number, "contactNumber"),
        (&b.email, "email"),
    ] {
        require_text(value, field)?;
    }

    let admin_id = if actor.role == Role::Admin { Some(actor.id) } else { b.admin_id };
    let mut tx = state.pool.begin().await?;

    if let Some(admin_id) = admin_id {
        // Row lock serializes concurrent creates for the same admin.
        let is_chain_admin: Option<bool> = sqlx::query_scalar(
            r#"SELECT is_chain_admin FROM users WHERE id = $1 AND role = 'admin' AND NOT is_deleted FOR UPDATE"#,
        )
        .bind(admin_id)
        .fetch_optional(&mut *tx)
        .await?;
        let is_chain_admin =
            is_chain_admin.ok_or_else(|| ApiError::validation("adminId must reference an admin user"))?;

        if !is_chain_admin {
            let owned: i64 = sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM hotels WHERE admin_id = $1 AND NOT is_deleted"#,
            )
            .bind(admin_id)
            .fetch_one(&mut *tx)
            .await?;
            if owned > 0 {
                return Err(ApiError::Conflict("This admin already owns a hotel".into()));
            }
        }
    }

    let amenity_ids = checked_amenity_ids(&mut tx, &b.amenity_ids).await?;
    let hotel = query_as::<_, Hotel>(
        r#"
        INSERT INTO hotels (id, name, description, address, city, state, country, pincode,
                            latitude, longitude, website, contact_number, email, admin_id,
                            manager_ids, amenity_ids, images)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(b.name.trim())
    .bind(&b.description)
    .bind(&b.address)
    .bind(&b.city)
    .bind(&b.state)
    .bind(&b.country)
    .bind(b.pincode.trim())
    .bind(b.latitude)
    .bind(b.longitude)
    .bind(&b.website)
    .bind(&b.contact_number)
    .bind(b.email.trim().to_lowercase())
    .bind(admin_id)
    .bind(&b.manager_ids)
    .bind(&amenity_ids)
    .bind(&b.images)
    .fetch_one(&mut *tx)
    .await?;

    let mut members = b.manager_ids.clone();
    members.extend(admin_id);
    link_staff(&mut tx, hotel.id, &members).await?;
    tx.commit().await?;

    info!(hotel_id = %hotel.id, "hotel created");
    Ok(Json(Envelope::ok(hotel).message("Hotel created successfully")))
}

pub async fn get_hotel(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<Hotel> {
    let id = parse_id(&id, "hotel")?;
    let hotel = fetch_hotel(&state, id).await?;
    let hotel = Visibility::for_actor(&actor).visible(hotel, "Hotel")?;
    Ok(Json(Envelope::ok(hotel)))
}

pub async fn list_hotels(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListHotelsQ>,
) -> Reply<Vec<Hotel>> {
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };
    let admin_ids = parse_id_filter(q.admin_id.as_deref(), "admin")?;
    let amenity_ids = parse_id_filter(q.amenities_id.as_deref(), "hotel amenity")?;
    let customer_id = match q.customer_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_id(raw, "customer")?),
    };
    let area = search_area(q.lat, q.lng, q.distance)?;
    let (lat, lng, radius) = match area {
        Some((lat, lng, radius)) => (Some(lat), Some(lng), Some(radius)),
        None => (None, None, None),
    };

    let count_sql = format!("SELECT COUNT(*) FROM {HOTELS_WITH_DISTANCE} {HOTEL_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&q.city)
        .bind(&q.country)
        .bind(is_active)
        .bind(is_deleted)
        .bind(&admin_ids)
        .bind(&amenity_ids)
        .bind(customer_id)
        .bind(lat)
        .bind(lng)
        .bind(radius)
        .fetch_one(&state.pool)
        .await?;

    // Nearest first when searching around a point.
    let list_sql = format!(
        "SELECT * FROM {HOTELS_WITH_DISTANCE} {HOTEL_FILTER} \
         ORDER BY distance_m ASC NULLS LAST, created_at DESC LIMIT $13 OFFSET $14"
    );
    let rows = query_as::<_, Hotel>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&q.city)
        .bind(&q.country)
        .bind(is_active)
        .bind(is_deleted)
        .bind(&admin_ids)
        .bind(&amenity_ids)
        .bind(customer_id)
        .bind(lat)
        .bind(lng)
        .bind(radius)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows).paginated(page.summarize(total)).filters(json!({
            "search": search,
            "city": q.city,
            "country": q.country,
            "adminId": admin_ids,
            "amenitiesId": amenity_ids,
            "customerId": customer_id,
            "lat": lat,
            "lng": lng,
            "distance": radius,
        })),
    ))
}

pub async fn update_hotel(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchHotelBody>,
) -> Reply<Hotel> {
    let id = parse_id(&id, "hotel")?;
    actor.require_admin()?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;

    let mut tx = state.pool.begin().await?;
    let current = query_as::<_, Hotel>(r#"SELECT * FROM hotels WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Hotel"))?;
    let current = Visibility::for_actor(&actor).visible(current, "Hotel")?;
    if !actor.is_super_admin() && current.admin_id != Some(actor.id) {
        return Err(ApiError::Forbidden("Only the hotel's admin can update it".into()));
    }
    let amenity_ids = match &b.amenity_ids {
        Some(ids) => Some(checked_amenity_ids(&mut tx, ids).await?),
        None => None,
    };

    let hotel = query_as::<_, Hotel>(
        r#"
        UPDATE hotels SET
          name           = COALESCE($2, name),
          description    = COALESCE($3, description),
          address        = COALESCE($4, address),
          city           = COALESCE($5, city),
          state          = COALESCE($6, state),
          country        = COALESCE($7, country),
          pincode        = COALESCE($8, pincode),
          latitude       = COALESCE($9, latitude),
          longitude      = COALESCE($10, longitude),
          website        = COALESCE($11, website),
          contact_number = COALESCE($12, contact_number),
          email          = COALESCE($13, email),
          manager_ids    = COALESCE($14, manager_ids),
          amenity_ids    = COALESCE($15, amenity_ids),
          images         = COALESCE($16, images),
          is_active      = COALESCE($17, is_active),
          is_deleted     = COALESCE($18, is_deleted),
          updated_at     = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name)
    .bind(b.description)
    .bind(b.address)
    .bind(b.city)
    .bind(b.state)
    .bind(b.country)
    .bind(b.pincode)
    .bind(b.latitude)
    .bind(b.longitude)
    .bind(b.website)
    .bind(b.contact_number)
    .bind(b.email.map(|e| e.trim().to_lowercase()))
    .bind(&b.manager_ids)
    .bind(amenity_ids)
    .bind(b.images)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(managers) = &b.manager_ids {
        let dropped: Vec<Uuid> =
            current.manager_ids.iter().filter(|m| !managers.contains(m)).copied().collect();
        unlink_staff(&mut tx, &[id], &dropped).await?;
        link_staff(&mut tx, id, managers).await?;
    }
    tx.commit().await?;

    Ok(Json(Envelope::ok(hotel).message("Hotel updated successfully")))
}

pub async fn delete_hotels(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "hotel")?;

    let mut tx = state.pool.begin().await?;
    let removed = query_as::<_, (Uuid, Vec<String>)>(
        r#"DELETE FROM hotels WHERE id = ANY($1) RETURNING id, images"#,
    )
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;
    if removed.is_empty() {
        return Err(ApiError::NotFound("No hotels found with the provided IDs".into()));
    }
    let removed_ids: Vec<Uuid> = removed.iter().map(|(id, _)| *id).collect();
    query(
        r#"
        UPDATE users SET hotel_ids = ARRAY(SELECT h FROM unnest(hotel_ids) h WHERE h <> ALL($1))
        WHERE hotel_ids && $1
        "#,
    )
    .bind(&removed_ids)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    for (id, images) in &removed {
        super::release_media("hotels", *id, images);
    }
    Ok(Json(
        Envelope::ok(json!({ "deletedCount": removed.len() }))
            .message(format!("{} hotel(s) deleted successfully", removed.len())),
    ))
}

async fn fetch_hotel(state: &AppState, id: Uuid) -> Result<Hotel, ApiError> {
    query_as::<_, Hotel>(r#"SELECT * FROM hotels WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Hotel"))
}

async fn link_staff(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    hotel_id: Uuid,
    user_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    query(
        r#"
        UPDATE users SET hotel_ids = array_append(hotel_ids, $1), updated_at = NOW()
        WHERE id = ANY($2) AND NOT ($1 = ANY(hotel_ids))
        "#,
    )
    .bind(hotel_id)
    .bind(user_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn unlink_staff(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    hotel_ids: &[Uuid],
    user_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    query(
        r#"
        UPDATE users SET hotel_ids = ARRAY(SELECT h FROM unnest(hotel_ids) h WHERE h <> ALL($1)), updated_at = NOW()
        WHERE id = ANY($2)
        "#,
    )
    .bind(hotel_ids)
    .bind(user_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_area_needs_both_coordinates() {
        assert_eq!(search_area(Some(12.9), None, Some(100.0)).unwrap(), None);
        assert_eq!(search_area(None, None, None).unwrap(), None);
    }

    #[test]
    fn search_area_defaults_to_five_kilometres() {
        assert_eq!(search_area(Some(12.97), Some(77.59), None).unwrap(), Some((12.97, 77.59, 5000.0)));
        assert_eq!(search_area(Some(0.0), Some(0.0), Some(250.0)).unwrap(), Some((0.0, 0.0, 250.0)));
    }

    #[test]
    fn search_area_rejects_bad_input() {
        assert!(search_area(Some(91.0), Some(0.0), None).is_err());
        assert!(search_area(Some(0.0), Some(-181.0), None).is_err());
        assert!(search_area(Some(0.0), Some(0.0), Some(0.0)).is_err());
        assert!(search_area(Some(0.0), Some(0.0), Some(f64::NAN)).is_err());
    }
}
