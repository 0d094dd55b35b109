// src/routes/reviews.rs

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{query, query_as, PgConnection};
use uuid::Uuid;

use super::{parse_id, parse_id_filter, parse_ids, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::{Actor, Role};
use crate::error::{ApiError, ApiResult};
use crate::models::Review;
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewBody {
    pub customer_id: Option<Uuid>,
    pub hotel_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchReviewBody {
    pub rating: Option<i32>,
    pub comment: Option<String>,
    pub reply_by_hotel: Option<String>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReviewsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub hotel_id: Option<String>,
    pub customer_id: Option<String>,
    pub rating: Option<i32>,
    pub min_rating: Option<i32>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const REVIEW_FILTER: &str = r#"
    WHERE ($1 OR (is_active AND NOT is_deleted))
      AND ($2::text IS NULL OR comment ILIKE '%' || $2 || '%' OR reply_by_hotel ILIKE '%' || $2 || '%')
      AND ($3::uuid[] IS NULL OR hotel_id = ANY($3))
      AND ($4::uuid[] IS NULL OR customer_id = ANY($4))
      AND ($5::int4 IS NULL OR rating = $5)
      AND ($6::int4 IS NULL OR rating >= $6)
      AND ($7::bool IS NULL OR is_active = $7)
      AND ($8::bool IS NULL OR is_deleted = $8)
"#;

fn ensure_rating(rating: i32) -> ApiResult<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ApiError::validation("rating must be between 1 and 5"))
    }
}

/// Average to one decimal plus a count per star.
fn review_stats(counts: &[(i32, i64)]) -> Value {
    let mut distribution: BTreeMap<String, i64> = (1..=5).map(|r| (r.to_string(), 0)).collect();
    let (mut total, mut sum) = (0i64, 0i64);
    for &(rating, n) in counts {
        distribution.insert(rating.to_string(), n);
        total += n;
        sum += rating as i64 * n;
    }
    let average = if total > 0 { (sum as f64 / total as f64 * 10.0).round() / 10.0 } else { 0.0 };
    json!({ "totalReviews": total, "averageRating": average, "ratingDistribution": distribution })
}

/// Keeps the hotel's denormalized rating in step with its visible reviews.
async fn refresh_hotel_rating(conn: &mut PgConnection, hotel_id: Uuid) -> Result<(), sqlx::Error> {
    query(
        r#"
        UPDATE hotels SET
          rating = COALESCE((
            SELECT ROUND(AVG(rating)::numeric, 1)::float8 FROM reviews
            WHERE hotel_id = $1 AND is_active AND NOT is_deleted
          ), 0),
          total_reviews = (
            SELECT COUNT(*)::int4 FROM reviews
            WHERE hotel_id = $1 AND is_active AND NOT is_deleted
          ),
          updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(hotel_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn create_review(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateReviewBody>,
) -> Reply<Review> {
    let customer_id = match actor.role {
        Role::Customer => actor.id,
        Role::Guest => return Err(ApiError::Unauthorized("Please sign in to continue".into())),
        _ => b.customer_id.ok_or_else(|| ApiError::validation("customerId is required"))?,
    };
    ensure_rating(b.rating)?;

    let hotel_live: Option<bool> =
        sqlx::query_scalar(r#"SELECT is_active AND NOT is_deleted FROM hotels WHERE id = $1"#)
            .bind(b.hotel_id)
            .fetch_optional(&state.pool)
            .await?;
    if hotel_live != Some(true) {
        return Err(ApiError::not_found("Hotel"));
    }

    let mut tx = state.pool.begin().await?;
    let review = query_as::<_, Review>(
        r#"
        INSERT INTO reviews (id, customer_id, hotel_id, rating, comment)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(customer_id)
    .bind(b.hotel_id)
    .bind(b.rating)
    .bind(b.comment.map(|c| c.trim().to_string()))
    .fetch_one(&mut *tx)
    .await?;
    refresh_hotel_rating(&mut *tx, review.hotel_id).await?;
    tx.commit().await?;

    Ok(Json(Envelope::ok(review).message("Review created successfully")))
}

pub async fn get_review(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<Review> {
    let id = parse_id(&id, "review")?;
    let review = query_as::<_, Review>(r#"SELECT * FROM reviews WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Review"))?;
    let review = Visibility::for_actor(&actor).visible(review, "Review")?;
    Ok(Json(Envelope::ok(review)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListReviewsQ>,
) -> Reply<Vec<Review>> {
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let hotel_ids = parse_id_filter(q.hotel_id.as_deref(), "hotel")?;
    let customer_ids = parse_id_filter(q.customer_id.as_deref(), "customer")?;
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let stats_sql = format!("SELECT rating, COUNT(*) FROM reviews {REVIEW_FILTER} GROUP BY rating");
    let counts = query_as::<_, (i32, i64)>(&stats_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&hotel_ids)
        .bind(&customer_ids)
        .bind(q.rating)
        .bind(q.min_rating)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_all(&state.pool)
        .await?;
    let total: i64 = counts.iter().map(|(_, n)| n).sum();

    let list_sql = format!("SELECT * FROM reviews {REVIEW_FILTER} ORDER BY created_at DESC LIMIT $9 OFFSET $10");
    let rows = query_as::<_, Review>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(&hotel_ids)
        .bind(&customer_ids)
        .bind(q.rating)
        .bind(q.min_rating)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows)
            .paginated(page.summarize(total))
            .filters(json!({
                "search": search,
                "hotelId": hotel_ids,
                "customerId": customer_ids,
                "rating": q.rating,
                "minRating": q.min_rating,
            }))
            .stats(review_stats(&counts)),
    ))
}

pub async fn update_review(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchReviewBody>,
) -> Reply<Review> {
    let id = parse_id(&id, "review")?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if let Some(rating) = b.rating {
        ensure_rating(rating)?;
    }

    let mut tx = state.pool.begin().await?;
    let current = query_as::<_, Review>(r#"SELECT * FROM reviews WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Review"))?;
    let current = Visibility::for_actor(&actor).visible(current, "Review")?;

    // Authors edit their words; the hotel answers and moderates.
    let is_author = actor.is_customer() && current.customer_id == actor.id;
    let is_hotel_staff = actor.require_hotel_staff(current.hotel_id).is_ok();
    if (b.rating.is_some() || b.comment.is_some()) && !is_author && !actor.is_super_admin() {
        return Err(ApiError::Forbidden("Only the author can edit a review".into()));
    }
    if (b.reply_by_hotel.is_some() || b.is_active.is_some()) && !is_hotel_staff {
        return Err(ApiError::Forbidden("Only hotel staff can reply to or moderate a review".into()));
    }

    let review = query_as::<_, Review>(
        r#"
        UPDATE reviews SET
          rating         = COALESCE($2, rating),
          comment        = COALESCE($3, comment),
          reply_by_hotel = COALESCE($4, reply_by_hotel),
          is_active      = COALESCE($5, is_active),
          is_deleted     = COALESCE($6, is_deleted),
          updated_at     = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.rating)
    .bind(b.comment.map(|c| c.trim().to_string()))
    .bind(b.reply_by_hotel.map(|c| c.trim().to_string()))
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&mut *tx)
    .await?;
    refresh_hotel_rating(&mut *tx, review.hotel_id).await?;
    tx.commit().await?;

    Ok(Json(Envelope::ok(review).message("Review updated successfully")))
}

pub async fn delete_reviews(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "review")?;

    let mut tx = state.pool.begin().await?;
    let hotels: Vec<Uuid> = sqlx::query_scalar(r#"DELETE FROM reviews WHERE id = ANY($1) RETURNING hotel_id"#)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
    if hotels.is_empty() {
        return Err(ApiError::NotFound("No reviews found with the provided IDs".into()));
    }
    let mut touched = hotels.clone();
    touched.sort();
    touched.dedup();
    for hotel_id in touched {
        refresh_hotel_rating(&mut *tx, hotel_id).await?;
    }
    tx.commit().await?;

    Ok(Json(
        Envelope::ok(json!({ "deletedCount": hotels.len() }))
            .message(format!("{} review(s) deleted successfully", hotels.len())),
    ))
}
