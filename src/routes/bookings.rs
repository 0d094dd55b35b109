// src/routes/bookings.rs
//
// Booking lifecycle. Every status change runs in one transaction with the
// booking row locked, together with the slot window it binds or frees.
// Notifications go out after commit.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{query, query_as, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{parse_id, parse_id_filter, parse_ids, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::{Actor, Role};
use crate::domain::booking::{request_cancellation as check_request, respond_to_cancellation as check_response};
use crate::domain::{catalog, BookingEvent};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Booking, BookingStatus, CancellationStatus, NotificationKind, Party, PaymentStatus, PaymentType,
};
use crate::notify::{Draft, Notifier};
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingBody {
    pub customer_id: Option<Uuid>,
    pub hotel_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub slot_price: f64,
    pub slot_duration: i32,
    pub booking_date: Option<DateTime<Utc>>,
    pub check_in_date: DateTime<Utc>,
    pub guests: i32,
    pub total_price: f64,
    #[serde(default = "online")]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub special_requests: String,
}
fn online() -> PaymentType { PaymentType::Online }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    pub slot_id: Option<Uuid>,
    pub status: BookingStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequestBody {
    #[serde(alias = "message")]
    pub reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResponseBody {
    pub status: CancellationStatus,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBookingBody {
    pub check_in_date: Option<DateTime<Utc>>,
    pub guests: Option<i32>,
    pub special_requests: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub payment_status: Option<PaymentStatus>,
    pub booking_status: Option<BookingStatus>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub hotel_id: Option<String>,
    pub customer_id: Option<String>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const BOOKING_FILTER: &str = r#"
    WHERE ($1 OR (b.is_active AND NOT b.is_deleted))
      AND ($2::text IS NULL
           OR EXISTS (SELECT 1 FROM customers c WHERE c.id = b.customer_id
                      AND (c.name ILIKE '%' || $2 || '%' OR c.email ILIKE '%' || $2 || '%'))
           OR EXISTS (SELECT 1 FROM hotels h WHERE h.id = b.hotel_id AND h.name ILIKE '%' || $2 || '%'))
      AND ($3::booking_status IS NULL OR b.booking_status = $3)
      AND ($4::payment_status IS NULL OR b.payment_status = $4)
      AND ($5::timestamptz IS NULL OR b.check_in_date >= $5)
      AND ($6::timestamptz IS NULL OR b.check_in_date <= $6)
      AND ($7::uuid[] IS NULL OR b.hotel_id = ANY($7))
      AND ($8::uuid[] IS NULL OR b.customer_id = ANY($8))
      AND ($9::uuid[] IS NULL OR b.hotel_id = ANY($9))
      AND ($10::bool IS NULL OR b.is_active = $10)
      AND ($11::bool IS NULL OR b.is_deleted = $11)
"#;

fn validate_new(b: &CreateBookingBody) -> ApiResult<()> {
    if b.end_time <= b.start_time {
        return Err(ApiError::validation("endTime must be after startTime"));
    }
    catalog::ensure_duration(b.slot_duration)?;
    if b.guests < 1 {
        return Err(ApiError::validation("guests must be at least 1"));
    }
    for (value, field) in [(b.slot_price, "slotPrice"), (b.total_price, "totalPrice")] {
        if !value.is_finite() || value < 0.0 {
            return Err(ApiError::Validation(format!("{field} must be a non-negative number")));
        }
    }
    Ok(())
}

pub async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateBookingBody>,
) -> Reply<Booking> {
    let customer_id = match actor.role {
        Role::Customer => actor.id,
        Role::Guest => return Err(ApiError::Unauthorized("Please sign in to continue".into())),
        _ => b.customer_id.ok_or_else(|| ApiError::validation("customerId is required"))?,
    };
    validate_new(&b)?;

    let hotel_live: Option<bool> =
        sqlx::query_scalar(r#"SELECT is_active AND NOT is_deleted FROM hotels WHERE id = $1"#)
            .bind(b.hotel_id)
            .fetch_optional(&state.pool)
            .await?;
    if hotel_live != Some(true) {
        return Err(ApiError::not_found("Hotel"));
    }

    let mut tx = state.pool.begin().await?;
    let booking = query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (
          id, customer_id, hotel_id, start_time, end_time, slot_price, slot_duration,
          booking_date, check_in_date, guests, total_price, payment_type, special_requests
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7, COALESCE($8, NOW()), $9,$10,$11,$12,$13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(customer_id)
    .bind(b.hotel_id)
    .bind(b.start_time)
    .bind(b.end_time)
    .bind(b.slot_price)
    .bind(b.slot_duration)
    .bind(b.booking_date)
    .bind(b.check_in_date)
    .bind(b.guests)
    .bind(b.total_price)
    .bind(b.payment_type)
    .bind(b.special_requests.trim())
    .fetch_one(&mut *tx)
    .await?;

    let touched = query(
        r#"UPDATE customers SET booking_history = array_append(booking_history, $2), updated_at = NOW() WHERE id = $1"#,
    )
    .bind(customer_id)
    .bind(booking.id)
    .execute(&mut *tx)
    .await?;
    if touched.rows_affected() == 0 {
        return Err(ApiError::not_found("Customer"));
    }
    tx.commit().await?;

    info!(booking_id = %booking.id, hotel_id = %booking.hotel_id, "booking created");
    state.notifier.send(
        Draft::new(
            Party::hotel(booking.hotel_id),
            Party::customer(customer_id),
            NotificationKind::NewBookingRequest,
            format!(
                "New booking request for {} to {} ({} guest(s))",
                booking.start_time.format("%Y-%m-%d %H:%M"),
                booking.end_time.format("%Y-%m-%d %H:%M"),
                booking.guests
            ),
        )
        .with_email("New booking request"),
    );
    Ok(Json(Envelope::ok(booking).message("Booking created successfully")))
}

pub async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<Booking> {
    let id = parse_id(&id, "booking")?;
    let booking = query_as::<_, Booking>(r#"SELECT * FROM bookings WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking"))?;
    let booking = Visibility::for_actor(&actor).visible(booking, "Booking")?;
    if actor.is_customer() && booking.customer_id != actor.id {
        return Err(ApiError::not_found("Booking"));
    }
    actor.require_self_or_staff(booking.customer_id)?;
    Ok(Json(Envelope::ok(booking)))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListBookingsQ>,
) -> Reply<Vec<Booking>> {
    if actor.role == Role::Guest {
        return Err(ApiError::Unauthorized("Please sign in to continue".into()));
    }
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let hotel_ids = parse_id_filter(q.hotel_id.as_deref(), "hotel")?;
    let customer_ids = match actor.role {
        Role::Customer => Some(vec![actor.id]),
        _ => parse_id_filter(q.customer_id.as_deref(), "customer")?,
    };
    // Hotel staff see their own hotels' bookings.
    let scope = match actor.role {
        Role::Admin | Role::Manager => Some(actor.hotel_ids.clone()),
        _ => None,
    };
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let count_sql = format!("SELECT COUNT(*) FROM bookings b {BOOKING_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(q.status)
        .bind(q.payment_status)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(&hotel_ids)
        .bind(&customer_ids)
        .bind(&scope)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_one(&state.pool)
        .await?;

    let list_sql =
        format!("SELECT b.* FROM bookings b {BOOKING_FILTER} ORDER BY b.created_at DESC LIMIT $12 OFFSET $13");
    let rows = query_as::<_, Booking>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(q.status)
        .bind(q.payment_status)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(&hotel_ids)
        .bind(&customer_ids)
        .bind(&scope)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows).paginated(page.summarize(total)).filters(json!({
            "search": search,
            "status": q.status,
            "paymentStatus": q.payment_status,
            "startDate": q.start_date,
            "endDate": q.end_date,
            "hotelId": hotel_ids,
            "customerId": customer_ids,
        })),
    ))
}

pub async fn update_booking(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchBookingBody>,
) -> Reply<Booking> {
    let id = parse_id(&id, "booking")?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if (b.booking_status.is_some() || b.payment_status.is_some() || b.is_active.is_some())
        && actor.require_manager().is_err()
    {
        return Err(ApiError::Forbidden("Only hotel staff can change booking or payment status".into()));
    }
    if let Some(guests) = b.guests {
        if guests < 1 {
            return Err(ApiError::validation("guests must be at least 1"));
        }
    }
    let event = match b.booking_status {
        None => None,
        Some(target) => match BookingEvent::toward(target) {
            Some(BookingEvent::Confirm) => {
                return Err(ApiError::validation("Use bookingConfirmation to confirm a booking"))
            }
            Some(event) => Some(event),
            None => return Err(ApiError::validation("A booking cannot be moved back to pending")),
        },
    };

    let mut tx = state.pool.begin().await?;
    let current = lock_booking(&mut tx, id).await?;
    let current = Visibility::for_actor(&actor).visible(current, "Booking")?;
    actor.require_self_or_staff(current.customer_id)?;
    if event.is_some() || b.payment_status.is_some() || b.is_active.is_some() {
        actor.require_hotel_staff(current.hotel_id)?;
    }

    let next = match event {
        Some(event) => Some(current.booking_status.apply(event)?),
        None => None,
    };
    if next == Some(BookingStatus::Cancelled) {
        release_window(&mut tx, current.slot_window_id).await?;
    }

    let booking = query_as::<_, Booking>(
        r#"
        UPDATE bookings SET
          check_in_date    = COALESCE($2, check_in_date),
          guests           = COALESCE($3, guests),
          special_requests = COALESCE($4, special_requests),
          payment_type     = COALESCE($5, payment_type),
          payment_status   = COALESCE($6, payment_status),
          payment_date     = CASE WHEN $6::payment_status = 'paid' THEN COALESCE(payment_date, NOW())
                                  ELSE payment_date END,
          booking_status   = COALESCE($7, booking_status),
          is_active        = COALESCE($8, is_active),
          is_deleted       = COALESCE($9, is_deleted),
          updated_at       = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.check_in_date)
    .bind(b.guests)
    .bind(b.special_requests)
    .bind(b.payment_type)
    .bind(b.payment_status)
    .bind(next)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    if let Some(status) = next {
        notify_status(&state.notifier, &booking, status);
    }
    Ok(Json(Envelope::ok(booking).message("Booking updated successfully")))
}

/// Hard delete. Frees any window a live booking was holding.
pub async fn delete_bookings(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "booking")?;

    let mut tx = state.pool.begin().await?;
    query(
        r#"
        UPDATE slot_windows SET is_available = TRUE
        WHERE id IN (
          SELECT slot_window_id FROM bookings
          WHERE id = ANY($1) AND booking_status = 'booked' AND slot_window_id IS NOT NULL
        )
        "#,
    )
    .bind(&ids)
    .execute(&mut *tx)
    .await?;
    query(
        r#"
        UPDATE customers
        SET booking_history = ARRAY(SELECT h FROM unnest(booking_history) AS h WHERE h <> ALL($1))
        WHERE booking_history && $1
        "#,
    )
    .bind(&ids)
    .execute(&mut *tx)
    .await?;
    let res = query(r#"DELETE FROM bookings WHERE id = ANY($1)"#)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("No bookings found with the provided IDs".into()));
    }
    tx.commit().await?;

    Ok(Json(
        Envelope::ok(json!({ "deletedCount": res.rows_affected() }))
            .message(format!("{} booking(s) deleted successfully", res.rows_affected())),
    ))
}

// ───────────────────────────────────────
// Lifecycle endpoints
// ───────────────────────────────────────
pub async fn booking_confirmation(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<ConfirmBody>,
) -> Reply<Booking> {
    let id = parse_id(&id, "booking")?;
    actor.require_manager()?;
    actor.require_hotel_staff(booking_hotel(&state.pool, id).await?)?;
    let booking = confirm_booking(&state.pool, id, b.slot_id, b.status).await?;
    notify_status(&state.notifier, &booking, booking.booking_status);
    let message = match booking.booking_status {
        BookingStatus::Booked => "Booking confirmed successfully".to_string(),
        other => format!("Booking status updated to {other}"),
    };
    Ok(Json(Envelope::ok(booking).message(message)))
}

pub async fn request_booking_cancellation(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<CancellationRequestBody>,
) -> Reply<Booking> {
    let id = parse_id(&id, "booking")?;
    let booking = request_cancellation(&state.pool, &actor, id, &b.reason).await?;
    state.notifier.send(
        Draft::new(
            Party::hotel(booking.hotel_id),
            Party::customer(booking.customer_id),
            NotificationKind::NewBookingCancellation,
            format!("Cancellation requested for booking {}: {}", booking.id, booking.cancellation_request.message),
        )
        .with_email("Booking cancellation requested"),
    );
    Ok(Json(Envelope::ok(booking).message("Cancellation request submitted successfully")))
}

pub async fn respond_to_cancellation_request(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<CancellationResponseBody>,
) -> Reply<Booking> {
    let id = parse_id(&id, "booking")?;
    actor.require_manager()?;
    actor.require_hotel_staff(booking_hotel(&state.pool, id).await?)?;
    let booking = respond_to_cancellation(&state.pool, id, b.status, &b.message).await?;
    let decision = b.status;
    let mut text = format!("Your cancellation request has been {decision}");
    if !b.message.trim().is_empty() {
        text.push_str(&format!(": {}", b.message.trim()));
    }
    state.notifier.send(
        Draft::new(
            Party::customer(booking.customer_id),
            Party::hotel(booking.hotel_id),
            NotificationKind::BookingCancellation,
            text,
        )
        .with_email(format!("Cancellation request {decision}")),
    );
    Ok(Json(Envelope::ok(booking).message(format!("Cancellation request {decision} successfully"))))
}

// ───────────────────────────────────────
// Transactional core
// ───────────────────────────────────────

/// Moves a booking toward `target` through the lifecycle table. Confirmation
/// requires a paid booking and binds the given slot window, which must belong
/// to the booking's hotel and still be available. Concurrent confirmations
/// serialize on the booking row; the loser sees `already booked`.
pub async fn confirm_booking(
    pool: &PgPool,
    booking_id: Uuid,
    slot_id: Option<Uuid>,
    target: BookingStatus,
) -> ApiResult<Booking> {
    let event = BookingEvent::toward(target)
        .ok_or_else(|| ApiError::validation("status must be one of booked, completed or cancelled"))?;

    let mut tx = pool.begin().await?;
    let booking = lock_booking(&mut tx, booking_id).await?;
    let next = booking.booking_status.apply(event)?;

    let mut window = booking.slot_window_id;
    match event {
        BookingEvent::Confirm => {
            if booking.payment_status != PaymentStatus::Paid {
                return Err(ApiError::Conflict("Payment is still pending for this booking".into()));
            }
            let slot_id = slot_id.ok_or_else(|| ApiError::validation("slotId is required to confirm a booking"))?;
            bind_window(&mut tx, slot_id, booking.hotel_id).await?;
            window = Some(slot_id);
        }
        _ if next == BookingStatus::Cancelled => release_window(&mut tx, window).await?,
        _ => {}
    }

    let updated = query_as::<_, Booking>(
        r#"
        UPDATE bookings SET booking_status = $2, slot_window_id = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(next)
    .bind(window)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(booking_id = %booking_id, from = %booking.booking_status, to = %next, "booking status changed");
    Ok(updated)
}

/// Customer side of the cancellation workflow.
pub async fn request_cancellation(pool: &PgPool, actor: &Actor, booking_id: Uuid, reason: &str) -> ApiResult<Booking> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ApiError::validation("A reason for cancellation is required"));
    }

    let mut tx = pool.begin().await?;
    let booking = lock_booking(&mut tx, booking_id).await?;
    if actor.is_customer() && booking.customer_id != actor.id {
        return Err(ApiError::not_found("Booking"));
    }
    actor.require_self_or_staff(booking.customer_id)?;
    check_request(booking.booking_status, &booking.cancellation_request)?;

    let updated = query_as::<_, Booking>(
        r#"
        UPDATE bookings SET
          cancellation_requested    = TRUE,
          cancellation_status       = 'pending',
          cancellation_message      = $2,
          cancellation_requested_at = NOW(),
          updated_at                = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(reason)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(updated)
}

/// Hotel side of the cancellation workflow. Approval cancels the booking and
/// its payment and hands the bound window back.
pub async fn respond_to_cancellation(
    pool: &PgPool,
    booking_id: Uuid,
    decision: CancellationStatus,
    message: &str,
) -> ApiResult<Booking> {
    if decision == CancellationStatus::Pending {
        return Err(ApiError::validation("status must be approved or rejected"));
    }

    let mut tx = pool.begin().await?;
    let booking = lock_booking(&mut tx, booking_id).await?;
    let decision = check_response(&booking.cancellation_request, decision)?;

    let (status, payment) = if decision == CancellationStatus::Approved {
        let next = booking.booking_status.apply(BookingEvent::ApproveCancellation)?;
        release_window(&mut tx, booking.slot_window_id).await?;
        (Some(next), Some(PaymentStatus::Cancelled))
    } else {
        (None, None)
    };

    let updated = query_as::<_, Booking>(
        r#"
        UPDATE bookings SET
          cancellation_status       = $2,
          cancellation_message      = CASE WHEN $3 = '' THEN cancellation_message ELSE $3 END,
          cancellation_responded_at = NOW(),
          booking_status            = COALESCE($4, booking_status),
          payment_status            = COALESCE($5, payment_status),
          updated_at                = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(decision)
    .bind(message.trim())
    .bind(status)
    .bind(payment)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(booking_id = %booking_id, decision = %decision, "cancellation request answered");
    Ok(updated)
}

/// A booking never moves between hotels, so this can be read outside the lock.
async fn booking_hotel(pool: &PgPool, id: Uuid) -> ApiResult<Uuid> {
    sqlx::query_scalar(r#"SELECT hotel_id FROM bookings WHERE id = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking"))
}

async fn lock_booking(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> ApiResult<Booking> {
    query_as::<_, Booking>(r#"SELECT * FROM bookings WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking"))
}

async fn bind_window(tx: &mut Transaction<'_, Postgres>, window_id: Uuid, hotel_id: Uuid) -> ApiResult<()> {
    let row: Option<(Uuid, bool)> = sqlx::query_as(
        r#"
        SELECT s.hotel_id, w.is_available
        FROM slot_windows w JOIN sub_rooms s ON s.id = w.sub_room_id
        WHERE w.id = $1
        FOR UPDATE OF w
        "#,
    )
    .bind(window_id)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        None => Err(ApiError::not_found("Slot")),
        Some((owner, _)) if owner != hotel_id => {
            Err(ApiError::validation("Slot does not belong to this booking's hotel"))
        }
        Some((_, false)) => Err(ApiError::Conflict("Slot is no longer available".into())),
        Some(_) => {
            query(r#"UPDATE slot_windows SET is_available = FALSE WHERE id = $1"#)
                .bind(window_id)
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
    }
}

async fn release_window(tx: &mut Transaction<'_, Postgres>, window_id: Option<Uuid>) -> Result<(), sqlx::Error> {
    if let Some(id) = window_id {
        query(r#"UPDATE slot_windows SET is_available = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn notify_status(notifier: &Notifier, booking: &Booking, status: BookingStatus) {
    let draft = match status {
        BookingStatus::Booked => Draft::new(
            Party::customer(booking.customer_id),
            Party::hotel(booking.hotel_id),
            NotificationKind::BookingConfirmation,
            format!(
                "Your booking for {} is confirmed",
                booking.start_time.format("%Y-%m-%d %H:%M")
            ),
        )
        .with_email("Booking confirmed")
        .with_sms(),
        other => Draft::new(
            Party::customer(booking.customer_id),
            Party::hotel(booking.hotel_id),
            NotificationKind::BookingStatusUpdate,
            format!("Your booking status is now {other}"),
        )
        .with_email("Booking status updated"),
    };
    notifier.send(draft);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> CreateBookingBody {
        serde_json::from_value(json!({
            "hotelId": Uuid::nil(),
            "startTime": "2025-03-01T06:00:00Z",
            "endTime": "2025-03-01T12:00:00Z",
            "slotPrice": 500,
            "slotDuration": 6,
            "checkInDate": "2025-03-01T06:00:00Z",
            "guests": 2,
            "totalPrice": 500
        }))
        .unwrap()
    }

    #[test]
    fn booking_body_defaults() {
        let b = body();
        assert_eq!(b.payment_type, PaymentType::Online);
        assert!(b.customer_id.is_none());
        assert!(validate_new(&b).is_ok());
    }

    #[test]
    fn rejects_bad_bookings() {
        let mut b = body();
        b.end_time = b.start_time;
        assert_eq!(validate_new(&b).unwrap_err().to_string(), "endTime must be after startTime");

        let mut b = body();
        b.guests = 0;
        assert!(matches!(validate_new(&b), Err(ApiError::Validation(_))));

        let mut b = body();
        b.slot_duration = 4;
        assert!(validate_new(&b).is_err());

        let mut b = body();
        b.total_price = -1.0;
        assert_eq!(validate_new(&b).unwrap_err().to_string(), "totalPrice must be a non-negative number");
    }

    #[test]
    fn confirmation_body_takes_any_status() {
        let b: ConfirmBody = serde_json::from_value(json!({ "slotId": Uuid::nil(), "status": "booked" })).unwrap();
        assert_eq!(b.status, BookingStatus::Booked);
        assert!(serde_json::from_value::<ConfirmBody>(json!({ "status": "archived" })).is_err());
    }

    #[test]
    fn cancellation_reason_accepts_message_alias() {
        let b: CancellationRequestBody = serde_json::from_value(json!({ "message": "change of plans" })).unwrap();
        assert_eq!(b.reason, "change of plans");
    }
}
