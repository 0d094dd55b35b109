// src/routes/payments.rs

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{query_as, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiJson, Envelope, Reply};
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, BookingStatus, NotificationKind, Party, PaymentStatus};
use crate::notify::Draft;
use crate::stripe::{to_minor_units, WebhookEvent};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentBody {
    pub booking_id: Uuid,
    #[serde(default = "usd")]
    pub currency: String,
}
fn usd() -> String { "usd".into() }

pub async fn create_intent(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<IntentBody>,
) -> Reply<Value> {
    let booking = query_as::<_, Booking>(r#"SELECT * FROM bookings WHERE id = $1"#)
        .bind(b.booking_id)
        .fetch_optional(&state.pool)
        .await?
        .filter(|bk| bk.is_active && !bk.is_deleted)
        .ok_or_else(|| ApiError::not_found("Booking"))?;
    if actor.is_customer() && booking.customer_id != actor.id {
        return Err(ApiError::not_found("Booking"));
    }
    actor.require_self_or_staff(booking.customer_id)?;
    match (booking.payment_status, booking.booking_status) {
        (PaymentStatus::Paid, _) => return Err(ApiError::Conflict("Booking is already paid".into())),
        (PaymentStatus::Cancelled, _) | (_, BookingStatus::Cancelled) => {
            return Err(ApiError::Conflict("Booking has been cancelled".into()))
        }
        _ => {}
    }

    let currency = b.currency.trim().to_lowercase();
    let intent = state
        .stripe
        .create_payment_intent(to_minor_units(booking.total_price), &currency, booking.id)
        .await?;
    sqlx::query(r#"UPDATE bookings SET payment_intent_id = $2, updated_at = NOW() WHERE id = $1"#)
        .bind(booking.id)
        .bind(&intent.id)
        .execute(&state.pool)
        .await?;

    info!(booking_id = %booking.id, intent = %intent.id, amount = intent.amount, "payment intent created");
    Ok(Json(
        Envelope::ok(json!({
            "clientSecret": intent.client_secret,
            "paymentIntentId": intent.id,
            "amount": intent.amount,
            "currency": intent.currency,
        }))
        .message("Payment intent created successfully"),
    ))
}

/// Stripe calls this without a bearer token; the signature is the credential.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Reply<Value> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::validation("Missing Stripe-Signature header"))?;
    state.stripe.verify_webhook(&body, signature, Utc::now().timestamp())?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Webhook error: {e}")))?;
    if event.kind != "payment_intent.succeeded" {
        debug!(kind = %event.kind, "ignored stripe event");
        return Ok(Json(Envelope::ok(json!({ "received": true }))));
    }

    let intent = event.data.object;
    let booking_id = intent
        .metadata
        .get("bookingId")
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ApiError::validation("Payment intent has no bookingId metadata"))?;

    match mark_paid(&state.pool, booking_id, &intent.id).await? {
        Some(booking) => {
            let amount = format!("{:.2}", booking.total_price);
            state.notifier.send(Draft::new(
                Party::customer(booking.customer_id),
                Party::hotel(booking.hotel_id),
                NotificationKind::BookingPayment,
                format!("Payment of {amount} received for your booking"),
            ));
            state.notifier.send(Draft::new(
                Party::hotel(booking.hotel_id),
                Party::customer(booking.customer_id),
                NotificationKind::BookingPayment,
                format!("Payment of {amount} received for booking {}", booking.id),
            ));
        }
        None => debug!(booking_id = %booking_id, "payment already recorded"),
    }
    Ok(Json(Envelope::ok(json!({ "received": true }))))
}

/// Records a successful payment once. Replays return `None`.
pub async fn mark_paid(pool: &PgPool, booking_id: Uuid, intent_id: &str) -> ApiResult<Option<Booking>> {
    let exists: Option<Uuid> = sqlx::query_scalar(r#"SELECT id FROM bookings WHERE id = $1"#)
        .bind(booking_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Booking"));
    }

    let updated = query_as::<_, Booking>(
        r#"
        UPDATE bookings SET
          payment_status    = 'paid',
          payment_date      = COALESCE(payment_date, NOW()),
          payment_intent_id = COALESCE(payment_intent_id, $2),
          updated_at        = NOW()
        WHERE id = $1 AND payment_status = 'pending'
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(intent_id)
    .fetch_optional(pool)
    .await?;
    if let Some(b) = &updated {
        info!(booking_id = %b.id, intent = intent_id, "booking marked paid");
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_defaults_to_usd() {
        let b: IntentBody = serde_json::from_value(json!({ "bookingId": Uuid::nil() })).unwrap();
        assert_eq!(b.currency, "usd");
    }

    #[test]
    fn succeeded_event_carries_booking_id() {
        let id = Uuid::new_v4();
        let event: WebhookEvent = serde_json::from_value(json!({
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_123", "metadata": { "bookingId": id.to_string() } } }
        }))
        .unwrap();
        assert_eq!(event.kind, "payment_intent.succeeded");
        assert_eq!(event.data.object.metadata["bookingId"], id.to_string());
    }
}
