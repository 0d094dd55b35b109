// src/domain/catalog.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, PgConnection, PgExecutor};
use uuid::Uuid;

use super::pricing;
use crate::error::{ApiError, ApiResult};
use crate::models::{MasterRoom, Slot, SlotWindow, SubRoom};

/// Window as submitted by the caller. Price is never accepted from input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInput {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "available")]
    pub is_available: bool,
}
fn available() -> bool { true }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubRoomView {
    #[serde(flatten)]
    pub sub_room: SubRoom,
    pub default_slots: Vec<SlotWindow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterRoomView {
    #[serde(flatten)]
    pub master_room: MasterRoom,
    pub sub_rooms: Vec<SubRoomView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    #[serde(flatten)]
    pub slot: Slot,
    pub manual_slots: Vec<SlotWindow>,
}

pub fn ensure_duration(duration: i32) -> ApiResult<()> {
    if pricing::is_valid_duration(duration) {
        Ok(())
    } else {
        Err(ApiError::validation("slotDuration must be one of 3, 6 or 12"))
    }
}

pub fn ensure_price(full_day_price: f64) -> ApiResult<()> {
    if full_day_price.is_finite() && full_day_price >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::validation("fullDayPrice must be a non-negative number"))
    }
}

/// Each window must end after it starts and must not overlap its siblings.
pub fn validate_windows(windows: &[WindowInput]) -> ApiResult<()> {
    if let Some(bad) = windows.iter().position(|w| w.end_time <= w.start_time) {
        return Err(ApiError::Validation(format!("Slot {} must end after it starts", bad + 1)));
    }
    let mut sorted: Vec<&WindowInput> = windows.iter().collect();
    sorted.sort_by_key(|w| w.start_time);
    if sorted.windows(2).any(|pair| pair[1].start_time < pair[0].end_time) {
        return Err(ApiError::validation("Slots must not overlap"));
    }
    Ok(())
}

pub async fn insert_windows(
    conn: &mut PgConnection,
    sub_room_id: Uuid,
    slot_id: Option<Uuid>,
    windows: &[WindowInput],
    price: f64,
) -> Result<Vec<SlotWindow>, sqlx::Error> {
    let mut out = Vec::with_capacity(windows.len());
    for (position, w) in windows.iter().enumerate() {
        let row = query_as::<_, SlotWindow>(
            r#"
            INSERT INTO slot_windows (id, sub_room_id, slot_id, position, start_time, end_time, price, is_available)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sub_room_id)
        .bind(slot_id)
        .bind(position as i32)
        .bind(w.start_time)
        .bind(w.end_time)
        .bind(price)
        .bind(w.is_available)
        .fetch_one(&mut *conn)
        .await?;
        out.push(row);
    }
    Ok(out)
}

/// Swap the window set owned by a sub room (`slot_id = None`) or a dated slot.
/// Refuses while any current window is held by a booking.
pub async fn replace_windows(
    conn: &mut PgConnection,
    sub_room_id: Uuid,
    slot_id: Option<Uuid>,
    windows: &[WindowInput],
    price: f64,
) -> ApiResult<Vec<SlotWindow>> {
    let held: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM slot_windows w
        WHERE w.sub_room_id = $1 AND w.slot_id IS NOT DISTINCT FROM $2
          AND EXISTS (
            SELECT 1 FROM bookings b
            WHERE b.slot_window_id = w.id AND b.booking_status IN ('pending', 'booked')
          )
        "#,
    )
    .bind(sub_room_id)
    .bind(slot_id)
    .fetch_one(&mut *conn)
    .await?;
    if held > 0 {
        return Err(ApiError::Conflict("Cannot replace slots that are held by a booking".into()));
    }

    query(r#"DELETE FROM slot_windows WHERE sub_room_id = $1 AND slot_id IS NOT DISTINCT FROM $2"#)
        .bind(sub_room_id)
        .bind(slot_id)
        .execute(&mut *conn)
        .await?;
    Ok(insert_windows(conn, sub_room_id, slot_id, windows, price).await?)
}

/// Rewrites every window price (default and manual) under a sub room.
pub async fn reprice_sub_room(
    conn: &mut PgConnection,
    sub_room_id: Uuid,
    price: f64,
) -> Result<u64, sqlx::Error> {
    let res = query(r#"UPDATE slot_windows SET price = $2 WHERE sub_room_id = $1"#)
        .bind(sub_room_id)
        .bind(price)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected())
}

/// Current slot price for a sub room, from its master room's full-day price.
pub async fn sub_room_price<'e, E: PgExecutor<'e>>(exec: E, sub_room_id: Uuid) -> Result<f64, sqlx::Error> {
    let (full_day_price, duration): (f64, i32) = sqlx::query_as(
        r#"
        SELECT m.full_day_price, s.slot_duration
        FROM sub_rooms s JOIN master_rooms m ON m.id = s.master_room_id
        WHERE s.id = $1
        "#,
    )
    .bind(sub_room_id)
    .fetch_one(exec)
    .await?;
    Ok(pricing::slot_price(full_day_price, duration))
}

pub async fn default_windows<'e, E: PgExecutor<'e>>(
    exec: E,
    sub_room_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<SlotWindow>>, sqlx::Error> {
    let rows = query_as::<_, SlotWindow>(
        r#"
        SELECT * FROM slot_windows
        WHERE sub_room_id = ANY($1) AND slot_id IS NULL
        ORDER BY sub_room_id, position
        "#,
    )
    .bind(sub_room_ids)
    .fetch_all(exec)
    .await?;
    Ok(group_by(rows, |w| w.sub_room_id))
}

pub async fn manual_windows<'e, E: PgExecutor<'e>>(
    exec: E,
    slot_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<SlotWindow>>, sqlx::Error> {
    let rows = query_as::<_, SlotWindow>(
        r#"
        SELECT * FROM slot_windows
        WHERE slot_id = ANY($1)
        ORDER BY slot_id, position
        "#,
    )
    .bind(slot_ids)
    .fetch_all(exec)
    .await?;
    Ok(group_by(rows, |w| w.slot_id.unwrap_or(w.sub_room_id)))
}

pub fn group_by<F>(windows: Vec<SlotWindow>, key: F) -> HashMap<Uuid, Vec<SlotWindow>>
where
    F: Fn(&SlotWindow) -> Uuid,
{
    let mut map: HashMap<Uuid, Vec<SlotWindow>> = HashMap::new();
    for w in windows {
        map.entry(key(&w)).or_default().push(w);
    }
    map
}

pub async fn sub_room_views<'e, E: PgExecutor<'e>>(
    exec: E,
    sub_rooms: Vec<SubRoom>,
) -> Result<Vec<SubRoomView>, sqlx::Error> {
    let ids: Vec<Uuid> = sub_rooms.iter().map(|s| s.id).collect();
    let mut windows = default_windows(exec, &ids).await?;
    Ok(sub_rooms
        .into_iter()
        .map(|sub_room| SubRoomView {
            default_slots: windows.remove(&sub_room.id).unwrap_or_default(),
            sub_room,
        })
        .collect())
}

pub async fn slot_views<'e, E: PgExecutor<'e>>(exec: E, slots: Vec<Slot>) -> Result<Vec<SlotView>, sqlx::Error> {
    let ids: Vec<Uuid> = slots.iter().map(|s| s.id).collect();
    let mut windows = manual_windows(exec, &ids).await?;
    Ok(slots
        .into_iter()
        .map(|slot| SlotView {
            manual_slots: windows.remove(&slot.id).unwrap_or_default(),
            slot,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(start_h: u32, end_h: u32) -> WindowInput {
        WindowInput {
            start_time: Utc.with_ymd_and_hms(2025, 3, 1, start_h, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 1, end_h, 0, 0).unwrap(),
            is_available: true,
        }
    }

    #[test]
    fn accepts_back_to_back_windows() {
        assert!(validate_windows(&[window(12, 18), window(6, 12)]).is_ok());
        assert!(validate_windows(&[]).is_ok());
    }

    #[test]
    fn rejects_inverted_window() {
        let err = validate_windows(&[window(6, 12), window(14, 13)]).unwrap_err();
        assert_eq!(err.to_string(), "Slot 2 must end after it starts");
    }

    #[test]
    fn rejects_overlap() {
        let err = validate_windows(&[window(6, 12), window(11, 17)]).unwrap_err();
        assert_eq!(err.to_string(), "Slots must not overlap");
    }

    #[test]
    fn window_input_defaults_to_available() {
        let w: WindowInput = serde_json::from_str(
            r#"{"startTime":"2025-03-01T06:00:00Z","endTime":"2025-03-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(w.is_available);
    }

    #[test]
    fn durations_and_prices_are_checked() {
        assert!(ensure_duration(6).is_ok());
        assert!(ensure_duration(5).is_err());
        assert!(ensure_price(0.0).is_ok());
        assert!(ensure_price(-1.0).is_err());
        assert!(ensure_price(f64::NAN).is_err());
    }
}
