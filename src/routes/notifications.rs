// src/routes/notifications.rs

use std::collections::{BTreeMap, HashSet};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::query_as;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{parse_ids, require_text, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::{Actor, Role};
use crate::error::ApiError;
use crate::models::{DeviceOs, FcmToken, Notification, NotificationKind};
use crate::notify::realtime::RealtimeHub;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
    pub is_read: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenBody {
    pub token: String,
    pub os: DeviceOs,
    pub device_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQ {
    pub hotel_id: Option<Uuid>,
}

// $1 all, $2 own id, $3 managed hotel ids
const NOTIFICATION_FILTER: &str = r#"
    WHERE ($1 OR ((receiver_id = $2 OR (receiver_kind = 'Hotel' AND receiver_id = ANY($3))) AND NOT is_deleted))
      AND ($4::text IS NULL OR message ILIKE '%' || $4 || '%')
      AND ($5::notification_type IS NULL OR kind = $5)
      AND ($6::bool IS NULL OR is_read = $6)
      AND ($7::timestamptz IS NULL OR created_at >= $7)
      AND ($8::timestamptz IS NULL OR created_at <= $8)
"#;

fn signed_in(actor: &Actor) -> Result<(), ApiError> {
    if actor.role == Role::Guest {
        return Err(ApiError::Unauthorized("Please sign in to continue".into()));
    }
    Ok(())
}

fn notification_stats(rows: &[(NotificationKind, i64, i64)]) -> Value {
    let mut distribution = BTreeMap::new();
    let (mut total, mut unread) = (0i64, 0i64);
    for (kind, count, not_read) in rows {
        distribution.insert(kind.as_str(), *count);
        total += count;
        unread += not_read;
    }
    json!({ "totalNotifications": total, "unreadCount": unread, "typeDistribution": distribution })
}

pub async fn list_notifications(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListNotificationsQ>,
) -> Reply<Vec<Notification>> {
    signed_in(&actor)?;
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);

    let stats_sql = format!(
        "SELECT kind, COUNT(*), COUNT(*) FILTER (WHERE NOT is_read) FROM notifications {NOTIFICATION_FILTER} GROUP BY kind"
    );
    let counts = query_as::<_, (NotificationKind, i64, i64)>(&stats_sql)
        .bind(actor.is_super_admin())
        .bind(actor.id)
        .bind(&actor.hotel_ids)
        .bind(&search)
        .bind(q.kind)
        .bind(q.is_read)
        .bind(q.start_date)
        .bind(q.end_date)
        .fetch_all(&state.pool)
        .await?;
    let total: i64 = counts.iter().map(|(_, n, _)| n).sum();

    let list_sql = format!(
        "SELECT * FROM notifications {NOTIFICATION_FILTER} ORDER BY created_at DESC LIMIT $9 OFFSET $10"
    );
    let rows = query_as::<_, Notification>(&list_sql)
        .bind(actor.is_super_admin())
        .bind(actor.id)
        .bind(&actor.hotel_ids)
        .bind(&search)
        .bind(q.kind)
        .bind(q.is_read)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows)
            .paginated(page.summarize(total))
            .filters(json!({
                "search": search,
                "type": q.kind,
                "isRead": q.is_read,
                "startDate": q.start_date,
                "endDate": q.end_date,
            }))
            .stats(notification_stats(&counts)),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<Value> {
    signed_in(&actor)?;
    let ids = parse_ids(&ids, "notification")?;
    let res = sqlx::query(
        r#"
        UPDATE notifications SET is_read = TRUE
        WHERE id = ANY($1)
          AND ($2 OR receiver_id = $3 OR (receiver_kind = 'Hotel' AND receiver_id = ANY($4)))
        "#,
    )
    .bind(&ids)
    .bind(actor.is_super_admin())
    .bind(actor.id)
    .bind(&actor.hotel_ids)
    .execute(&state.pool)
    .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("No notifications found with the provided IDs".into()));
    }
    Ok(Json(
        Envelope::ok(json!({ "updatedCount": res.rows_affected() }))
            .message(format!("{} notification(s) marked as read", res.rows_affected())),
    ))
}

pub async fn delete_notifications(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "notification")?;
    let res = sqlx::query(r#"DELETE FROM notifications WHERE id = ANY($1)"#)
        .bind(&ids)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("No notifications found with the provided IDs".into()));
    }
    Ok(Json(
        Envelope::ok(json!({ "deletedCount": res.rows_affected() }))
            .message(format!("{} notification(s) deleted successfully", res.rows_affected())),
    ))
}

/// A device token belongs to whoever registered it last.
pub async fn register_token(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<RegisterTokenBody>,
) -> Reply<FcmToken> {
    signed_in(&actor)?;
    require_text(&b.token, "token")?;
    let owner = actor.party();

    let row = query_as::<_, FcmToken>(
        r#"
        INSERT INTO fcm_tokens (id, owner_kind, owner_id, token, os, device_id)
        VALUES ($1,$2,$3,$4,$5,$6)
        ON CONFLICT (token) DO UPDATE SET
          owner_kind = EXCLUDED.owner_kind,
          owner_id   = EXCLUDED.owner_id,
          os         = EXCLUDED.os,
          device_id  = EXCLUDED.device_id,
          updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.kind)
    .bind(owner.id)
    .bind(b.token.trim())
    .bind(b.os)
    .bind(b.device_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(Envelope::ok(row).message("Token registered successfully")))
}

// ───────────────────────────────────────
// Live stream
// ───────────────────────────────────────
pub async fn stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<StreamQ>,
) -> Result<Response, ApiError> {
    signed_in(&actor)?;
    let mut receivers = HashSet::from([actor.id]);
    if let Some(hotel_id) = q.hotel_id {
        if !actor.manages_hotel(hotel_id) {
            return Err(ApiError::Forbidden("You do not manage this hotel".into()));
        }
        receivers.insert(hotel_id);
    }

    let hub = state.notifier.hub().clone();
    info!(actor_id = %actor.id, "notification stream requested");
    Ok(ws.on_upgrade(move |socket| pump(socket, hub, receivers)))
}

async fn pump(socket: WebSocket, hub: RealtimeHub, receivers: HashSet<Uuid>) {
    let (mut sender, mut incoming) = socket.split();
    let mut events = hub.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(n) if receivers.contains(&n.receiver.id) => {
                    let Ok(text) = serde_json::to_string(&*n) else { continue };
                    if sender.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification stream lagging, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = incoming.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
    debug!("notification stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_unread_per_type() {
        let stats = notification_stats(&[
            (NotificationKind::BookingConfirmation, 3, 1),
            (NotificationKind::SupportTicket, 2, 2),
        ]);
        assert_eq!(stats["totalNotifications"], 5);
        assert_eq!(stats["unreadCount"], 3);
        assert_eq!(stats["typeDistribution"]["supportTicket"], 2);
    }

    #[test]
    fn list_query_reads_type_param() {
        let q: ListNotificationsQ = serde_json::from_value(json!({ "type": "bookingPayment", "isRead": false })).unwrap();
        assert_eq!(q.kind, Some(NotificationKind::BookingPayment));
        assert_eq!(q.is_read, Some(false));
    }
}
