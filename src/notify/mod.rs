// src/notify/mod.rs
//
// Notification fan-out: persist a record, then push it to live sessions,
// device tokens, email and SMS. Runs after the primary write commits and
// never fails the request that triggered it.

pub mod channels;
pub mod contacts;
pub mod realtime;

use std::sync::Arc;

use serde_json::json;
use sqlx::{query_as, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Notification, NotificationKind, Party};
use channels::Channels;
use realtime::RealtimeHub;

#[derive(Debug, Clone)]
pub struct Draft {
    pub receiver: Party,
    pub sender: Party,
    pub kind: NotificationKind,
    pub message: String,
    pub email_subject: Option<String>,
    pub sms: bool,
}

impl Draft {
    pub fn new(receiver: Party, sender: Party, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self { receiver, sender, kind, message: message.into(), email_subject: None, sms: false }
    }

    pub fn with_email(mut self, subject: impl Into<String>) -> Self {
        self.email_subject = Some(subject.into());
        self
    }

    pub fn with_sms(mut self) -> Self {
        self.sms = true;
        self
    }
}

pub fn title(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::NewBookingRequest => "New booking request",
        NotificationKind::BookingConfirmation => "Booking confirmed",
        NotificationKind::NewBookingCancellation => "Cancellation requested",
        NotificationKind::BookingCancellation => "Cancellation update",
        NotificationKind::BookingPayment => "Payment received",
        NotificationKind::BookingCheckIn => "Checked in",
        NotificationKind::BookingCheckOut => "Checked out",
        NotificationKind::BookingStatusUpdate => "Booking updated",
        NotificationKind::SupportTicket => "Support ticket update",
    }
}

#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
    hub: RealtimeHub,
    channels: Arc<Channels>,
}

impl Notifier {
    pub fn new(pool: PgPool, hub: RealtimeHub, channels: Channels) -> Self {
        Self { pool, hub, channels: Arc::new(channels) }
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    /// Fire and forget.
    pub fn send(&self, draft: Draft) {
        let this = self.clone();
        tokio::spawn(async move { this.deliver(draft).await });
    }

    pub async fn deliver(&self, draft: Draft) {
        let record = match persist(&self.pool, &draft).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, receiver = %draft.receiver.id, "failed to store notification");
                return;
            }
        };
        let live = self.hub.publish(record.clone());
        debug!(notification_id = %record.id, live, "notification published");

        self.push(&record).await;
        if draft.email_subject.is_some() || draft.sms {
            self.mail_and_text(&draft).await;
        }
    }

    async fn push(&self, record: &Notification) {
        let Some(push) = &self.channels.push else {
            debug!("push disabled");
            return;
        };
        let tokens = match contacts::push_tokens(&self.pool, record.receiver).await {
            Ok(t) if !t.is_empty() => t,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "failed to load device tokens");
                return;
            }
        };
        let data = json!({ "notificationId": record.id, "type": record.kind });
        if let Err(e) = push.send(&tokens, title(record.kind), &record.message, &data).await {
            warn!(error = %e, receiver = %record.receiver.id, "push delivery failed");
        }
    }

    async fn mail_and_text(&self, draft: &Draft) {
        let contact = match contacts::lookup(&self.pool, draft.receiver).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                debug!(receiver = %draft.receiver.id, "no contact for receiver");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to load receiver contact");
                return;
            }
        };

        if let (Some(subject), Some(to)) = (&draft.email_subject, &contact.email) {
            match &self.channels.email {
                Some(email) => {
                    let html = format!("<p>Hi {},</p><p>{}</p>", contact.name, draft.message);
                    if let Err(e) = email.send(to, subject, &html).await {
                        warn!(error = %e, "email delivery failed");
                    }
                }
                None => debug!("email disabled"),
            }
        }

        if let (true, Some(phone)) = (draft.sms, &contact.phone) {
            match &self.channels.sms {
                Some(sms) => {
                    if let Err(e) = sms.send(phone, &draft.message).await {
                        warn!(error = %e, "sms delivery failed");
                    }
                }
                None => debug!("sms disabled"),
            }
        }
    }
}

async fn persist(pool: &PgPool, draft: &Draft) -> Result<Notification, sqlx::Error> {
    query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (id, receiver_kind, receiver_id, sender_kind, sender_id, message, kind)
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(draft.receiver.kind)
    .bind(draft.receiver.id)
    .bind(draft.sender.kind)
    .bind(draft.sender.id)
    .bind(&draft.message)
    .bind(draft.kind)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_builders() {
        let d = Draft::new(
            Party::customer(Uuid::nil()),
            Party::hotel(Uuid::nil()),
            NotificationKind::BookingConfirmation,
            "Your booking is confirmed",
        )
        .with_email("Booking confirmed");
        assert_eq!(d.email_subject.as_deref(), Some("Booking confirmed"));
        assert!(!d.sms);
        assert!(d.with_sms().sms);
    }
}
