// src/models/mod.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

macro_rules! display_as_str {
    ($($ty:ty),* $(,)?) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

// ───────────────────────────────────────
// Enumerations (backed by Postgres enum types)
// ───────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    Manager,
    SupportAgent,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "superAdmin",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::SupportAgent => "supportAgent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "support_agent_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SupportAgentStatus {
    Available,
    Busy,
    Occupied,
    Offline,
}

impl SupportAgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Occupied => "occupied",
            Self::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Booked,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Booked => "booked",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Card,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cancellation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CancellationStatus {
    Pending,
    Approved,
    Rejected,
}

impl CancellationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_category")]
pub enum TicketCategory {
    Booking,
    HotelExperience,
    StaffService,
    Payment,
    Technical,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

display_as_str!(UserRole, SupportAgentStatus, BookingStatus, PaymentStatus, CancellationStatus, TicketStatus);

// ───────────────────────────────────────
// Accounts
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub support_agent_status: Option<SupportAgentStatus>,
    pub agent_status_changed_at: Option<DateTime<Utc>>,
    pub is_chain_admin: bool,
    pub hotel_ids: Vec<Uuid>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub booking_history: Vec<Uuid>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Catalog: hotels, rooms, slots
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HotelAmenity {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub pincode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub website: Option<String>,
    pub contact_number: String,
    pub email: String,
    pub admin_id: Option<Uuid>,
    pub manager_ids: Vec<Uuid>,
    #[serde(rename = "amenitiesId")]
    pub amenity_ids: Vec<Uuid>,
    pub images: Vec<String>,
    pub rating: f64,
    pub total_reviews: i32,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MasterRoom {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub full_day_price: f64,
    pub capacity: Option<i32>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubRoom {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub master_room_id: Uuid,
    pub name: String,
    pub slot_duration: i32,
    pub is_available: bool,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub master_room_id: Uuid,
    pub sub_room_id: Uuid,
    pub date: NaiveDate,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bookable time window. Default windows hang off a sub room, manual
/// windows off a dated slot.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SlotWindow {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub sub_room_id: Uuid,
    #[serde(skip_serializing)]
    pub slot_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub position: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: f64,
    pub is_available: bool,
}

// ───────────────────────────────────────
// Bookings
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequest {
    #[sqlx(rename = "cancellation_requested")]
    pub requested: bool,
    #[sqlx(rename = "cancellation_status")]
    pub status: Option<CancellationStatus>,
    #[sqlx(rename = "cancellation_message")]
    pub message: String,
    #[sqlx(rename = "cancellation_requested_at")]
    pub requested_at: Option<DateTime<Utc>>,
    #[sqlx(rename = "cancellation_responded_at")]
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub hotel_id: Uuid,
    pub slot_window_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub slot_price: f64,
    pub slot_duration: i32,
    pub booking_date: DateTime<Utc>,
    pub check_in_date: DateTime<Utc>,
    pub guests: i32,
    pub total_price: f64,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub booking_status: BookingStatus,
    pub special_requests: String,
    #[sqlx(flatten)]
    pub cancellation_request: CancellationRequest,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Support
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub category: TicketCategory,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub attachments: Vec<String>,
    pub assigned_to: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Reviews
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub hotel_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub reply_by_hotel: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Notifications
// ───────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "party_kind")]
pub enum PartyKind {
    User,
    Customer,
    Hotel,
}

/// Receiver or sender of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub kind: PartyKind,
    pub id: Uuid,
}

impl Party {
    pub fn user(id: Uuid) -> Self {
        Self { kind: PartyKind::User, id }
    }

    pub fn customer(id: Uuid) -> Self {
        Self { kind: PartyKind::Customer, id }
    }

    pub fn hotel(id: Uuid) -> Self {
        Self { kind: PartyKind::Hotel, id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    NewBookingRequest,
    BookingConfirmation,
    NewBookingCancellation,
    BookingCancellation,
    BookingPayment,
    BookingCheckIn,
    BookingCheckOut,
    BookingStatusUpdate,
    SupportTicket,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewBookingRequest => "newBookingRequest",
            Self::BookingConfirmation => "bookingConfirmation",
            Self::NewBookingCancellation => "newBookingCancellation",
            Self::BookingCancellation => "bookingCancellation",
            Self::BookingPayment => "bookingPayment",
            Self::BookingCheckIn => "bookingCheckIn",
            Self::BookingCheckOut => "bookingCheckOut",
            Self::BookingStatusUpdate => "bookingStatusUpdate",
            Self::SupportTicket => "supportTicket",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub receiver: Party,
    pub sender: Party,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Notification {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            receiver: Party {
                kind: row.try_get("receiver_kind")?,
                id: row.try_get("receiver_id")?,
            },
            sender: Party {
                kind: row.try_get("sender_kind")?,
                id: row.try_get("sender_id")?,
            },
            message: row.try_get("message")?,
            kind: row.try_get("kind")?,
            is_read: row.try_get("is_read")?,
            is_deleted: row.try_get("is_deleted")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_os", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceOs {
    Android,
    Ios,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FcmToken {
    pub id: Uuid,
    pub owner_kind: PartyKind,
    pub owner_id: Uuid,
    pub token: String,
    pub os: DeviceOs,
    pub device_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(serde_json::to_value(UserRole::SuperAdmin).unwrap(), json!("superAdmin"));
        assert_eq!(serde_json::to_value(TicketStatus::InProgress).unwrap(), json!("in_progress"));
        assert_eq!(
            serde_json::to_value(TicketCategory::HotelExperience).unwrap(),
            json!("HotelExperience")
        );
        assert_eq!(
            serde_json::to_value(NotificationKind::NewBookingCancellation).unwrap(),
            json!("newBookingCancellation")
        );
        assert_eq!(TicketStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn party_is_a_tagged_pair() {
        let id = Uuid::nil();
        assert_eq!(
            serde_json::to_value(Party::hotel(id)).unwrap(),
            json!({ "kind": "Hotel", "id": id })
        );
    }
}
