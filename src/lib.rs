// src/lib.rs

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::{Pool, Postgres};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod models;
pub mod notify;
pub mod policy;
pub mod routes;
pub mod stripe;

use auth::JwtKeys;
use notify::Notifier;
use routes::{
    bookings, customers, health, hotel_amenities, hotels, master_rooms, notifications, payments, reviews, slots, sub_rooms, support,
    users,
};
use stripe::StripeClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub jwt: Arc<JwtKeys>,
    pub notifier: Notifier,
    pub stripe: Arc<StripeClient>,
}

/// Every route under `/api/v1`, plus `/health`.
pub fn app(state: AppState) -> Router {
    Router::new()
        // health
        .route("/health", get(health::health))
        // hotels
        .route("/api/v1/hotel/create", post(hotels::create_hotel))
        .route("/api/v1/hotel/get/:id", get(hotels::get_hotel))
        .route("/api/v1/hotel/update/:id", put(hotels::update_hotel))
        .route("/api/v1/hotel/delete/:ids", delete(hotels::delete_hotels))
        .route("/api/v1/hotel/getAll", get(hotels::list_hotels))
        // hotel amenities
        .route("/api/v1/hotelAmenities/create", post(hotel_amenities::create_amenity))
        .route("/api/v1/hotelAmenities/get/:id", get(hotel_amenities::get_amenity))
        .route("/api/v1/hotelAmenities/update/:id", put(hotel_amenities::update_amenity))
        .route("/api/v1/hotelAmenities/delete/:ids", delete(hotel_amenities::delete_amenities))
        .route("/api/v1/hotelAmenities/getAll", get(hotel_amenities::list_amenities))
        // users
        .route("/api/v1/user/create", post(users::create_user))
        .route("/api/v1/user/get/:id", get(users::get_user))
        .route("/api/v1/user/update/:id", put(users::update_user))
        .route("/api/v1/user/delete/:ids", delete(users::delete_users))
        .route("/api/v1/user/getAll", get(users::list_users))
        // customers
        .route("/api/v1/customer/create", post(customers::create_customer))
        .route("/api/v1/customer/get/:id", get(customers::get_customer))
        .route("/api/v1/customer/update/:id", put(customers::update_customer))
        .route("/api/v1/customer/delete/:ids", delete(customers::delete_customers))
        .route("/api/v1/customer/getAll", get(customers::list_customers))
        // master rooms
        .route("/api/v1/masterRoom/create", post(master_rooms::create_master_room))
        .route("/api/v1/masterRoom/get/:id", get(master_rooms::get_master_room))
        .route("/api/v1/masterRoom/update/:id", put(master_rooms::update_master_room))
        .route("/api/v1/masterRoom/delete/:ids", delete(master_rooms::delete_master_rooms))
        .route("/api/v1/masterRoom/getAll", get(master_rooms::list_master_rooms))
        // sub rooms
        .route("/api/v1/subRoom/create", post(sub_rooms::create_sub_room))
        .route("/api/v1/subRoom/get/:id", get(sub_rooms::get_sub_room))
        .route("/api/v1/subRoom/update/:id", put(sub_rooms::update_sub_room))
        .route("/api/v1/subRoom/delete/:ids", delete(sub_rooms::delete_sub_rooms))
        .route("/api/v1/subRoom/getAll", get(sub_rooms::list_sub_rooms))
        // slots
        .route("/api/v1/slot/create", post(slots::create_slot))
        .route("/api/v1/slot/get/:id", get(slots::get_slot))
        .route("/api/v1/slot/update/:id", put(slots::update_slot))
        .route("/api/v1/slot/delete/:ids", delete(slots::delete_slots))
        .route("/api/v1/slot/getAll", get(slots::list_slots))
        // bookings
        .route("/api/v1/booking/create", post(bookings::create_booking))
        .route("/api/v1/booking/get/:id", get(bookings::get_booking))
        .route("/api/v1/booking/update/:id", put(bookings::update_booking))
        .route("/api/v1/booking/delete/:ids", delete(bookings::delete_bookings))
        .route("/api/v1/booking/getAll", get(bookings::list_bookings))
        .route(
            "/api/v1/booking/bookingConfirmation/:bookingId",
            put(bookings::booking_confirmation),
        )
        .route(
            "/api/v1/booking/requestBookingCancellation/:bookingId",
            put(bookings::request_booking_cancellation),
        )
        .route(
            "/api/v1/booking/respondToCancellationRequest/:bookingId",
            put(bookings::respond_to_cancellation_request),
        )
        // support
        .route("/api/v1/support/create", post(support::create_ticket))
        .route("/api/v1/support/get/:id", get(support::get_ticket))
        .route("/api/v1/support/update/:id", put(support::update_ticket))
        .route("/api/v1/support/delete/:ids", delete(support::delete_tickets))
        .route("/api/v1/support/getAll", get(support::list_tickets))
        .route("/api/v1/support/assignTicket/:ticketId/:userId", put(support::assign_ticket))
        .route("/api/v1/support/autoAssign/:ticketId", put(support::auto_assign_ticket))
        .route("/api/v1/support/statusUpdate/:ticketId", put(support::status_update))
        // reviews
        .route("/api/v1/review/create", post(reviews::create_review))
        .route("/api/v1/review/get/:id", get(reviews::get_review))
        .route("/api/v1/review/update/:id", put(reviews::update_review))
        .route("/api/v1/review/delete/:ids", delete(reviews::delete_reviews))
        .route("/api/v1/review/getAll", get(reviews::list_reviews))
        // notifications
        .route("/api/v1/notification/getAll", get(notifications::list_notifications))
        .route("/api/v1/notification/markRead/:ids", put(notifications::mark_read))
        .route("/api/v1/notification/delete/:ids", delete(notifications::delete_notifications))
        .route("/api/v1/notification/registerToken", post(notifications::register_token))
        .route("/api/v1/notification/stream", get(notifications::stream))
        // payments
        .route("/api/v1/payment/intent", post(payments::create_intent))
        .route("/api/v1/payment/webhook", post(payments::webhook))
        // state & middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
